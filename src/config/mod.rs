//! Typed gateway configuration (spec.md Design Notes §9 : replaces
//! reflective, class-based type casts with a single validated, typed
//! struct built through a builder, in the style of the teacher's
//! `FailoverConfigBuilder`).

/// File-watching hot-reload of a [`GatewayConfig`] snapshot, gated
/// behind the `dynamic_configuration` feature.
#[ cfg( feature = "dynamic_configuration" ) ]
pub mod watcher;

mod private
{
  use core::time::Duration;
  use crate::error::Error;
  use crate::reliability::circuit_breaker::CircuitBreakerConfig;
  use crate::reliability::quota::{ QuotaAlgorithm, QuotaPolicy };
  use crate::reliability::retry::RetryConfig;
  use crate::router::decision::PreferredProviderPolicy;
  use crate::router::scoring::ScoringWeights;
  use crate::session::pool::SessionPoolConfig;

  /// Router-specific configuration (spec.md §4.3).
  #[ derive( Debug, Clone ) ]
  pub struct RouterConfig
  {
    /// Factor weights applied during scoring.
    pub scoring_weights : ScoringWeights,
    /// How an unavailable `preferred_provider` is resolved.
    pub preferred_provider_policy : PreferredProviderPolicy,
    /// Whether the cost-bias scoring factor is applied (spec.md §6
    /// `router.cost_sensitive_default`). Opt-in : `false` by default, so
    /// routing ranks purely on health/availability/affinity unless a
    /// deployment explicitly asks to also rank by price.
    pub cost_sensitive : bool,
  }

  impl Default for RouterConfig
  {
    fn default() -> Self
    {
      Self
      {
        scoring_weights : ScoringWeights::default(),
        preferred_provider_policy : PreferredProviderPolicy::default(),
        cost_sensitive : false,
      }
    }
  }

  /// Multitenancy configuration (spec.md §6).
  #[ derive( Debug, Clone, Copy ) ]
  pub struct MultitenancyConfig
  {
    /// When `false`, every request is attributed to the single default
    /// tenant (spec.md §6).
    pub enabled : bool,
  }

  impl Default for MultitenancyConfig
  {
    fn default() -> Self
    {
      Self { enabled : false }
    }
  }

  /// Quota configuration for both tenant- and provider-scoped limits
  /// (spec.md §4.6).
  #[ derive( Debug, Clone, Copy ) ]
  pub struct QuotaConfig
  {
    /// Applied per tenant id.
    pub tenant_policy : QuotaPolicy,
    /// Applied per provider id.
    pub provider_policy : QuotaPolicy,
  }

  impl Default for QuotaConfig
  {
    fn default() -> Self
    {
      Self
      {
        tenant_policy : QuotaPolicy { algorithm : QuotaAlgorithm::TokenBucket, limit : 1000, period : Duration::from_secs( 60 ) },
        provider_policy : QuotaPolicy { algorithm : QuotaAlgorithm::TokenBucket, limit : 5000, period : Duration::from_secs( 60 ) },
      }
    }
  }

  /// Top-level gateway configuration, owned by [`crate::runtime::Runtime`]
  /// for the lifetime of the process.
  #[ derive( Debug, Clone ) ]
  pub struct GatewayConfig
  {
    /// Router scoring and policy.
    pub router : RouterConfig,
    /// Warm session pool sizing.
    pub session_pool : SessionPoolConfig,
    /// Per-provider circuit breaker thresholds.
    pub circuit_breaker : CircuitBreakerConfig,
    /// Retry backoff policy.
    pub retry : RetryConfig,
    /// Tenant/provider quota policies.
    pub quota : QuotaConfig,
    /// Multitenancy toggle.
    pub multitenancy : MultitenancyConfig,
    /// Default per-request timeout applied when a request does not
    /// specify one.
    pub default_request_timeout : Duration,
  }

  impl Default for GatewayConfig
  {
    fn default() -> Self
    {
      Self
      {
        router : RouterConfig::default(),
        session_pool : SessionPoolConfig::default(),
        circuit_breaker : CircuitBreakerConfig::default(),
        retry : RetryConfig::default(),
        quota : QuotaConfig::default(),
        multitenancy : MultitenancyConfig::default(),
        default_request_timeout : Duration::from_secs( 30 ),
      }
    }
  }

  impl GatewayConfig
  {
    /// Start building a configuration from defaults.
    #[ must_use ]
    #[ inline ]
    pub fn builder() -> GatewayConfigBuilder
    {
      GatewayConfigBuilder::new()
    }
  }

  /// Validated builder for [`GatewayConfig`].
  #[ derive( Debug, Clone, Default ) ]
  pub struct GatewayConfigBuilder
  {
    config : GatewayConfig,
  }

  impl GatewayConfigBuilder
  {
    /// Start from [`GatewayConfig::default`].
    #[ must_use ]
    #[ inline ]
    pub fn new() -> Self
    {
      Self { config : GatewayConfig::default() }
    }

    /// Override router configuration.
    #[ must_use ]
    #[ inline ]
    pub fn router( mut self, router : RouterConfig ) -> Self
    {
      self.config.router = router;
      self
    }

    /// Override session pool sizing.
    #[ must_use ]
    #[ inline ]
    pub fn session_pool( mut self, session_pool : SessionPoolConfig ) -> Self
    {
      self.config.session_pool = session_pool;
      self
    }

    /// Override circuit breaker thresholds.
    #[ must_use ]
    #[ inline ]
    pub fn circuit_breaker( mut self, circuit_breaker : CircuitBreakerConfig ) -> Self
    {
      self.config.circuit_breaker = circuit_breaker;
      self
    }

    /// Override retry policy.
    #[ must_use ]
    #[ inline ]
    pub fn retry( mut self, retry : RetryConfig ) -> Self
    {
      self.config.retry = retry;
      self
    }

    /// Override quota policies.
    #[ must_use ]
    #[ inline ]
    pub fn quota( mut self, quota : QuotaConfig ) -> Self
    {
      self.config.quota = quota;
      self
    }

    /// Toggle multitenancy.
    #[ must_use ]
    #[ inline ]
    pub fn multitenancy( mut self, multitenancy : MultitenancyConfig ) -> Self
    {
      self.config.multitenancy = multitenancy;
      self
    }

    /// Override the default per-request timeout.
    #[ must_use ]
    #[ inline ]
    pub fn default_request_timeout( mut self, timeout : Duration ) -> Self
    {
      self.config.default_request_timeout = timeout;
      self
    }

    /// Validate and produce the final configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationError`] if any nested policy is
    /// internally inconsistent (zero limits/thresholds, zero timeout).
    pub fn build( self ) -> Result< GatewayConfig, Error >
    {
      let config = self.config;

      if config.circuit_breaker.failure_threshold == 0
      {
        return Err( Error::ConfigurationError( "circuit_breaker.failure_threshold must be at least 1".to_string() ) );
      }
      if config.retry.max_retries == 0 && config.retry.max_elapsed_time.is_none()
      {
        return Err( Error::ConfigurationError( "retry policy allows neither retries nor a time budget".to_string() ) );
      }
      if config.quota.tenant_policy.limit == 0 || config.quota.provider_policy.limit == 0
      {
        return Err( Error::ConfigurationError( "quota limits must be at least 1".to_string() ) );
      }
      if config.default_request_timeout.is_zero()
      {
        return Err( Error::ConfigurationError( "default_request_timeout cannot be zero".to_string() ) );
      }
      if config.session_pool.max_sessions_per_key == 0
      {
        return Err( Error::ConfigurationError( "session_pool.max_sessions_per_key must be at least 1".to_string() ) );
      }
      if config.session_pool.min_sessions_per_key > config.session_pool.max_sessions_per_key
      {
        return Err( Error::ConfigurationError( "session_pool.min_sessions_per_key cannot exceed max_sessions_per_key".to_string() ) );
      }

      Ok( config )
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    #[ test ]
    fn default_config_builds()
    {
      assert!( GatewayConfig::builder().build().is_ok() );
    }

    #[ test ]
    fn zero_failure_threshold_rejected()
    {
      let result = GatewayConfig::builder()
        .circuit_breaker( CircuitBreakerConfig { failure_threshold : 0, ..CircuitBreakerConfig::default() } )
        .build();
      assert!( result.is_err() );
    }

    #[ test ]
    fn zero_timeout_rejected()
    {
      let result = GatewayConfig::builder().default_request_timeout( Duration::from_secs( 0 ) ).build();
      assert!( result.is_err() );
    }

    #[ test ]
    fn min_sessions_exceeding_max_is_rejected()
    {
      let result = GatewayConfig::builder()
        .session_pool( SessionPoolConfig { max_sessions_per_key : 2, min_sessions_per_key : 3, ..SessionPoolConfig::default() } )
        .build();
      assert!( result.is_err() );
    }
  }
}

::mod_interface::mod_interface!
{
  exposed use private::RouterConfig;
  exposed use private::MultitenancyConfig;
  exposed use private::QuotaConfig;
  exposed use private::GatewayConfig;
  exposed use private::GatewayConfigBuilder;
}
