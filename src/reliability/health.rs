//! Provider health checks (spec.md §4.4 `Health()`), generalizing the
//! teacher's per-call liveness handling into one cached status per
//! provider id kept in a [`HealthRegistry`] and refreshed by a periodic
//! sweep rather than inline on the request path.

mod private
{
  use std::collections::HashMap;
  use std::sync::{ Arc, RwLock };
  use crate::provider::adapter::ProviderAdapter;

  #[ cfg( feature = "logging" ) ]
  use tracing::{ info, warn };

  /// A provider's health status (spec.md §4.4 : `Health() → {status, details}`).
  #[ derive( Debug, Clone, Copy, PartialEq, Eq ) ]
  pub enum HealthStatus
  {
    /// Fully serving traffic.
    Healthy,
    /// Serving, but with reduced confidence (e.g. an intermittent ping failure).
    Degraded,
    /// Not serving traffic.
    Unhealthy,
  }

  impl HealthStatus
  {
    /// Maps to the router's continuous `health_score` factor (spec.md
    /// §4.3) : `1.0` healthy, `0.5` degraded, `0.0` unhealthy.
    #[ must_use ]
    pub fn as_score( self ) -> f64
    {
      match self
      {
        Self::Healthy => 1.0,
        Self::Degraded => 0.5,
        Self::Unhealthy => 0.0,
      }
    }
  }

  /// One provider's health snapshot : status plus a free-form detail
  /// string (spec.md §4.4 `details`).
  #[ derive( Debug, Clone, PartialEq, Eq ) ]
  pub struct HealthReport
  {
    /// The provider's current status.
    pub status : HealthStatus,
    /// Human-readable detail, typically the last probe error if any.
    pub details : String,
  }

  impl HealthReport
  {
    /// A healthy report with no detail.
    #[ must_use ]
    pub fn healthy() -> Self
    {
      Self { status : HealthStatus::Healthy, details : String::new() }
    }
  }

  /// Caches the last [`HealthReport`] observed per provider id, populated
  /// by [`HealthRegistry::refresh_all`]. A provider never probed is
  /// treated as healthy (spec.md §4.3 : "a provider with no known signals
  /// yet is treated as healthy"), matching [`crate::router::SignalSource`]'s
  /// own default.
  #[ derive( Default ) ]
  pub struct HealthRegistry
  {
    reports : RwLock< HashMap< String, HealthReport > >,
  }

  impl core::fmt::Debug for HealthRegistry
  {
    fn fmt( &self, f : &mut core::fmt::Formatter< '_ > ) -> core::fmt::Result
    {
      f.debug_struct( "HealthRegistry" ).finish()
    }
  }

  impl HealthRegistry
  {
    /// Construct an empty registry.
    #[ must_use ]
    pub fn new() -> Self
    {
      Self::default()
    }

    /// The last-known report for `provider_id`, or a healthy default if
    /// it has never been probed.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[ must_use ]
    pub fn report_for( &self, provider_id : &str ) -> HealthReport
    {
      self.reports.read().unwrap().get( provider_id ).cloned().unwrap_or_else( HealthReport::healthy )
    }

    /// Probe every adapter in `providers` by calling
    /// [`ProviderAdapter::ping`], caching the resulting status. Intended
    /// to be driven by a periodic maintenance sweep (spec.md §4.4), not
    /// called inline on the request path.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub async fn refresh_all( &self, adapters : &[ Arc< dyn ProviderAdapter > ] )
    {
      for adapter in adapters
      {
        let provider_id = adapter.descriptor().provider_id.clone();
        let report = match adapter.ping().await
        {
          Ok( () ) => HealthReport::healthy(),
          Err( error ) =>
          {
            #[ cfg( feature = "logging" ) ]
            warn!( provider_id = %provider_id, error = %error, "provider health probe failed" );
            HealthReport { status : HealthStatus::Unhealthy, details : error.to_string() }
          }
        };
        self.reports.write().unwrap().insert( provider_id, report );
      }

      #[ cfg( feature = "logging" ) ]
      info!( providers = adapters.len(), "health sweep complete" );
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;
    use crate::provider::mock::MockAdapter;

    #[ test ]
    fn unprobed_provider_defaults_to_healthy()
    {
      let registry = HealthRegistry::new();
      assert_eq!( registry.report_for( "p1" ).status, HealthStatus::Healthy );
    }

    #[ tokio::test ]
    async fn refresh_all_caches_failed_probe_as_unhealthy()
    {
      let registry = HealthRegistry::new();
      let adapter = Arc::new( MockAdapter::new( "p1" ) );
      adapter.fail_always();
      let adapters : Vec< Arc< dyn ProviderAdapter > > = vec![ adapter ];

      registry.refresh_all( &adapters ).await;
      assert_eq!( registry.report_for( "p1" ).status, HealthStatus::Unhealthy );
    }

    #[ tokio::test ]
    async fn refresh_all_caches_successful_probe_as_healthy()
    {
      let registry = HealthRegistry::new();
      let adapters : Vec< Arc< dyn ProviderAdapter > > = vec![ Arc::new( MockAdapter::new( "p1" ) ) ];

      registry.refresh_all( &adapters ).await;
      assert_eq!( registry.report_for( "p1" ).status, HealthStatus::Healthy );
    }

    #[ test ]
    fn as_score_orders_healthy_above_degraded_above_unhealthy()
    {
      assert!( HealthStatus::Healthy.as_score() > HealthStatus::Degraded.as_score() );
      assert!( HealthStatus::Degraded.as_score() > HealthStatus::Unhealthy.as_score() );
    }
  }
}

::mod_interface::mod_interface!
{
  exposed use private::HealthStatus;
  exposed use private::HealthReport;
  exposed use private::HealthRegistry;
}
