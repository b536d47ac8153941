//! Provider selection (spec.md §4.3) : candidate filtering by device
//! affinity, multi-factor scoring, and the `preferredProvider`-unavailable
//! policy.

/// Routing decision and outcome shapes.
pub mod decision;
/// The multi-factor scoring function.
pub mod scoring;
/// Rolling per-`(provider, model)` latency/error-rate/load cache.
pub mod metrics_cache;

mod private
{
  use std::sync::Arc;
  use crate::error::Error;
  use crate::provider::registry::ProviderRegistry;
  use crate::request::InferenceRequest;
  use crate::router::decision::{ PreferredProviderPolicy, RoutingDecision };
  use crate::router::scoring::{ score, ProviderSignals, ScoringWeights };

  /// Consulted by the router for live, time-varying per-provider signals
  /// (health, load, circuit state) it does not itself own.
  pub trait SignalSource : Send + Sync
  {
    /// Current signals for `provider_id` serving `model_id`. A
    /// provider/model pair with no known signals yet is treated as
    /// healthy and idle (spec.md §2 component 6 : signals are scoped per
    /// `(provider, model)`, not per provider alone).
    fn signals_for( &self, provider_id : &str, model_id : &str ) -> ProviderSignals;
  }

  /// Selects a provider for a request by scoring every registered,
  /// device-compatible candidate and honoring the configured
  /// `preferredProvider`-unavailable policy.
  pub struct Router
  {
    providers : Arc< ProviderRegistry >,
    weights : ScoringWeights,
    policy : PreferredProviderPolicy,
    cost_sensitive : bool,
  }

  impl core::fmt::Debug for Router
  {
    fn fmt( &self, f : &mut core::fmt::Formatter< '_ > ) -> core::fmt::Result
    {
      f.debug_struct( "Router" ).field( "policy", &self.policy ).field( "cost_sensitive", &self.cost_sensitive ).finish()
    }
  }

  impl Router
  {
    /// Construct a router over `providers`, using `weights` for scoring,
    /// `policy` to resolve an unavailable `preferred_provider`, and
    /// `cost_sensitive` to gate the cost-bias scoring factor (spec.md §6
    /// `router.cost_sensitive_default`).
    #[ must_use ]
    pub fn new( providers : Arc< ProviderRegistry >, weights : ScoringWeights, policy : PreferredProviderPolicy, cost_sensitive : bool ) -> Self
    {
      Self { providers, weights, policy, cost_sensitive }
    }

    /// Route `request`, consulting `signal_source` for live per-provider
    /// state and `manifest` (when resolved by a
    /// [`crate::manifest::repository::ModelRepository`]) for the
    /// native-format scoring bonus (spec.md §4.3).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoCompatibleProvider`] if no registered provider
    /// is both device-compatible and not circuit-open, or if the policy
    /// is [`PreferredProviderPolicy::UserSelected`] and the requested
    /// provider is unavailable.
    pub fn route(
      &self,
      request : &InferenceRequest,
      signal_source : &dyn SignalSource,
      manifest : Option< &crate::manifest::ModelManifest >,
    ) -> Result< RoutingDecision, Error >
    {
      let candidates = self.providers.all();
      if candidates.is_empty()
      {
        return Err( Error::NoCompatibleProvider( "no providers registered".to_string() ) );
      }

      if self.policy == PreferredProviderPolicy::UserSelected
      {
        if let Some( preferred ) = &request.preferred_provider
        {
          let adapter = self.providers.get( preferred )?;
          let signals = signal_source.signals_for( preferred, &request.model );
          if signals.circuit_open
          {
            return Err( Error::NoCompatibleProvider( format!( "preferred provider {preferred} is circuit-open" ) ) );
          }
          let value = score( adapter.descriptor(), signals, request, self.weights, manifest, self.cost_sensitive );
          return Ok( RoutingDecision { chosen_provider_id : preferred.clone(), fallback_provider_ids : Vec::new(), score : value } );
        }
      }

      let mut scored : Vec< ( String, f64 ) > = candidates.iter()
        .filter( | adapter | device_compatible( adapter.descriptor().supported_devices.as_slice(), request.device_hint.as_deref() ) )
        .map( | adapter |
        {
          let signals = signal_source.signals_for( &adapter.descriptor().provider_id, &request.model );
          ( adapter.descriptor().provider_id.clone(), score( adapter.descriptor(), signals, request, self.weights, manifest, self.cost_sensitive ) )
        } )
        .filter( | ( _, value ) | *value > f64::MIN )
        .collect();

      if scored.is_empty()
      {
        return Err( Error::NoCompatibleProvider( "no device-compatible, available provider".to_string() ) );
      }

      scored.sort_by( | a, b | b.1.partial_cmp( &a.1 ).unwrap_or( core::cmp::Ordering::Equal ) );
      let ( chosen_id, chosen_score ) = scored.remove( 0 );
      let fallback_provider_ids = scored.into_iter().map( | ( id, _ ) | id ).collect();

      Ok( RoutingDecision { chosen_provider_id : chosen_id, fallback_provider_ids, score : chosen_score } )
    }
  }

  fn device_compatible( supported : &[ String ], hint : Option< &str > ) -> bool
  {
    match hint
    {
      None => true,
      Some( device ) => supported.iter().any( | d | d == device ),
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;
    use crate::provider::mock::MockAdapter;
    use crate::request::{ Message, Role };

    struct AllHealthy;
    impl SignalSource for AllHealthy
    {
      fn signals_for( &self, _provider_id : &str, _model_id : &str ) -> ProviderSignals
      {
        ProviderSignals { health_score : 1.0, load_fraction : 0.0, circuit_open : false, latency_p95 : None }
      }
    }

    struct OneCircuitOpen( String );
    impl SignalSource for OneCircuitOpen
    {
      fn signals_for( &self, provider_id : &str, _model_id : &str ) -> ProviderSignals
      {
        ProviderSignals { health_score : 1.0, load_fraction : 0.0, circuit_open : provider_id == self.0, latency_p95 : None }
      }
    }

    fn sample_request() -> InferenceRequest
    {
      InferenceRequest
      {
        request_id : "r1".into(),
        model : "m1".into(),
        messages : vec![ Message { role : Role::User, content : "hi".into(), name : None, tool_call_id : None } ],
        parameters : Default::default(),
        streaming : false,
        priority : 0,
        timeout : None,
        preferred_provider : None,
        device_hint : None,
        metadata : Default::default(),
      }
    }

    #[ test ]
    fn routes_to_best_scored_candidate()
    {
      let registry = Arc::new( ProviderRegistry::new() );
      registry.register( Arc::new( MockAdapter::new( "cheap" ).with_relative_cost( 0.1 ) ) );
      registry.register( Arc::new( MockAdapter::new( "expensive" ).with_relative_cost( 10.0 ) ) );
      let router = Router::new( registry, ScoringWeights::default(), PreferredProviderPolicy::Failover, true );

      let decision = router.route( &sample_request(), &AllHealthy, None ).unwrap();
      assert_eq!( decision.chosen_provider_id, "cheap" );
      assert_eq!( decision.fallback_provider_ids, vec![ "expensive".to_string() ] );
    }

    #[ test ]
    fn circuit_open_candidate_excluded()
    {
      let registry = Arc::new( ProviderRegistry::new() );
      registry.register( Arc::new( MockAdapter::new( "p1" ) ) );
      registry.register( Arc::new( MockAdapter::new( "p2" ) ) );
      let router = Router::new( registry, ScoringWeights::default(), PreferredProviderPolicy::Failover, true );

      let decision = router.route( &sample_request(), &OneCircuitOpen( "p1".to_string() ), None ).unwrap();
      assert_eq!( decision.chosen_provider_id, "p2" );
    }

    #[ test ]
    fn user_selected_policy_fails_hard_on_unavailable_preference()
    {
      let registry = Arc::new( ProviderRegistry::new() );
      registry.register( Arc::new( MockAdapter::new( "p1" ) ) );
      let router = Router::new( registry, ScoringWeights::default(), PreferredProviderPolicy::UserSelected, true );

      let mut request = sample_request();
      request.preferred_provider = Some( "p1".to_string() );
      let result = router.route( &request, &OneCircuitOpen( "p1".to_string() ), None );
      assert!( result.is_err() );
    }

    #[ test ]
    fn device_hint_filters_incompatible_providers()
    {
      let registry = Arc::new( ProviderRegistry::new() );
      registry.register( Arc::new( MockAdapter::new( "cpu-only" ).with_supported_devices( vec![ "cpu".to_string() ] ) ) );
      registry.register( Arc::new( MockAdapter::new( "cuda-only" ).with_supported_devices( vec![ "cuda".to_string() ] ) ) );
      let router = Router::new( registry, ScoringWeights::default(), PreferredProviderPolicy::Failover, true );

      let mut request = sample_request();
      request.device_hint = Some( "cuda".to_string() );
      let decision = router.route( &request, &AllHealthy, None ).unwrap();
      assert_eq!( decision.chosen_provider_id, "cuda-only" );
    }

    #[ test ]
    fn streaming_request_prefers_the_streaming_capable_provider()
    {
      let registry = Arc::new( ProviderRegistry::new() );
      registry.register( Arc::new( MockAdapter::new( "no-streaming" ).with_streaming( false ) ) );
      registry.register( Arc::new( MockAdapter::new( "streaming" ).with_streaming( true ) ) );
      let router = Router::new( registry, ScoringWeights::default(), PreferredProviderPolicy::Failover, true );

      let mut request = sample_request();
      request.streaming = true;
      let decision = router.route( &request, &AllHealthy, None ).unwrap();
      assert_eq!( decision.chosen_provider_id, "streaming" );
      assert!( decision.fallback_provider_ids.is_empty(), "the non-streaming provider must be excluded, not merely ranked last" );
    }

    #[ test ]
    fn streaming_request_with_no_compatible_provider_fails()
    {
      let registry = Arc::new( ProviderRegistry::new() );
      registry.register( Arc::new( MockAdapter::new( "no-streaming" ).with_streaming( false ) ) );
      let router = Router::new( registry, ScoringWeights::default(), PreferredProviderPolicy::Failover, true );

      let mut request = sample_request();
      request.streaming = true;
      assert!( router.route( &request, &AllHealthy, None ).is_err() );
    }
  }
}

::mod_interface::mod_interface!
{
  exposed use private::SignalSource;
  exposed use private::Router;
}
