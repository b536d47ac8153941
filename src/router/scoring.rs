//! Multi-factor provider scoring (spec.md §4.3) : a weighted sum of
//! factors plus penalties, computed fresh per request rather than cached,
//! since health and load factors are time-varying.

mod private
{
  use core::time::Duration;
  use crate::manifest::ModelManifest;
  use crate::provider::adapter::ProviderDescriptor;
  use crate::request::InferenceRequest;

  /// Effective timeout assumed by the latency scoring factor when a
  /// request carries no explicit `timeout` (spec.md §5 : "engine default
  /// 30 s"), mirroring [`crate::config::GatewayConfig::default_request_timeout`].
  pub const DEFAULT_TIMEOUT : Duration = Duration::from_secs( 30 );

  /// Per-provider signal snapshot consulted by [`score`]. Callers (the
  /// router) assemble this from the provider registry, health tracker,
  /// and quota/circuit-breaker state before scoring.
  #[ derive( Debug, Clone, Copy ) ]
  pub struct ProviderSignals
  {
    /// `1.0` fully healthy, `0.0` circuit-open/unhealthy.
    pub health_score : f64,
    /// Current in-flight load as a fraction of declared capacity, `[0,1]`.
    pub load_fraction : f64,
    /// Whether the provider's circuit breaker is currently open.
    pub circuit_open : bool,
    /// Rolling P95 latency for this `(provider, model)`, or `None` if no
    /// calls have been recorded yet (spec.md §4.3 : "0 if no data").
    pub latency_p95 : Option< Duration >,
  }

  /// Weights applied to each scoring factor (spec.md §4.3 : a weighted
  /// sum of factors). Must sum to a positive number; callers typically
  /// source this from [`crate::config::RouterConfig`].
  #[ derive( Debug, Clone, Copy ) ]
  pub struct ScoringWeights
  {
    /// Weight applied to provider health.
    pub health : f64,
    /// Weight applied to `1 - load_fraction` (prefer idle providers).
    pub availability : f64,
    /// Weight applied to `1 - normalized relative cost` (prefer cheaper).
    pub cost : f64,
    /// Bonus applied when the provider matches the request's preferred
    /// provider hint.
    pub preference_bonus : f64,
    /// Bonus applied when the provider's supported devices include the
    /// request's device hint.
    pub device_affinity_bonus : f64,
    /// Bonus applied when the provider declares native support for a
    /// format the resolved `ModelManifest` actually carries an artifact
    /// for, or is tagged as the manifest's serving provider (spec.md §4.3
    /// : "+50 if any artifact format is in `provider.supportedFormats`").
    pub native_format_bonus : f64,
    /// Bonus applied when streaming is requested and the provider
    /// supports it (spec.md §4.3 : "+15 streaming-supported when
    /// streaming requested"). A provider that lacks a requested feature
    /// (streaming, tool use) does not merely lose this bonus — it is
    /// excluded outright, the same way a circuit-open provider is;
    /// see [`score`].
    pub feature_compat_bonus : f64,
    /// Bonus applied when P95 latency is comfortably under the effective
    /// timeout (spec.md §4.3 : "+30 if P95 < 2/3·timeout").
    pub latency_comfortable_bonus : f64,
    /// Bonus applied when P95 latency is under, but not comfortably under,
    /// the effective timeout (spec.md §4.3 : "+15 if P95 < timeout").
    pub latency_acceptable_bonus : f64,
    /// Penalty applied when P95 latency meets or exceeds the effective
    /// timeout (spec.md §4.3 : "−20 if P95 ≥ timeout").
    pub latency_breach_penalty : f64,
  }

  impl Default for ScoringWeights
  {
    fn default() -> Self
    {
      Self
      {
        health : 0.4, availability : 0.3, cost : 0.2,
        preference_bonus : 0.2, device_affinity_bonus : 0.15, native_format_bonus : 0.25,
        feature_compat_bonus : 0.15,
        latency_comfortable_bonus : 0.3, latency_acceptable_bonus : 0.15, latency_breach_penalty : 0.2,
      }
    }
  }

  /// Score one provider for one request. Higher is better; a
  /// circuit-open provider, or one missing a feature the request
  /// requires (streaming, tool use), always scores `f64::MIN` so it
  /// never wins (spec.md §4.3, §8 : "streaming requested but provider
  /// lacks streaming ... another provider preferred, or
  /// `NoCompatibleProvider` if none" — the same exclusion spec.md §8
  /// gives circuit-open providers, so a soft penalty alone would not
  /// guarantee it).
  ///
  /// `cost_sensitive` gates the cost-bias factor (spec.md §4.3 : "cost
  /// bias ... when cost-sensitive"; spec.md §6 `router.cost_sensitive_default`)
  /// — when `false` the cost factor contributes nothing, so providers are
  /// not ranked by price.
  #[ must_use ]
  pub fn score(
    descriptor : &ProviderDescriptor,
    signals : ProviderSignals,
    request : &InferenceRequest,
    weights : ScoringWeights,
    manifest : Option< &ModelManifest >,
    cost_sensitive : bool,
  ) -> f64
  {
    if signals.circuit_open
    {
      return f64::MIN;
    }
    if request.streaming && !descriptor.supports_streaming
    {
      return f64::MIN;
    }
    if request.requires_tool_use() && !descriptor.tool_calling
    {
      return f64::MIN;
    }

    let mut total = 0.0;
    total += weights.health * signals.health_score;
    total += weights.availability * ( 1.0 - signals.load_fraction.clamp( 0.0, 1.0 ) );

    if cost_sensitive
    {
      let normalized_cost = descriptor.relative_cost / ( 1.0 + descriptor.relative_cost );
      total += weights.cost * ( 1.0 - normalized_cost );
    }

    if let Some( preferred ) = &request.preferred_provider
    {
      if preferred == &descriptor.provider_id
      {
        total += weights.preference_bonus;
      }
    }

    if let Some( device ) = &request.device_hint
    {
      if descriptor.supported_devices.iter().any( | d | d == device )
      {
        total += weights.device_affinity_bonus;
      }
    }

    if let Some( manifest ) = manifest
    {
      if native_format_match( descriptor, manifest )
      {
        total += weights.native_format_bonus;
      }
    }

    if request.streaming
    {
      total += weights.feature_compat_bonus;
    }

    if let Some( p95 ) = signals.latency_p95
    {
      let timeout = request.timeout.unwrap_or( DEFAULT_TIMEOUT );
      if p95 < timeout.mul_f64( 2.0 / 3.0 )
      {
        total += weights.latency_comfortable_bonus;
      }
      else if p95 < timeout
      {
        total += weights.latency_acceptable_bonus;
      }
      else
      {
        total -= weights.latency_breach_penalty;
      }
    }

    total
  }

  /// Whether `descriptor` natively serves `manifest` : either it declares
  /// support for a format the manifest actually has an artifact for, or
  /// the manifest names this provider as its serving cloud provider
  /// (spec.md §4.3, §3 `ModelManifest.providerId`).
  #[ must_use ]
  pub fn native_format_match( descriptor : &ProviderDescriptor, manifest : &ModelManifest ) -> bool
  {
    descriptor.supported_formats.iter().any( | format | manifest.artifacts.contains_key( format ) )
      || manifest.provider_tag.as_deref() == Some( descriptor.provider_id.as_str() )
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;
    use crate::manifest::{ ArtifactFormat, ArtifactLocation, ModelManifest };
    use crate::request::{ Message, Role };
    use std::collections::HashMap;

    fn descriptor( id : &str, cost : f64, devices : &[ &str ] ) -> ProviderDescriptor
    {
      ProviderDescriptor
      {
        provider_id : id.to_string(),
        version : "1.0.0".to_string(),
        supported_devices : devices.iter().map( | d | d.to_string() ).collect(),
        supports_streaming : true,
        relative_cost : cost,
        supported_formats : Vec::new(),
        tool_calling : false,
        multimodal : false,
        max_context : None,
        max_output : None,
      }
    }

    fn manifest_with_artifact( format : ArtifactFormat ) -> ModelManifest
    {
      let mut artifacts = HashMap::new();
      artifacts.insert( format, ArtifactLocation { uri : "file:///m.bin".into(), checksum : "abc".into(), size_bytes : 1, etag : None } );
      ModelManifest
      {
        model_id : "m1".into(), tenant_id : "default".into(), name : "m1".into(), version : "1".into(),
        artifacts, supported_devices : vec![ "cpu".into() ], resource_requirements : Default::default(),
        provider_tag : None, metadata : Default::default(),
      }
    }

    fn request_with( preferred : Option< &str >, device : Option< &str > ) -> InferenceRequest
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
        preferred_provider : preferred.map( str::to_string ),
        device_hint : device.map( str::to_string ),
        metadata : Default::default(),
      }
    }

    fn signals( health : f64, load : f64, circuit_open : bool ) -> ProviderSignals
    {
      ProviderSignals { health_score : health, load_fraction : load, circuit_open, latency_p95 : None }
    }

    #[ test ]
    fn circuit_open_provider_never_wins()
    {
      let descriptor = descriptor( "p1", 1.0, &[ "cpu" ] );
      let sigs = signals( 1.0, 0.0, true );
      let request = request_with( None, None );
      assert_eq!( score( &descriptor, sigs, &request, ScoringWeights::default(), None, true ), f64::MIN );
    }

    #[ test ]
    fn preferred_provider_scores_higher()
    {
      let descriptor = descriptor( "p1", 1.0, &[ "cpu" ] );
      let sigs = signals( 1.0, 0.0, false );
      let weights = ScoringWeights::default();

      let without = score( &descriptor, sigs, &request_with( None, None ), weights, None, true );
      let with = score( &descriptor, sigs, &request_with( Some( "p1" ), None ), weights, None, true );
      assert!( with > without );
    }

    #[ test ]
    fn device_affinity_scores_higher()
    {
      let descriptor = descriptor( "p1", 1.0, &[ "cuda" ] );
      let sigs = signals( 1.0, 0.0, false );
      let weights = ScoringWeights::default();

      let without = score( &descriptor, sigs, &request_with( None, None ), weights, None, true );
      let with = score( &descriptor, sigs, &request_with( None, Some( "cuda" ) ), weights, None, true );
      assert!( with > without );
    }

    #[ test ]
    fn higher_load_scores_lower()
    {
      let descriptor = descriptor( "p1", 1.0, &[ "cpu" ] );
      let weights = ScoringWeights::default();
      let idle = signals( 1.0, 0.0, false );
      let busy = signals( 1.0, 0.9, false );
      let request = request_with( None, None );

      assert!( score( &descriptor, idle, &request, weights, None, true ) > score( &descriptor, busy, &request, weights, None, true ) );
    }

    #[ test ]
    fn native_format_match_scores_higher()
    {
      let mut gguf_descriptor = descriptor( "local", 0.1, &[ "cpu" ] );
      gguf_descriptor.supported_formats = vec![ ArtifactFormat::Gguf ];
      let cloud_descriptor = descriptor( "cloud", 0.1, &[ "cpu" ] );
      let sigs = signals( 1.0, 0.0, false );
      let weights = ScoringWeights::default();
      let request = request_with( None, None );
      let manifest = manifest_with_artifact( ArtifactFormat::Gguf );

      let without = score( &cloud_descriptor, sigs, &request, weights, Some( &manifest ), true );
      let with = score( &gguf_descriptor, sigs, &request, weights, Some( &manifest ), true );
      assert!( with > without );
    }

    #[ test ]
    fn provider_tag_alone_counts_as_native_format_match()
    {
      let descriptor = descriptor( "openai", 1.0, &[ "cpu" ] );
      let mut manifest = manifest_with_artifact( ArtifactFormat::Gguf );
      manifest.artifacts.clear();
      manifest.provider_tag = Some( "openai".to_string() );
      assert!( native_format_match( &descriptor, &manifest ) );
    }

    #[ test ]
    fn streaming_requested_but_unsupported_is_excluded_like_circuit_open()
    {
      let mut streaming_capable = descriptor( "p1", 1.0, &[ "cpu" ] );
      streaming_capable.supports_streaming = true;
      let mut streaming_incapable = descriptor( "p2", 1.0, &[ "cpu" ] );
      streaming_incapable.supports_streaming = false;
      let sigs = signals( 1.0, 0.0, false );
      let weights = ScoringWeights::default();
      let mut request = request_with( None, None );
      request.streaming = true;

      let capable_score = score( &streaming_capable, sigs, &request, weights, None, true );
      let incapable_score = score( &streaming_incapable, sigs, &request, weights, None, true );
      assert_eq!( incapable_score, f64::MIN, "a non-streaming provider must never be preferred over a compatible one" );
      assert!( capable_score > incapable_score );
    }

    #[ test ]
    fn non_streaming_request_does_not_penalize_a_non_streaming_provider()
    {
      let mut streaming_incapable = descriptor( "p1", 1.0, &[ "cpu" ] );
      streaming_incapable.supports_streaming = false;
      let sigs = signals( 1.0, 0.0, false );
      let weights = ScoringWeights::default();
      let request = request_with( None, None );

      assert!( score( &streaming_incapable, sigs, &request, weights, None, true ) > f64::MIN );
    }

    #[ test ]
    fn tool_use_required_but_unsupported_is_excluded_like_circuit_open()
    {
      let mut tool_capable = descriptor( "p1", 1.0, &[ "cpu" ] );
      tool_capable.tool_calling = true;
      let tool_incapable = descriptor( "p2", 1.0, &[ "cpu" ] );
      let sigs = signals( 1.0, 0.0, false );
      let weights = ScoringWeights::default();
      let mut request = request_with( None, None );
      request.parameters.insert( "tools".to_string(), serde_json::json!( [ { "name" : "lookup" } ] ) );

      let capable_score = score( &tool_capable, sigs, &request, weights, None, true );
      let incapable_score = score( &tool_incapable, sigs, &request, weights, None, true );
      assert_eq!( incapable_score, f64::MIN, "a non-tool-calling provider must never be preferred over a compatible one" );
      assert!( capable_score > incapable_score );
    }

    #[ test ]
    fn latency_tiers_rank_comfortable_above_acceptable_above_breach()
    {
      let descriptor = descriptor( "p1", 1.0, &[ "cpu" ] );
      let weights = ScoringWeights::default();
      let request = request_with( None, None );

      let comfortable = ProviderSignals { latency_p95 : Some( Duration::from_secs( 5 ) ), ..signals( 1.0, 0.0, false ) };
      let acceptable = ProviderSignals { latency_p95 : Some( Duration::from_secs( 25 ) ), ..signals( 1.0, 0.0, false ) };
      let breach = ProviderSignals { latency_p95 : Some( Duration::from_secs( 40 ) ), ..signals( 1.0, 0.0, false ) };

      let comfortable_score = score( &descriptor, comfortable, &request, weights, None, true );
      let acceptable_score = score( &descriptor, acceptable, &request, weights, None, true );
      let breach_score = score( &descriptor, breach, &request, weights, None, true );

      assert!( comfortable_score > acceptable_score );
      assert!( acceptable_score > breach_score );
    }

    #[ test ]
    fn cost_sensitivity_gates_the_cost_factor()
    {
      let cheap = descriptor( "p1", 0.1, &[ "cpu" ] );
      let expensive = descriptor( "p2", 5.0, &[ "cpu" ] );
      let sigs = signals( 1.0, 0.0, false );
      let weights = ScoringWeights::default();
      let request = request_with( None, None );

      let cheap_insensitive = score( &cheap, sigs, &request, weights, None, false );
      let expensive_insensitive = score( &expensive, sigs, &request, weights, None, false );
      assert!( ( cheap_insensitive - expensive_insensitive ).abs() < f64::EPSILON );

      let cheap_sensitive = score( &cheap, sigs, &request, weights, None, true );
      let expensive_sensitive = score( &expensive, sigs, &request, weights, None, true );
      assert!( cheap_sensitive > expensive_sensitive );
    }
  }
}

::mod_interface::mod_interface!
{
  exposed use private::ProviderSignals;
  exposed use private::ScoringWeights;
  exposed use private::score;
}
