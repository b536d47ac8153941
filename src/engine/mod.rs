//! The request-lifecycle engine (spec.md §4.2, §4.4) : drives a request
//! through `VALIDATION -> PRE_PROCESSING -> PROVIDER_DISPATCH ->
//! POST_PROCESSING`, applying the plugin pipeline, router, reliability
//! envelope (circuit breaker, retry, quota), and single-hop failover.

/// Audit event emission seam.
pub mod audit;
/// Async single-job status tracking.
pub mod jobs;

mod private
{
  use std::collections::HashMap;
  use std::sync::{ Arc, Mutex };
  use tokio_stream::StreamExt;
  use crate::context::{ InferenceContext, Phase, RequestStatus, Signal };
  use crate::engine::audit::{ AuditEvent, AuditSink, NoopAuditSink };
  use crate::error::Error;
  use crate::manifest::repository::ModelRepository;
  use crate::manifest::ModelManifest;
  use crate::metrics::{ MetricEvent, MetricsSink, NoopMetricsSink };
  use crate::pipeline::plugin::Outcome;
  use crate::pipeline::registry::PluginRegistry;
  use crate::provider::adapter::ProviderAdapter;
  use crate::provider::registry::ProviderRegistry;
  use crate::reliability::circuit_breaker::{ execute_with_circuit_breaker, CircuitBreakerRegistry };
  use crate::reliability::health::HealthRegistry;
  use crate::reliability::provider_quota::QuotaEnforcer;
  use crate::reliability::retry::{ execute_with_retries, RetryConfig };
  use crate::request::InferenceRequest;
  use crate::response::{ Chunk, Response };
  use crate::router::metrics_cache::RuntimeMetricsCache;
  use crate::router::scoring::ProviderSignals;
  use crate::router::{ Router, SignalSource };
  use crate::streaming::{ self, CancellationToken, ChunkStream, StreamProgress };
  use crate::tenant::TenantContext;

  struct CircuitAwareSignalSource< 'a >
  {
    circuit_breakers : &'a CircuitBreakerRegistry,
    health : &'a HealthRegistry,
    metrics_cache : &'a RuntimeMetricsCache,
  }

  impl< 'a > SignalSource for CircuitAwareSignalSource< 'a >
  {
    fn signals_for( &self, provider_id : &str, model_id : &str ) -> ProviderSignals
    {
      let base_health = self.health.report_for( provider_id ).status.as_score();
      let error_rate = self.metrics_cache.error_rate( provider_id, model_id ).unwrap_or( 0.0 );
      ProviderSignals
      {
        health_score : ( base_health * ( 1.0 - error_rate ) ).clamp( 0.0, 1.0 ),
        load_fraction : self.metrics_cache.load_fraction( provider_id, model_id ),
        circuit_open : self.circuit_breakers.is_open( provider_id ),
        latency_p95 : self.metrics_cache.p95_latency( provider_id, model_id ),
      }
    }
  }

  /// Owns every collaborator needed to run a request end to end :
  /// plugins, providers, router, and the reliability envelope. Built
  /// once by [`crate::runtime::Runtime`] and shared across requests.
  pub struct Engine
  {
    plugins : PluginRegistry,
    providers : Arc< ProviderRegistry >,
    router : Router,
    circuit_breakers : CircuitBreakerRegistry,
    health : HealthRegistry,
    metrics_cache : RuntimeMetricsCache,
    retry_config : RetryConfig,
    quota : QuotaEnforcer,
    repository : Option< Arc< dyn ModelRepository > >,
    metrics : Arc< dyn MetricsSink >,
    audit : Arc< dyn AuditSink >,
    in_flight : Mutex< HashMap< String, CancellationToken > >,
  }

  impl core::fmt::Debug for Engine
  {
    fn fmt( &self, f : &mut core::fmt::Formatter< '_ > ) -> core::fmt::Result
    {
      f.debug_struct( "Engine" ).finish()
    }
  }

  impl Engine
  {
    /// Construct an engine from its collaborators.
    #[ must_use ]
    pub fn new(
      plugins : PluginRegistry,
      providers : Arc< ProviderRegistry >,
      router : Router,
      circuit_breakers : CircuitBreakerRegistry,
      retry_config : RetryConfig,
      quota : QuotaEnforcer,
    ) -> Self
    {
      Self
      {
        plugins, providers, router, circuit_breakers, retry_config, quota,
        health : HealthRegistry::new(),
        metrics_cache : RuntimeMetricsCache::default(),
        repository : None,
        metrics : Arc::new( NoopMetricsSink ),
        audit : Arc::new( NoopAuditSink ),
        in_flight : Mutex::new( HashMap::new() ),
      }
    }

    /// Probe every registered provider and cache the result (spec.md
    /// §4.4 `Health()`), so subsequent routing decisions consult
    /// up-to-date `health_score` signals rather than the optimistic
    /// default. Intended to be driven by a periodic maintenance sweep
    /// (see [`crate::runtime::Runtime::run_maintenance`]), not called
    /// inline on the request path.
    pub async fn refresh_health( &self )
    {
      self.health.refresh_all( &self.providers.all() ).await;
    }

    /// Wire in a [`ModelRepository`] so every request resolves a
    /// [`ModelManifest`](crate::manifest::ModelManifest) before routing
    /// (spec.md §4.1 : `ModelNotFound` when repository lookup returns
    /// empty; §4.3 : the router's `manifest` input). Without a repository
    /// wired in, requests route purely on device/signal compatibility and
    /// `ModelNotFound` can never be produced — a deployment with no
    /// manifest store still behaves exactly as before this was added.
    #[ must_use ]
    pub fn with_repository( mut self, repository : Arc< dyn ModelRepository > ) -> Self
    {
      self.repository = Some( repository );
      self
    }

    /// Replace the metrics sink (default discards every event).
    #[ must_use ]
    pub fn with_metrics_sink( mut self, sink : Arc< dyn MetricsSink > ) -> Self
    {
      self.metrics = sink;
      self
    }

    /// Replace the audit sink (default discards every event).
    #[ must_use ]
    pub fn with_audit_sink( mut self, sink : Arc< dyn AuditSink > ) -> Self
    {
      self.audit = sink;
      self
    }

    /// Run `request` for `tenant` through the full pipeline.
    ///
    /// Registers a per-request [`CancellationToken`] for the duration of the
    /// call so a concurrent [`Engine::cancel`] by `request_id` can interrupt
    /// the single suspension point that matters here : the provider
    /// dispatch itself (spec.md §5 : "in-flight provider calls receive a
    /// cancellation token").
    ///
    /// # Errors
    ///
    /// Returns the terminal [`Error`] if validation, routing, quota, the
    /// circuit breaker, or every retry/failover attempt fails, or
    /// [`Error::Cancelled`] if [`Engine::cancel`] fires before dispatch
    /// completes.
    pub async fn execute( &self, request : InferenceRequest, tenant : &TenantContext ) -> Result< Response, Error >
    {
      let request_id = request.request_id.clone();
      let cancellation = CancellationToken::new();
      self.in_flight.lock().unwrap().insert( request_id.clone(), cancellation.clone() );
      let outcome = self.execute_cancellable( request, tenant, &cancellation ).await;
      self.in_flight.lock().unwrap().remove( &request_id );
      outcome
    }

    /// Request cancellation of the in-flight, non-streaming call for
    /// `request_id` (spec.md §4.1 `Cancel`). Returns `true` if a matching
    /// in-flight call was found and signalled, `false` if no such call is
    /// currently running (already terminal, unknown id, or a streaming call
    /// whose caller-supplied token should be cancelled directly instead).
    #[ must_use ]
    pub fn cancel( &self, request_id : &str ) -> bool
    {
      match self.in_flight.lock().unwrap().get( request_id )
      {
        Some( token ) => { token.cancel(); true }
        None => false,
      }
    }

    async fn execute_cancellable(
      &self,
      request : InferenceRequest,
      tenant : &TenantContext,
      cancellation : &CancellationToken,
    ) -> Result< Response, Error >
    {
      let mut context = InferenceContext::new( request, tenant.tenant_id() );
      context.transition( Signal::Start )?;

      self.run_phase( &mut context, Phase::Validation )?;
      self.run_phase( &mut context, Phase::PreProcessing )?;

      let dispatch_result = tokio::select!
      {
        () = cancellation.cancelled() => Err( Error::Cancelled ),
        result = self.dispatch( &mut context ) => result,
      };

      match dispatch_result
      {
        Ok( response ) => context.response = Some( response ),
        Err( error ) =>
        {
          context.error = Some( error.clone() );
          let signal = if matches!( error, Error::Cancelled ) { Signal::CancelRequested } else { Signal::TerminalFailure };
          context.transition( signal )?;
          self.emit_terminal( &context, None );
          return Err( error );
        }
      }

      self.run_phase( &mut context, Phase::PostProcessing )?;
      context.transition( Signal::PipelineCompleted )?;

      let provider_id = context.response.as_ref().and_then( | r | r.metadata.get( "provider_id" ).cloned() );
      self.emit_terminal( &context, provider_id );

      Ok( context.response.expect( "response set on the success path above" ) )
    }

    /// Run `request` as a streamed dispatch (spec.md §4.9). Validation and
    /// pre-processing run synchronously as for [`Engine::execute`]; the
    /// returned stream forwards provider chunks until the final chunk,
    /// an upstream error, or `cancellation` fires, guaranteeing exactly
    /// one terminal audit/metrics event regardless of which of those three
    /// ends the stream (spec.md §4.9, §8 invariant 5).
    ///
    /// # Errors
    ///
    /// Returns an `Err` if validation, pre-processing, routing, quota, or
    /// the initial `invoke_streaming` call fails before any chunk is
    /// produced. Once the stream has been returned, failures surface as
    /// `Err` items within it rather than as a `Result::Err` here.
    pub async fn execute_streaming(
      &self,
      request : InferenceRequest,
      tenant : &TenantContext,
      cancellation : CancellationToken,
    ) -> Result< ChunkStream, Error >
    {
      let mut context = InferenceContext::new( request, tenant.tenant_id() );
      context.transition( Signal::Start )?;

      self.run_phase( &mut context, Phase::Validation )?;
      self.run_phase( &mut context, Phase::PreProcessing )?;

      context.phase = Phase::ProviderDispatch;
      let manifest = self.resolve_manifest( &context.tenant_id, &context.request.model )?;
      let signal_source = CircuitAwareSignalSource { circuit_breakers : &self.circuit_breakers, health : &self.health, metrics_cache : &self.metrics_cache };
      let decision = self.router.route( &context.request, &signal_source, manifest.as_ref() )?;
      self.quota.check_and_increment( &context.tenant_id, &decision.chosen_provider_id )?;
      let adapter = self.providers.get( &decision.chosen_provider_id )?;
      let inner = adapter.invoke_streaming( &context.request ).await?;

      let request_id = context.request.request_id.clone();
      let tenant_id = context.tenant_id.clone();
      let provider_id = decision.chosen_provider_id.clone();
      let metrics = Arc::clone( &self.metrics );
      let audit = Arc::clone( &self.audit );

      let ( tx, out ) = streaming::channel( streaming::DEFAULT_CHANNEL_CAPACITY );
      tokio::spawn( async move
      {
        let mut inner = inner;
        let mut progress = StreamProgress::new();
        loop
        {
          tokio::select!
          {
            _ = cancellation.cancelled() =>
            {
              let _ = tx.send( Ok( Chunk
              {
                request_id : request_id.clone(),
                delta : String::new(),
                is_final : true,
                metadata : HashMap::from( [ ( "cancelled".to_string(), "true".to_string() ) ] ),
              } ) ).await;
              emit_stream_terminal( &audit, &metrics, &request_id, &tenant_id, &provider_id, RequestStatus::Cancelled, "cancelled" );
              return;
            }
            item = inner.next() =>
            {
              match item
              {
                Some( Ok( chunk ) ) =>
                {
                  progress.record_chunk();
                  let is_final = chunk.is_final;
                  let _ = tx.send( Ok( chunk ) ).await;
                  if is_final
                  {
                    emit_stream_terminal( &audit, &metrics, &request_id, &tenant_id, &provider_id, RequestStatus::Completed, "completed" );
                    return;
                  }
                }
                Some( Err( error ) ) =>
                {
                  let _ = tx.send( Err( error ) ).await;
                  emit_stream_terminal( &audit, &metrics, &request_id, &tenant_id, &provider_id, RequestStatus::Failed, "failed" );
                  return;
                }
                None =>
                {
                  emit_stream_terminal( &audit, &metrics, &request_id, &tenant_id, &provider_id, RequestStatus::Completed, "completed" );
                  return;
                }
              }
            }
          }
        }
      } );

      Ok( out )
    }

    fn run_phase( &self, context : &mut InferenceContext, phase : Phase ) -> Result< (), Error >
    {
      context.phase = phase;
      for plugin in self.plugins.plugins_for( phase )
      {
        match plugin.execute( context, phase )?
        {
          Outcome::Continue => {}
          Outcome::ShortCircuit => break,
          Outcome::Abort( reason ) =>
          {
            let error = Error::ValidationError( reason );
            context.error = Some( error.clone() );
            context.transition( Signal::TerminalFailure )?;
            self.emit_terminal( context, None );
            return Err( error );
          }
          Outcome::Deny( reason ) =>
          {
            let error = Error::PolicyDenied( reason );
            context.error = Some( error.clone() );
            context.transition( Signal::TerminalFailure )?;
            self.emit_terminal( context, None );
            return Err( error );
          }
          Outcome::Retry( reason ) =>
          {
            let error = Error::UpstreamTransient( reason );
            context.error = Some( error.clone() );
            context.transition( Signal::RetryableFailure )?;
            context.transition( Signal::Start )?;
          }
        }
      }
      Ok( () )
    }

    /// Resolve the request's `ModelManifest` when a [`ModelRepository`]
    /// has been wired in via [`Engine::with_repository`]. Absent a
    /// repository, routing proceeds on device/signal compatibility alone
    /// (spec.md §4.1 `ModelNotFound`; §4.3 router `manifest` input).
    fn resolve_manifest( &self, tenant_id : &str, model_id : &str ) -> Result< Option< ModelManifest >, Error >
    {
      match &self.repository
      {
        Some( repository ) => repository.resolve( tenant_id, model_id ).map( Some ),
        None => Ok( None ),
      }
    }

    async fn dispatch( &self, context : &mut InferenceContext ) -> Result< Response, Error >
    {
      context.phase = Phase::ProviderDispatch;
      let manifest = self.resolve_manifest( &context.tenant_id, &context.request.model )?;
      let signal_source = CircuitAwareSignalSource { circuit_breakers : &self.circuit_breakers, health : &self.health, metrics_cache : &self.metrics_cache };
      let decision = self.router.route( &context.request, &signal_source, manifest.as_ref() )?;

      // Fallback chains no further than one hop (spec.md Design Notes §9
      // Open Question : "source code shows only single-hop fallback; do
      // not extend").
      let mut candidate_ids = vec![ decision.chosen_provider_id.clone() ];
      if let Some( next ) = decision.next_fallback()
      {
        candidate_ids.push( next.to_string() );
      }

      let mut last_error = Error::NoCompatibleProvider( "no providers attempted".to_string() );

      for provider_id in candidate_ids
      {
        self.quota.check_and_increment( &context.tenant_id, &provider_id )?;
        let adapter = self.providers.get( &provider_id )?;
        let breaker = self.circuit_breakers.breaker_for( &provider_id );
        let request = context.request.clone();

        let call_guard = self.metrics_cache.enter( &provider_id, &context.request.model );
        let started_at = std::time::Instant::now();

        let retry_config = match context.request.max_retries_override()
        {
          Some( max_retries ) => RetryConfig { max_retries, ..self.retry_config.clone() },
          None => self.retry_config.clone(),
        };

        let attempt = execute_with_circuit_breaker( &breaker, &provider_id, ||
        {
          let request = request.clone();
          let adapter = Arc::clone( &adapter );
          let retry_config = retry_config.clone();
          async move
          {
            execute_with_retries( &retry_config, | _attempt |
            {
              let request = request.clone();
              let adapter = Arc::clone( &adapter );
              async move { adapter.invoke( &request ).await }
            } ).await
          }
        } ).await;

        drop( call_guard );
        self.metrics_cache.record_completion( &provider_id, &context.request.model, started_at.elapsed(), attempt.is_ok() );

        match attempt
        {
          Ok( response ) => return Ok( response ),
          Err( error ) =>
          {
            if let Error::RateLimited { retry_after_ms, .. } = &error
            {
              self.quota.mark_rate_limited( &provider_id, std::time::Duration::from_millis( *retry_after_ms ) );
            }
            if !error.fallback_eligible()
            {
              return Err( error );
            }
            last_error = error;
          }
        }
      }

      Err( last_error )
    }

    fn emit_terminal( &self, context : &InferenceContext, provider_id : Option< String > )
    {
      self.metrics.record( MetricEvent::RequestTerminal
      {
        request_id : context.request.request_id.clone(),
        tenant_id : context.tenant_id.clone(),
        provider_id : provider_id.clone(),
        outcome : terminal_label( context ),
      } );
      self.audit.record( AuditEvent
      {
        request_id : context.request.request_id.clone(),
        tenant_id : context.tenant_id.clone(),
        provider_id,
        status : context.status,
        attempt : context.attempt,
        recorded_at : chrono::Utc::now(),
      } );
    }
  }

  fn emit_stream_terminal(
    audit : &Arc< dyn AuditSink >,
    metrics : &Arc< dyn MetricsSink >,
    request_id : &str,
    tenant_id : &str,
    provider_id : &str,
    status : RequestStatus,
    outcome : &'static str,
  )
  {
    metrics.record( MetricEvent::RequestTerminal
    {
      request_id : request_id.to_string(),
      tenant_id : tenant_id.to_string(),
      provider_id : Some( provider_id.to_string() ),
      outcome,
    } );
    audit.record( AuditEvent
    {
      request_id : request_id.to_string(),
      tenant_id : tenant_id.to_string(),
      provider_id : Some( provider_id.to_string() ),
      status,
      attempt : 1,
      recorded_at : chrono::Utc::now(),
    } );
  }

  fn terminal_label( context : &InferenceContext ) -> &'static str
  {
    match context.status
    {
      crate::context::RequestStatus::Completed => "completed",
      crate::context::RequestStatus::Failed => "failed",
      crate::context::RequestStatus::Cancelled => "cancelled",
      _ => "non_terminal",
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;
    use core::time::Duration;
    use crate::pipeline::builtin::{ PassThroughPostProcessingPlugin, PassThroughPreProcessingPlugin, RequestValidationPlugin };
    use crate::provider::mock::MockAdapter;
    use crate::reliability::circuit_breaker::CircuitBreakerConfig;
    use crate::reliability::quota::{ QuotaAlgorithm, QuotaPolicy };
    use crate::reliability::retry::RetryConfig;
    use crate::request::{ Message, Role };
    use crate::router::decision::PreferredProviderPolicy;
    use crate::router::scoring::ScoringWeights;

    fn sample_request() -> InferenceRequest
    {
      InferenceRequest
      {
        request_id : "r1".into(),
        model : "m1".into(),
        messages : vec![ Message { role : Role::User, content : "hi there".into(), name : None, tool_call_id : None } ],
        parameters : Default::default(),
        streaming : false,
        priority : 0,
        timeout : None,
        preferred_provider : None,
        device_hint : None,
        metadata : Default::default(),
      }
    }

    fn lenient_quota() -> QuotaEnforcer
    {
      let generous = QuotaPolicy { algorithm : QuotaAlgorithm::TokenBucket, limit : 1000, period : Duration::from_secs( 60 ) };
      QuotaEnforcer::new( generous, generous )
    }

    fn build_engine( providers : Arc< ProviderRegistry > ) -> Engine
    {
      let mut plugins = PluginRegistry::new();
      plugins.register( Arc::new( RequestValidationPlugin ) ).unwrap();
      plugins.register( Arc::new( PassThroughPreProcessingPlugin ) ).unwrap();
      plugins.register( Arc::new( PassThroughPostProcessingPlugin ) ).unwrap();

      let router = Router::new( Arc::clone( &providers ), ScoringWeights::default(), PreferredProviderPolicy::Failover, true );
      let circuit_breakers = CircuitBreakerRegistry::new( CircuitBreakerConfig { failure_threshold : 2, ..CircuitBreakerConfig::default() } );
      let retry_config = RetryConfig { max_retries : 1, base_delay : Duration::from_millis( 1 ), max_elapsed_time : None, ..RetryConfig::default() };

      Engine::new( plugins, providers, router, circuit_breakers, retry_config, lenient_quota() )
    }

    #[ tokio::test ]
    async fn happy_path_completes()
    {
      let providers = Arc::new( ProviderRegistry::new() );
      providers.register( Arc::new( MockAdapter::new( "p1" ) ) );
      let engine = build_engine( providers );

      let tenant = TenantContext::default_tenant();
      let response = engine.execute( sample_request(), &tenant ).await.unwrap();
      assert_eq!( response.content, "hi there" );
    }

    #[ tokio::test ]
    async fn invalid_request_aborts_before_dispatch()
    {
      let providers = Arc::new( ProviderRegistry::new() );
      providers.register( Arc::new( MockAdapter::new( "p1" ) ) );
      let engine = build_engine( providers );

      let mut request = sample_request();
      request.messages.clear();

      let tenant = TenantContext::default_tenant();
      let result = engine.execute( request, &tenant ).await;
      assert!( matches!( result, Err( Error::ValidationError( _ ) ) ) );
    }

    #[ tokio::test ]
    async fn cancel_interrupts_an_in_flight_dispatch()
    {
      let providers = Arc::new( ProviderRegistry::new() );
      providers.register( Arc::new( MockAdapter::new( "slow" ).with_latency( Duration::from_millis( 200 ) ) ) );
      let engine = Arc::new( build_engine( providers ) );

      let tenant = TenantContext::default_tenant();
      let engine_for_call = Arc::clone( &engine );
      let handle = tokio::spawn( async move { engine_for_call.execute( sample_request(), &tenant ).await } );

      // Give the call time to register itself in `in_flight` before cancelling.
      tokio::time::sleep( Duration::from_millis( 20 ) ).await;
      assert!( engine.cancel( "r1" ) );

      let result = handle.await.unwrap();
      assert!( matches!( result, Err( Error::Cancelled ) ) );
    }

    #[ tokio::test ]
    async fn cancel_on_unknown_request_id_returns_false()
    {
      let providers = Arc::new( ProviderRegistry::new() );
      providers.register( Arc::new( MockAdapter::new( "p1" ) ) );
      let engine = build_engine( providers );

      assert!( !engine.cancel( "never-submitted" ) );
    }

    #[ tokio::test ]
    async fn falls_over_to_next_provider_on_transient_failure()
    {
      let providers = Arc::new( ProviderRegistry::new() );
      let failing = Arc::new( MockAdapter::new( "failing" ) );
      failing.fail_always();
      providers.register( failing );
      providers.register( Arc::new( MockAdapter::new( "healthy" ).with_relative_cost( 50.0 ) ) );
      let engine = build_engine( providers );

      let tenant = TenantContext::default_tenant();
      let response = engine.execute( sample_request(), &tenant ).await.unwrap();
      assert_eq!( response.metadata.get( "provider_id" ).map( String::as_str ), Some( "healthy" ) );
    }

    #[ tokio::test ]
    async fn streaming_dispatch_forwards_every_chunk_to_completion()
    {
      let providers = Arc::new( ProviderRegistry::new() );
      providers.register( Arc::new( MockAdapter::new( "p1" ) ) );
      let engine = build_engine( providers );

      let tenant = TenantContext::default_tenant();
      let stream = engine.execute_streaming( sample_request(), &tenant, CancellationToken::new() ).await.unwrap();
      let chunks = streaming::collect( stream ).await.unwrap();

      assert!( chunks.len() >= 2, "expected at least one content chunk plus a final chunk" );
      assert!( chunks.last().unwrap().is_final );
      assert!( !chunks.last().unwrap().metadata.contains_key( "cancelled" ) );
      let joined : String = chunks.iter().map( | c | c.delta.as_str() ).collect();
      assert_eq!( joined, "hi there" );
    }

    #[ tokio::test ]
    async fn streaming_dispatch_honors_a_token_cancelled_before_the_first_poll()
    {
      let providers = Arc::new( ProviderRegistry::new() );
      providers.register( Arc::new( MockAdapter::new( "p1" ) ) );
      let engine = build_engine( providers );

      // Cancelling before the stream is even returned guarantees the
      // forwarding task's first `select!` poll observes an already-resolved
      // `cancelled()` future racing against an empty, not-yet-populated
      // channel, so the cancellation arm wins deterministically.
      let cancellation = CancellationToken::new();
      cancellation.cancel();

      let tenant = TenantContext::default_tenant();
      let stream = engine.execute_streaming( sample_request(), &tenant, cancellation ).await.unwrap();
      let chunks = streaming::collect( stream ).await.unwrap();

      assert_eq!( chunks.len(), 1 );
      assert!( chunks[ 0 ].is_final );
      assert_eq!( chunks[ 0 ].metadata.get( "cancelled" ).map( String::as_str ), Some( "true" ) );
    }

    #[ tokio::test ]
    async fn missing_manifest_surfaces_model_not_found_when_a_repository_is_wired()
    {
      use crate::manifest::repository::InMemoryModelRepository;

      let providers = Arc::new( ProviderRegistry::new() );
      providers.register( Arc::new( MockAdapter::new( "p1" ) ) );
      let engine = build_engine( providers ).with_repository( Arc::new( InMemoryModelRepository::new() ) );

      let tenant = TenantContext::default_tenant();
      let result = engine.execute( sample_request(), &tenant ).await;
      assert!( matches!( result, Err( Error::ModelNotFound( _ ) ) ) );
    }

    #[ tokio::test ]
    async fn a_wired_repository_does_not_block_routing_once_the_manifest_resolves()
    {
      use std::collections::HashMap as StdHashMap;
      use crate::manifest::repository::InMemoryModelRepository;
      use crate::manifest::{ ModelManifest, ResourceRequirements };

      let repository = Arc::new( InMemoryModelRepository::new() );
      repository.register( ModelManifest
      {
        model_id : "m1".into(), tenant_id : "default".into(), name : "m1".into(), version : "1".into(),
        artifacts : StdHashMap::new(), supported_devices : vec![ "cpu".into() ],
        resource_requirements : ResourceRequirements::default(),
        provider_tag : Some( "p1".into() ), metadata : StdHashMap::new(),
      } );

      let providers = Arc::new( ProviderRegistry::new() );
      providers.register( Arc::new( MockAdapter::new( "p1" ) ) );
      let engine = build_engine( providers ).with_repository( repository );

      let tenant = TenantContext::default_tenant();
      let response = engine.execute( sample_request(), &tenant ).await.unwrap();
      assert_eq!( response.content, "hi there" );
    }

    #[ tokio::test ]
    async fn refreshing_health_routes_away_from_a_failing_provider()
    {
      let providers = Arc::new( ProviderRegistry::new() );
      let sickly = Arc::new( MockAdapter::new( "sickly" ) );
      sickly.fail_always();
      providers.register( sickly );
      providers.register( Arc::new( MockAdapter::new( "healthy" ) ) );
      let engine = build_engine( providers );

      engine.refresh_health().await;

      let tenant = TenantContext::default_tenant();
      let response = engine.execute( sample_request(), &tenant ).await.unwrap();
      assert_eq!( response.metadata.get( "provider_id" ).map( String::as_str ), Some( "healthy" ) );
    }

    #[ tokio::test ]
    async fn accumulated_errors_in_the_metrics_cache_route_away_from_a_flaky_provider()
    {
      let providers = Arc::new( ProviderRegistry::new() );
      providers.register( Arc::new( MockAdapter::new( "flaky" ) ) );
      providers.register( Arc::new( MockAdapter::new( "steady" ) ) );
      let engine = build_engine( providers );

      for _ in 0..5
      {
        engine.metrics_cache.record_completion( "flaky", "m1", Duration::from_millis( 5 ), false );
      }
      engine.metrics_cache.record_completion( "steady", "m1", Duration::from_millis( 5 ), true );

      let tenant = TenantContext::default_tenant();
      let response = engine.execute( sample_request(), &tenant ).await.unwrap();
      assert_eq!( response.metadata.get( "provider_id" ).map( String::as_str ), Some( "steady" ) );
    }

    #[ tokio::test ]
    async fn dispatch_records_call_outcomes_into_the_metrics_cache()
    {
      let providers = Arc::new( ProviderRegistry::new() );
      providers.register( Arc::new( MockAdapter::new( "p1" ) ) );
      let engine = build_engine( providers );

      let tenant = TenantContext::default_tenant();
      engine.execute( sample_request(), &tenant ).await.unwrap();

      assert_eq!( engine.metrics_cache.error_rate( "p1", "m1" ), Some( 0.0 ) );
      assert!( engine.metrics_cache.p95_latency( "p1", "m1" ).is_some() );
    }
  }
}

::mod_interface::mod_interface!
{
  exposed use private::Engine;
}
