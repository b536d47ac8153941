//! The process-scoped `Runtime` (spec.md Design Notes §9 : "global mutable
//! registries → encapsulate in a process-scoped `Runtime` struct constructed
//! at startup; all plugins and providers receive it via their initialization
//! call; teardown is deterministic in reverse registration order").
//!
//! `Runtime` is the single owner of every registry the gateway needs : the
//! plugin pipeline, the provider registry, the router, the reliability
//! envelope, the warm session pool, and the batch registry. It is built
//! once from a validated [`GatewayConfig`] and handed out as an `Arc` to
//! whatever external surface (HTTP handler, CLI, test harness) drives it.

mod private
{
  use std::sync::Arc;
  use core::time::Duration;
  use crate::batch::BatchRegistry;
  use crate::config::GatewayConfig;
  use crate::engine::audit::AuditSink;
  use crate::engine::jobs::{ AsyncJobRegistry, JobStatus };
  use crate::engine::Engine;
  use crate::error::Error;
  use crate::manifest::ModelManifest;
  use crate::metrics::MetricsSink;
  use crate::pipeline::registry::PluginRegistry;
  use crate::provider::registry::ProviderRegistry;
  use crate::reliability::circuit_breaker::CircuitBreakerRegistry;
  use crate::reliability::provider_quota::QuotaEnforcer;
  use crate::request::InferenceRequest;
  use crate::router::Router;
  use crate::session::pool::SessionPool;
  use crate::session::runner::RunnerSession;
  use crate::tenant::TenantContext;

  #[ cfg( feature = "logging" ) ]
  use tracing::info;

  /// A boxed session factory, so [`Runtime`] does not need to be generic
  /// over the closure type the way [`SessionPool`] is.
  pub type SessionFactory = Box< dyn Fn( &ModelManifest, &str ) -> Result< Arc< dyn RunnerSession >, Error > + Send + Sync >;

  /// The warm session pool type [`Runtime`] owns.
  pub type WarmPool = SessionPool< SessionFactory >;

  /// Owns every registry the gateway needs for the lifetime of the process.
  ///
  /// Field order mirrors teardown order, not construction order : Rust
  /// drops struct fields top to bottom, and teardown must run in the
  /// reverse of how collaborators were wired together in [`Runtime::new`]
  /// (engine last constructed, dropped first; registries first
  /// constructed, dropped last).
  pub struct Runtime
  {
    engine : Engine,
    session_pool : WarmPool,
    batches : BatchRegistry,
    async_jobs : AsyncJobRegistry,
    providers : Arc< ProviderRegistry >,
    config : GatewayConfig,
  }

  impl core::fmt::Debug for Runtime
  {
    fn fmt( &self, f : &mut core::fmt::Formatter< '_ > ) -> core::fmt::Result
    {
      f.debug_struct( "Runtime" ).field( "config", &self.config ).finish()
    }
  }

  impl Runtime
  {
    /// Build a runtime from a validated configuration, a populated plugin
    /// pipeline, a populated provider registry, and a session factory for
    /// the warm pool.
    ///
    /// Registration of plugins and providers happens before this call
    /// (spec.md Design Notes §9 : "all plugins and providers receive it via
    /// their initialization call" is satisfied here by requiring both
    /// registries fully populated up front, since this crate's plugins and
    /// adapters are stateless and need no back-reference to the runtime
    /// itself).
    #[ must_use ]
    pub fn new(
      config : GatewayConfig,
      plugins : PluginRegistry,
      providers : Arc< ProviderRegistry >,
      session_factory : SessionFactory,
    ) -> Self
    {
      let router = Router::new(
        Arc::clone( &providers ),
        config.router.scoring_weights,
        config.router.preferred_provider_policy,
        config.router.cost_sensitive,
      );
      let circuit_breakers = CircuitBreakerRegistry::new( config.circuit_breaker.clone() );
      let quota = QuotaEnforcer::new( config.quota.tenant_policy, config.quota.provider_policy );
      let session_pool = SessionPool::new( config.session_pool.clone(), session_factory );
      let engine = Engine::new( plugins, Arc::clone( &providers ), router, circuit_breakers, config.retry.clone(), quota );

      #[ cfg( feature = "logging" ) ]
      info!( "gateway runtime constructed" );

      Self { engine, session_pool, batches : BatchRegistry::new(), async_jobs : AsyncJobRegistry::new(), providers, config }
    }

    /// Override the engine's metrics sink (builder style, consumes `self`).
    #[ must_use ]
    pub fn with_metrics_sink( mut self, sink : Arc< dyn MetricsSink > ) -> Self
    {
      self.engine = self.engine.with_metrics_sink( sink );
      self
    }

    /// Override the engine's audit sink (builder style, consumes `self`).
    #[ must_use ]
    pub fn with_audit_sink( mut self, sink : Arc< dyn AuditSink > ) -> Self
    {
      self.engine = self.engine.with_audit_sink( sink );
      self
    }

    /// Wire a [`crate::manifest::repository::ModelRepository`] into the
    /// engine (builder style, consumes `self`), so requests resolve a
    /// manifest before routing (spec.md §4.1, §4.3).
    #[ must_use ]
    pub fn with_repository( mut self, repository : Arc< dyn crate::manifest::repository::ModelRepository > ) -> Self
    {
      self.engine = self.engine.with_repository( repository );
      self
    }

    /// The request-lifecycle engine.
    #[ must_use ]
    pub fn engine( &self ) -> &Engine
    {
      &self.engine
    }

    /// The warm runner/session pool.
    #[ must_use ]
    pub fn session_pool( &self ) -> &WarmPool
    {
      &self.session_pool
    }

    /// The batch job registry.
    #[ must_use ]
    pub fn batches( &self ) -> &BatchRegistry
    {
      &self.batches
    }

    /// The async single-job registry.
    #[ must_use ]
    pub fn async_jobs( &self ) -> &AsyncJobRegistry
    {
      &self.async_jobs
    }

    /// `SubmitAsync` (spec.md §4.1) : enqueue `request` on the runtime's
    /// own task executor and return a job id immediately. The caller polls
    /// [`Runtime::job_status`] for the terminal outcome.
    #[ must_use ]
    pub fn submit_async( self : &Arc< Self >, request : InferenceRequest, tenant : TenantContext ) -> String
    {
      let job_id = format!( "job-{}", uuid::Uuid::new_v4() );
      self.async_jobs.create( &job_id );

      let runtime = Arc::clone( self );
      let job_id_for_task = job_id.clone();
      tokio::spawn( async move
      {
        runtime.async_jobs.mark_running( &job_id_for_task );
        match runtime.engine.execute( request, &tenant ).await
        {
          Ok( response ) => runtime.async_jobs.complete( &job_id_for_task, response ),
          Err( error ) => runtime.async_jobs.fail( &job_id_for_task, error ),
        }
      } );

      job_id
    }

    /// `GetJobStatus` (spec.md §4.1).
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValidationError`] if `job_id` is unknown.
    pub fn job_status( &self, job_id : &str ) -> Result< JobStatus, Error >
    {
      self.async_jobs.status( job_id )
    }

    /// `Batch` (spec.md §4.1, §4.8) : submit every request in `requests`
    /// against this runtime's engine with at most `max_concurrent` running
    /// at once, tracking aggregate progress under a freshly minted batch
    /// id. Returns the batch id immediately; the caller polls
    /// [`Runtime::batches`] for status.
    #[ must_use ]
    pub fn submit_batch( self : &Arc< Self >, requests : Vec< InferenceRequest >, max_concurrent : usize, tenant : TenantContext ) -> String
    {
      let batch_id = format!( "batch-{}", uuid::Uuid::new_v4() );
      #[ allow( clippy::cast_possible_truncation ) ]
      self.batches.create( &batch_id, requests.len() as u64 );

      let runtime = Arc::clone( self );
      let max_concurrent = max_concurrent.max( 1 );
      tokio::spawn( async move
      {
        let semaphore = Arc::new( tokio::sync::Semaphore::new( max_concurrent ) );
        let mut handles = Vec::with_capacity( requests.len() );
        for request in requests
        {
          let runtime = Arc::clone( &runtime );
          let tenant = tenant.clone();
          let semaphore = Arc::clone( &semaphore );
          let batch_id = batch_id.clone();
          handles.push( tokio::spawn( async move
          {
            let _permit = semaphore.acquire_owned().await.expect( "batch semaphore is never closed early" );
            let outcome = runtime.engine.execute( request, &tenant ).await;
            let _ = runtime.batches.record( &batch_id, outcome.is_ok() );
          } ) );
        }
        for handle in handles
        {
          let _ = handle.await;
        }
      } );

      batch_id
    }

    /// `Cancel` (spec.md §4.1) : request cancellation of the in-flight,
    /// non-streaming call identified by `request_id`. Returns `true` if a
    /// matching in-flight call was found and signalled.
    #[ must_use ]
    pub fn cancel( &self, request_id : &str ) -> bool
    {
      self.engine.cancel( request_id )
    }

    /// The provider registry, for callers that need to register providers
    /// discovered after startup (spec.md §4.5 allows re-registration, which
    /// shadows by provider id).
    #[ must_use ]
    pub fn providers( &self ) -> &ProviderRegistry
    {
      &self.providers
    }

    /// The configuration this runtime was built from.
    #[ must_use ]
    pub fn config( &self ) -> &GatewayConfig
    {
      &self.config
    }

    /// Run one maintenance sweep : evicts warm-pool sessions that have
    /// sat idle past `session_pool.max_idle` and refreshes every
    /// provider's cached health status (spec.md §4.4, §4.8). Intended to
    /// be driven by an external periodic task ; this crate does not spawn
    /// its own timers so callers retain control over the process's task
    /// topology.
    pub async fn run_maintenance( &self )
    {
      self.session_pool.evict_idle().await;
      self.engine.refresh_health().await;
    }

    /// Spawn a background task that calls [`Runtime::run_maintenance`]
    /// every `interval`, for callers who want the common case without
    /// wiring their own timer loop. The returned handle aborts the task on
    /// drop.
    #[ cfg( feature = "session_pool" ) ]
    pub fn spawn_maintenance( self : &Arc< Self >, interval : Duration ) -> tokio::task::JoinHandle< () >
    {
      let runtime = Arc::clone( self );
      tokio::spawn( async move
      {
        let mut ticker = tokio::time::interval( interval );
        loop
        {
          ticker.tick().await;
          runtime.run_maintenance().await;
        }
      } )
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;
    use crate::provider::mock::MockAdapter;
    use crate::request::{ Message, Role };
    use crate::session::runner::InMemoryRunnerSession;

    fn factory() -> SessionFactory
    {
      Box::new( | manifest : &ModelManifest, device : &str | Ok( Arc::new( InMemoryRunnerSession::new( manifest, device ) ) as Arc< dyn RunnerSession > ) )
    }

    fn sample_request() -> InferenceRequest
    {
      InferenceRequest
      {
        request_id : "r1".into(),
        model : "m1".into(),
        messages : vec![ Message { role : Role::User, content : "hello".into(), name : None, tool_call_id : None } ],
        parameters : Default::default(),
        streaming : false,
        priority : 0,
        timeout : None,
        preferred_provider : None,
        device_hint : None,
        metadata : Default::default(),
      }
    }

    #[ tokio::test ]
    async fn runtime_wires_collaborators_end_to_end()
    {
      let providers = Arc::new( ProviderRegistry::new() );
      providers.register( Arc::new( MockAdapter::new( "p1" ) ) );

      let config = GatewayConfig::builder().build().unwrap();
      let runtime = Runtime::new( config, PluginRegistry::new(), providers, factory() );

      let tenant = TenantContext::default_tenant();
      let response = runtime.engine().execute( sample_request(), &tenant ).await.unwrap();
      assert_eq!( response.content, "hello" );
    }

    #[ tokio::test ]
    async fn batches_and_session_pool_are_reachable()
    {
      let providers = Arc::new( ProviderRegistry::new() );
      let config = GatewayConfig::builder().build().unwrap();
      let runtime = Runtime::new( config, PluginRegistry::new(), providers, factory() );

      runtime.batches().create( "batch-1", 1 );
      assert_eq!( runtime.batches().status( "batch-1" ).unwrap().total, 1 );
      assert_eq!( runtime.session_pool().idle_count().await, 0 );
      runtime.run_maintenance().await;
    }

    #[ tokio::test ]
    async fn submit_async_reaches_a_terminal_job_status()
    {
      let providers = Arc::new( ProviderRegistry::new() );
      providers.register( Arc::new( MockAdapter::new( "p1" ) ) );
      let config = GatewayConfig::builder().build().unwrap();
      let runtime = Arc::new( Runtime::new( config, PluginRegistry::new(), providers, factory() ) );

      let job_id = runtime.submit_async( sample_request(), TenantContext::default_tenant() );
      assert!( matches!( runtime.job_status( &job_id ).unwrap(), JobStatus::Pending | JobStatus::Running ) );

      let status = loop
      {
        let status = runtime.job_status( &job_id ).unwrap();
        if status.is_terminal() { break status; }
        tokio::task::yield_now().await;
      };
      assert!( matches!( status, JobStatus::Completed( response ) if response.content == "hello" ) );
    }

    #[ tokio::test ]
    async fn submit_batch_tracks_every_request_to_completion()
    {
      let providers = Arc::new( ProviderRegistry::new() );
      providers.register( Arc::new( MockAdapter::new( "p1" ) ) );
      let config = GatewayConfig::builder().build().unwrap();
      let runtime = Arc::new( Runtime::new( config, PluginRegistry::new(), providers, factory() ) );

      let requests = ( 0..3 ).map( | n | InferenceRequest
      {
        request_id : format!( "batch-req-{n}" ),
        model : "m1".into(),
        messages : vec![ Message { role : Role::User, content : "hi".into(), name : None, tool_call_id : None } ],
        parameters : Default::default(),
        streaming : false,
        priority : 0,
        timeout : None,
        preferred_provider : None,
        device_hint : None,
        metadata : Default::default(),
      } ).collect();

      let batch_id = runtime.submit_batch( requests, 2, TenantContext::default_tenant() );

      let status = loop
      {
        let status = runtime.batches().status( &batch_id ).unwrap();
        if status.is_done() { break status; }
        tokio::task::yield_now().await;
      };
      assert_eq!( status.completed, 3 );
      assert_eq!( status.failed, 0 );
    }

    #[ tokio::test ]
    async fn cancel_delegates_to_the_engine()
    {
      let providers = Arc::new( ProviderRegistry::new() );
      providers.register( Arc::new( MockAdapter::new( "p1" ) ) );
      let config = GatewayConfig::builder().build().unwrap();
      let runtime = Arc::new( Runtime::new( config, PluginRegistry::new(), providers, factory() ) );

      assert!( !runtime.cancel( "never-submitted" ) );
    }
  }
}

::mod_interface::mod_interface!
{
  exposed use private::SessionFactory;
  exposed use private::WarmPool;
  exposed use private::Runtime;
}
