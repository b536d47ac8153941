//! End-to-end engine/runtime behavior exercised through the public crate
//! surface rather than a single module's internals.

use std::sync::Arc;
use std::sync::Mutex;
use core::time::Duration;
use inference_gateway::config::{ GatewayConfig, QuotaConfig };
use inference_gateway::engine::audit::{ AuditEvent, AuditSink };
use inference_gateway::engine::jobs::JobStatus;
use inference_gateway::error::Error;
use inference_gateway::manifest::ModelManifest;
use inference_gateway::pipeline::registry::PluginRegistry;
use inference_gateway::provider::mock::MockAdapter;
use inference_gateway::provider::registry::ProviderRegistry;
use inference_gateway::reliability::circuit_breaker::CircuitBreakerConfig;
use inference_gateway::reliability::quota::{ QuotaAlgorithm, QuotaPolicy };
use inference_gateway::request::{ InferenceRequest, Message, Role };
use inference_gateway::runtime::{ Runtime, SessionFactory };
use inference_gateway::session::runner::{ InMemoryRunnerSession, RunnerSession };
use inference_gateway::tenant::TenantContext;

mod integration_tests
{
  use super::*;

  fn sample_request( request_id : &str ) -> InferenceRequest
  {
    InferenceRequest
    {
      request_id : request_id.into(),
      model : "m1".into(),
      messages : vec![ Message { role : Role::User, content : "hello from the gateway".into(), name : None, tool_call_id : None } ],
      parameters : Default::default(),
      streaming : false,
      priority : 0,
      timeout : None,
      preferred_provider : None,
      device_hint : None,
      metadata : Default::default(),
    }
  }

  fn factory() -> SessionFactory
  {
    Box::new( | manifest : &ModelManifest, device : &str | Ok( Arc::new( InMemoryRunnerSession::new( manifest, device ) ) as Arc< dyn RunnerSession > ) )
  }

  #[ derive( Default ) ]
  struct RecordingAudit
  {
    events : Mutex< Vec< AuditEvent > >,
  }

  impl AuditSink for RecordingAudit
  {
    fn record( &self, event : AuditEvent )
    {
      self.events.lock().unwrap().push( event );
    }
  }

  #[ tokio::test ]
  async fn happy_path_executes_through_the_full_runtime()
  {
    let providers = Arc::new( ProviderRegistry::new() );
    providers.register( Arc::new( MockAdapter::new( "p1" ) ) );

    let config = GatewayConfig::builder().build().unwrap();
    let runtime = Runtime::new( config, PluginRegistry::new(), providers, factory() );

    let tenant = TenantContext::default_tenant();
    let response = runtime.engine().execute( sample_request( "r1" ), &tenant ).await.unwrap();
    assert_eq!( response.content, "hello from the gateway" );
    assert_eq!( response.metadata.get( "provider_id" ).map( String::as_str ), Some( "p1" ) );
  }

  #[ tokio::test ]
  async fn exactly_one_terminal_audit_event_per_request_on_success_and_failure()
  {
    let providers = Arc::new( ProviderRegistry::new() );
    providers.register( Arc::new( MockAdapter::new( "p1" ) ) );

    let config = GatewayConfig::builder().build().unwrap();
    let audit = Arc::new( RecordingAudit::default() );
    let runtime = Runtime::new( config, PluginRegistry::new(), providers, factory() )
      .with_audit_sink( Arc::clone( &audit ) as Arc< dyn AuditSink > );

    let tenant = TenantContext::default_tenant();
    runtime.engine().execute( sample_request( "r1" ), &tenant ).await.unwrap();

    let mut invalid = sample_request( "r2" );
    invalid.messages.clear();
    let result = runtime.engine().execute( invalid, &tenant ).await;
    assert!( matches!( result, Err( Error::ValidationError( _ ) ) ) );

    let events = audit.events.lock().unwrap();
    assert_eq!( events.iter().filter( | e | e.request_id == "r1" ).count(), 1 );
    assert_eq!( events.iter().filter( | e | e.request_id == "r2" ).count(), 1 );
  }

  #[ tokio::test ]
  async fn quota_exhaustion_surfaces_as_quota_exceeded()
  {
    let providers = Arc::new( ProviderRegistry::new() );
    providers.register( Arc::new( MockAdapter::new( "p1" ) ) );

    let tight_quota = QuotaConfig
    {
      tenant_policy : QuotaPolicy { algorithm : QuotaAlgorithm::TokenBucket, limit : 1, period : Duration::from_secs( 60 ) },
      provider_policy : QuotaPolicy { algorithm : QuotaAlgorithm::TokenBucket, limit : 1000, period : Duration::from_secs( 60 ) },
    };
    let config = GatewayConfig::builder().quota( tight_quota ).build().unwrap();
    let runtime = Runtime::new( config, PluginRegistry::new(), providers, factory() );

    let tenant = TenantContext::default_tenant();
    runtime.engine().execute( sample_request( "r1" ), &tenant ).await.unwrap();
    let second = runtime.engine().execute( sample_request( "r2" ), &tenant ).await;
    assert!( matches!( second, Err( Error::QuotaExceeded( _ ) ) ) );
  }

  #[ tokio::test ]
  async fn circuit_opens_after_threshold_and_single_hop_failover_recovers_the_request()
  {
    let providers = Arc::new( ProviderRegistry::new() );
    let failing = Arc::new( MockAdapter::new( "failing" ) );
    failing.fail_always();
    providers.register( failing );
    providers.register( Arc::new( MockAdapter::new( "healthy" ).with_relative_cost( 50.0 ) ) );

    let config = GatewayConfig::builder()
      .circuit_breaker( CircuitBreakerConfig { failure_threshold : 1, ..CircuitBreakerConfig::default() } )
      .build()
      .unwrap();
    let runtime = Runtime::new( config, PluginRegistry::new(), providers, factory() );

    let tenant = TenantContext::default_tenant();
    let response = runtime.engine().execute( sample_request( "r1" ), &tenant ).await.unwrap();
    assert_eq!( response.metadata.get( "provider_id" ).map( String::as_str ), Some( "healthy" ) );

    // Once the failing provider's breaker has tripped, later requests keep
    // routing straight to the healthy one without re-attempting it.
    let response = runtime.engine().execute( sample_request( "r2" ), &tenant ).await.unwrap();
    assert_eq!( response.metadata.get( "provider_id" ).map( String::as_str ), Some( "healthy" ) );
  }

  #[ tokio::test ]
  async fn submit_async_is_pollable_to_a_terminal_completed_status()
  {
    let providers = Arc::new( ProviderRegistry::new() );
    providers.register( Arc::new( MockAdapter::new( "p1" ) ) );

    let config = GatewayConfig::builder().build().unwrap();
    let runtime = Arc::new( Runtime::new( config, PluginRegistry::new(), providers, factory() ) );

    let job_id = runtime.submit_async( sample_request( "async-r1" ), TenantContext::default_tenant() );
    let status = loop
    {
      let status = runtime.job_status( &job_id ).unwrap();
      if status.is_terminal() { break status; }
      tokio::task::yield_now().await;
    };

    assert!( matches!( status, JobStatus::Completed( response ) if response.content == "hello from the gateway" ) );
  }

  #[ tokio::test ]
  async fn submit_batch_reaches_total_completion_under_bounded_concurrency()
  {
    let providers = Arc::new( ProviderRegistry::new() );
    providers.register( Arc::new( MockAdapter::new( "p1" ) ) );

    let config = GatewayConfig::builder().build().unwrap();
    let runtime = Arc::new( Runtime::new( config, PluginRegistry::new(), providers, factory() ) );

    let requests = vec!
    [
      sample_request( "batch-r1" ),
      sample_request( "batch-r2" ),
      sample_request( "batch-r3" ),
      sample_request( "batch-r4" ),
    ];
    let batch_id = runtime.submit_batch( requests, 2, TenantContext::default_tenant() );

    let status = loop
    {
      let status = runtime.batches().status( &batch_id ).unwrap();
      if status.is_done() { break status; }
      tokio::task::yield_now().await;
    };
    assert_eq!( status.completed, 4 );
    assert_eq!( status.failed, 0 );
  }

  #[ tokio::test ]
  async fn cancel_of_a_slow_in_flight_request_surfaces_as_cancelled()
  {
    let providers = Arc::new( ProviderRegistry::new() );
    providers.register( Arc::new( MockAdapter::new( "slow" ).with_latency( Duration::from_millis( 200 ) ) ) );

    let config = GatewayConfig::builder().build().unwrap();
    let runtime = Arc::new( Runtime::new( config, PluginRegistry::new(), providers, factory() ) );

    let tenant = TenantContext::default_tenant();
    let runtime_for_call = Arc::clone( &runtime );
    let handle = tokio::spawn( async move { runtime_for_call.engine().execute( sample_request( "cancel-me" ), &tenant ).await } );

    tokio::time::sleep( Duration::from_millis( 20 ) ).await;
    assert!( runtime.cancel( "cancel-me" ) );

    let result = handle.await.unwrap();
    assert!( matches!( result, Err( Error::Cancelled ) ) );
  }
}
