//! Batch tracking driven by actual `Engine::execute` outcomes rather than
//! in isolation, exercising the `BatchRegistry` the way a batch-submission
//! caller would : create the job up front, record each request's terminal
//! outcome as it completes.

use std::sync::Arc;
use inference_gateway::config::GatewayConfig;
use inference_gateway::manifest::ModelManifest;
use inference_gateway::pipeline::registry::PluginRegistry;
use inference_gateway::provider::mock::MockAdapter;
use inference_gateway::provider::registry::ProviderRegistry;
use inference_gateway::request::{ InferenceRequest, Message, Role };
use inference_gateway::runtime::{ Runtime, SessionFactory };
use inference_gateway::session::runner::{ InMemoryRunnerSession, RunnerSession };
use inference_gateway::tenant::TenantContext;

mod integration_tests
{
  use super::*;

  fn request( id : &str ) -> InferenceRequest
  {
    InferenceRequest
    {
      request_id : id.into(),
      model : "m1".into(),
      messages : vec![ Message { role : Role::User, content : "batch item".into(), name : None, tool_call_id : None } ],
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

  #[ tokio::test ]
  async fn batch_status_tracks_a_mix_of_successes_and_failures()
  {
    let providers = Arc::new( ProviderRegistry::new() );
    let flaky = Arc::new( MockAdapter::new( "p1" ) );
    providers.register( Arc::clone( &flaky ) );

    let config = GatewayConfig::builder().build().unwrap();
    let runtime = Runtime::new( config, PluginRegistry::new(), providers, factory() );
    runtime.batches().create( "batch-1", 3 );

    let tenant = TenantContext::default_tenant();

    let first = runtime.engine().execute( request( "b1-r1" ), &tenant ).await;
    runtime.batches().record( "batch-1", first.is_ok() ).unwrap();

    flaky.fail_always();
    let second = runtime.engine().execute( request( "b1-r2" ), &tenant ).await;
    runtime.batches().record( "batch-1", second.is_ok() ).unwrap();

    let third = runtime.engine().execute( request( "b1-r3" ), &tenant ).await;
    runtime.batches().record( "batch-1", third.is_ok() ).unwrap();

    let status = runtime.batches().status( "batch-1" ).unwrap();
    assert!( status.is_done() );
    assert_eq!( status.completed, 1 );
    assert_eq!( status.failed, 2 );
  }

  #[ tokio::test ]
  async fn unknown_batch_id_is_rejected_by_the_runtime_registry()
  {
    let providers = Arc::new( ProviderRegistry::new() );
    let config = GatewayConfig::builder().build().unwrap();
    let runtime = Runtime::new( config, PluginRegistry::new(), providers, factory() );

    assert!( runtime.batches().status( "never-created" ).is_err() );
  }
}
