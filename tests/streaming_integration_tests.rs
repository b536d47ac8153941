//! End-to-end streaming dispatch driven through [`Runtime`], including the
//! mid-stream cancellation path (spec.md §4.9, §8 Scenario D).

use std::sync::Arc;
use inference_gateway::config::GatewayConfig;
use inference_gateway::manifest::ModelManifest;
use inference_gateway::pipeline::registry::PluginRegistry;
use inference_gateway::provider::mock::MockAdapter;
use inference_gateway::provider::registry::ProviderRegistry;
use inference_gateway::request::{ InferenceRequest, Message, Role };
use inference_gateway::runtime::{ Runtime, SessionFactory };
use inference_gateway::session::runner::{ InMemoryRunnerSession, RunnerSession };
use inference_gateway::streaming::{ collect, CancellationToken };
use inference_gateway::tenant::TenantContext;

mod integration_tests
{
  use super::*;

  fn sample_request() -> InferenceRequest
  {
    InferenceRequest
    {
      request_id : "stream-1".into(),
      model : "m1".into(),
      messages : vec![ Message { role : Role::User, content : "one two three four".into(), name : None, tool_call_id : None } ],
      parameters : Default::default(),
      streaming : true,
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

  fn runtime_with_one_provider() -> Runtime
  {
    let providers = Arc::new( ProviderRegistry::new() );
    providers.register( Arc::new( MockAdapter::new( "p1" ) ) );
    let config = GatewayConfig::builder().build().unwrap();
    Runtime::new( config, PluginRegistry::new(), providers, factory() )
  }

  #[ tokio::test ]
  async fn streaming_request_completes_with_every_word_as_a_chunk()
  {
    let runtime = runtime_with_one_provider();
    let tenant = TenantContext::default_tenant();

    let stream = runtime.engine()
      .execute_streaming( sample_request(), &tenant, CancellationToken::new() )
      .await
      .unwrap();
    let chunks = collect( stream ).await.unwrap();

    assert!( chunks.last().unwrap().is_final );
    let joined : String = chunks.iter().map( | c | c.delta.as_str() ).collect();
    assert_eq!( joined, "one two three four" );
  }

  #[ tokio::test ]
  async fn cancelling_before_dispatch_yields_a_single_cancelled_chunk()
  {
    let runtime = runtime_with_one_provider();
    let tenant = TenantContext::default_tenant();

    let cancellation = CancellationToken::new();
    cancellation.cancel();

    let stream = runtime.engine()
      .execute_streaming( sample_request(), &tenant, cancellation )
      .await
      .unwrap();
    let chunks = collect( stream ).await.unwrap();

    assert_eq!( chunks.len(), 1 );
    assert!( chunks[ 0 ].is_final );
    assert_eq!( chunks[ 0 ].metadata.get( "cancelled" ).map( String::as_str ), Some( "true" ) );
  }
}
