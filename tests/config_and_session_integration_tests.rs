//! Configuration validation and warm-pool session reuse exercised through
//! the public [`Runtime`]/[`GatewayConfig`] surface.

use std::sync::Arc;
use core::time::Duration;
use inference_gateway::config::GatewayConfig;
use inference_gateway::manifest::ModelManifest;
use inference_gateway::pipeline::registry::PluginRegistry;
use inference_gateway::provider::registry::ProviderRegistry;
use inference_gateway::reliability::retry::RetryConfig;
use inference_gateway::runtime::{ Runtime, SessionFactory };
use inference_gateway::session::pool::SessionPoolConfig;
use inference_gateway::session::runner::{ InMemoryRunnerSession, RunnerSession };

mod integration_tests
{
  use super::*;

  fn factory() -> SessionFactory
  {
    Box::new( | manifest : &ModelManifest, device : &str | Ok( Arc::new( InMemoryRunnerSession::new( manifest, device ) ) as Arc< dyn RunnerSession > ) )
  }

  fn sample_manifest() -> ModelManifest
  {
    ModelManifest
    {
      model_id : "m1".into(),
      tenant_id : "default".into(),
      name : "Model One".into(),
      version : "1".into(),
      artifacts : std::collections::HashMap::new(),
      supported_devices : vec![ "cpu".to_string() ],
      resource_requirements : Default::default(),
      provider_tag : None,
      metadata : std::collections::HashMap::new(),
    }
  }

  #[ test ]
  fn a_retry_policy_with_no_retries_and_no_time_budget_is_rejected()
  {
    let result = GatewayConfig::builder()
      .retry( RetryConfig { max_retries : 0, max_elapsed_time : None, ..RetryConfig::default() } )
      .build();
    assert!( result.is_err() );
  }

  #[ test ]
  fn zero_sized_session_pool_is_rejected()
  {
    let result = GatewayConfig::builder()
      .session_pool( SessionPoolConfig { max_sessions_per_key : 0, ..SessionPoolConfig::default() } )
      .build();
    assert!( result.is_err() );
  }

  #[ tokio::test ]
  async fn runtime_session_pool_reuses_sessions_across_maintenance_sweeps()
  {
    let providers = Arc::new( ProviderRegistry::new() );
    let config = GatewayConfig::builder()
      .session_pool( SessionPoolConfig { max_sessions_per_key : 2, max_idle : Duration::from_secs( 300 ) } )
      .build()
      .unwrap();
    let runtime = Runtime::new( config, PluginRegistry::new(), providers, factory() );
    let manifest = sample_manifest();

    {
      let _guard = runtime.session_pool().acquire( &manifest, "cpu" ).await.unwrap();
    }
    assert_eq!( runtime.session_pool().idle_count().await, 1 );

    // A maintenance sweep with a generous `max_idle` must not evict a
    // session that has only just gone idle.
    runtime.run_maintenance().await;
    assert_eq!( runtime.session_pool().idle_count().await, 1 );

    let guard = runtime.session_pool().acquire( &manifest, "cpu" ).await.unwrap();
    assert_eq!( guard.model_id(), "m1" );
    assert_eq!( runtime.session_pool().idle_count().await, 0 );
  }
}
