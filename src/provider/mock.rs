//! Reference [`ProviderAdapter`] implementations (spec.md §4.15,
//! supplementing the spec's explicit out-of-scope-ness of concrete vendor
//! wire protocols with concrete, non-vendor adapters tests and examples
//! can drive end to end).

mod private
{
  use std::collections::HashMap;
  use std::sync::atomic::{ AtomicU64, Ordering };
  use async_trait::async_trait;
  use crate::error::Error;
  use crate::provider::adapter::{ ProviderAdapter, ProviderDescriptor };
  use crate::request::InferenceRequest;
  use crate::response::{ Chunk, Response };
  use crate::streaming::{ channel, ChunkStream, DEFAULT_CHANNEL_CAPACITY };

  /// An in-process adapter that echoes the last user message back,
  /// counting invocations. Used by tests and as a worked example of the
  /// [`ProviderAdapter`] contract; carries no network I/O.
  pub struct MockAdapter
  {
    descriptor : ProviderDescriptor,
    invocation_count : AtomicU64,
    fail_next : std::sync::atomic::AtomicBool,
    fail_always : std::sync::atomic::AtomicBool,
    rate_limit_next : std::sync::Mutex< Option< u64 > >,
    latency : core::time::Duration,
  }

  impl core::fmt::Debug for MockAdapter
  {
    fn fmt( &self, f : &mut core::fmt::Formatter< '_ > ) -> core::fmt::Result
    {
      f.debug_struct( "MockAdapter" ).field( "descriptor", &self.descriptor ).finish()
    }
  }

  impl MockAdapter
  {
    /// Construct a healthy adapter registered under `provider_id`.
    #[ must_use ]
    pub fn new( provider_id : impl Into< String > ) -> Self
    {
      Self
      {
        descriptor : ProviderDescriptor
        {
          provider_id : provider_id.into(),
          version : "1.0.0".to_string(),
          supported_devices : vec![ "cpu".to_string() ],
          supports_streaming : true,
          relative_cost : 1.0,
          supported_formats : Vec::new(),
          tool_calling : false,
          multimodal : false,
          max_context : None,
          max_output : None,
        },
        invocation_count : AtomicU64::new( 0 ),
        fail_next : std::sync::atomic::AtomicBool::new( false ),
        fail_always : std::sync::atomic::AtomicBool::new( false ),
        rate_limit_next : std::sync::Mutex::new( None ),
        latency : core::time::Duration::from_millis( 0 ),
      }
    }

    /// Override the declared relative cost used by router scoring.
    #[ must_use ]
    pub fn with_relative_cost( mut self, relative_cost : f64 ) -> Self
    {
      self.descriptor.relative_cost = relative_cost;
      self
    }

    /// Override the declared version string, for exercising the
    /// registry's multi-version support.
    #[ must_use ]
    pub fn with_version( mut self, version : impl Into< String > ) -> Self
    {
      self.descriptor.version = version.into();
      self
    }

    /// Override the declared supported devices.
    #[ must_use ]
    pub fn with_supported_devices( mut self, devices : Vec< String > ) -> Self
    {
      self.descriptor.supported_devices = devices;
      self
    }

    /// Declare the local artifact formats this adapter can load directly,
    /// consulted by the router's native-format scoring bonus.
    #[ must_use ]
    pub fn with_supported_formats( mut self, formats : Vec< crate::manifest::ArtifactFormat > ) -> Self
    {
      self.descriptor.supported_formats = formats;
      self
    }

    /// Make `invoke` sleep for `latency` before producing a response,
    /// giving tests a window in which to race a cancellation signal.
    #[ must_use ]
    pub fn with_latency( mut self, latency : core::time::Duration ) -> Self
    {
      self.latency = latency;
      self
    }

    /// Declare tool-calling and multimodal capability flags, and optional
    /// context/output token limits (spec.md §4.4 `Capabilities()`).
    #[ must_use ]
    pub fn with_capabilities( mut self, tool_calling : bool, multimodal : bool, max_context : Option< u32 >, max_output : Option< u32 > ) -> Self
    {
      self.descriptor.tool_calling = tool_calling;
      self.descriptor.multimodal = multimodal;
      self.descriptor.max_context = max_context;
      self.descriptor.max_output = max_output;
      self
    }

    /// Override the declared streaming capability, exercising the
    /// router's feature-compatibility exclusion (spec.md §4.3, §8).
    #[ must_use ]
    pub fn with_streaming( mut self, supports_streaming : bool ) -> Self
    {
      self.descriptor.supports_streaming = supports_streaming;
      self
    }

    /// Arrange for the next `invoke`/`ping` call to fail with a transient
    /// upstream error, exercising retry and circuit-breaker paths.
    pub fn arm_failure( &self )
    {
      self.fail_next.store( true, Ordering::SeqCst );
    }

    /// Arrange for every subsequent `invoke`/`ping` call to fail,
    /// modeling a provider that is down for the duration of a test
    /// rather than one that recovers after a single hiccup.
    pub fn fail_always( &self )
    {
      self.fail_always.store( true, Ordering::SeqCst );
    }

    /// Arrange for the next `invoke`/`ping` call to fail with
    /// [`Error::RateLimited`] carrying `retry_after_ms`, exercising
    /// provider-quota rate-limit suspension (spec.md §4.7).
    pub fn arm_rate_limit( &self, retry_after_ms : u64 )
    {
      *self.rate_limit_next.lock().unwrap() = Some( retry_after_ms );
    }

    /// Number of `invoke` calls observed so far.
    #[ must_use ]
    pub fn invocation_count( &self ) -> u64
    {
      self.invocation_count.load( Ordering::SeqCst )
    }
  }

  #[ async_trait ]
  impl ProviderAdapter for MockAdapter
  {
    fn descriptor( &self ) -> &ProviderDescriptor
    {
      &self.descriptor
    }

    async fn invoke( &self, request : &InferenceRequest ) -> Result< Response, Error >
    {
      self.invocation_count.fetch_add( 1, Ordering::SeqCst );
      if !self.latency.is_zero()
      {
        tokio::time::sleep( self.latency ).await;
      }
      if let Some( retry_after_ms ) = self.rate_limit_next.lock().unwrap().take()
      {
        return Err( Error::RateLimited { provider_id : self.descriptor.provider_id.clone(), retry_after_ms } );
      }
      if self.fail_always.load( Ordering::SeqCst ) || self.fail_next.swap( false, Ordering::SeqCst )
      {
        return Err( Error::UpstreamTransient( format!( "{} : injected failure", self.descriptor.provider_id ) ) );
      }
      let content = request.messages.last().map( | m | m.content.clone() ).unwrap_or_default();
      Ok( Response
      {
        request_id : request.request_id.clone(),
        model : request.model.clone(),
        content,
        tokens_used : 8,
        duration_ms : 0,
        metadata : HashMap::from( [ ( "provider_id".to_string(), self.descriptor.provider_id.clone() ) ] ),
      } )
    }

    async fn invoke_streaming( &self, request : &InferenceRequest ) -> Result< ChunkStream, Error >
    {
      self.invocation_count.fetch_add( 1, Ordering::SeqCst );
      let ( tx, stream ) = channel( DEFAULT_CHANNEL_CAPACITY );
      let content = request.messages.last().map( | m | m.content.clone() ).unwrap_or_default();
      let request_id = request.request_id.clone();
      tokio::spawn( async move
      {
        for ( index, word ) in content.split_whitespace().enumerate()
        {
          let is_final = false;
          let _ = tx.send( Ok( Chunk
          {
            request_id : request_id.clone(),
            delta : if index == 0 { word.to_string() } else { format!( " {word}" ) },
            is_final,
            metadata : HashMap::new(),
          } ) ).await;
        }
        let _ = tx.send( Ok( Chunk { request_id, delta : String::new(), is_final : true, metadata : HashMap::new() } ) ).await;
      } );
      Ok( stream )
    }

    async fn ping( &self ) -> Result< (), Error >
    {
      if self.fail_always.load( Ordering::SeqCst ) || self.fail_next.load( Ordering::SeqCst )
      {
        return Err( Error::UpstreamTransient( format!( "{} : ping failed", self.descriptor.provider_id ) ) );
      }
      Ok( () )
    }
  }

  /// An adapter standing in for a warm local runner (spec.md §4.8),
  /// reporting whatever content its backing session handle produces.
  /// Kept deliberately simple : the session/runner lifecycle lives in
  /// [`crate::session`], this adapter only demonstrates wiring a runner
  /// into the [`ProviderAdapter`] seam.
  pub struct LocalRunnerAdapter
  {
    descriptor : ProviderDescriptor,
  }

  impl core::fmt::Debug for LocalRunnerAdapter
  {
    fn fmt( &self, f : &mut core::fmt::Formatter< '_ > ) -> core::fmt::Result
    {
      f.debug_struct( "LocalRunnerAdapter" ).field( "descriptor", &self.descriptor ).finish()
    }
  }

  impl LocalRunnerAdapter
  {
    /// Construct an adapter for the given local `provider_id`, declaring
    /// `devices` as its supported device set (spec.md §4.8 device
    /// affinity).
    #[ must_use ]
    pub fn new( provider_id : impl Into< String >, devices : Vec< String > ) -> Self
    {
      Self
      {
        descriptor : ProviderDescriptor
        {
          provider_id : provider_id.into(),
          version : "1.0.0".to_string(),
          supported_devices : devices,
          supports_streaming : false,
          relative_cost : 0.1,
          supported_formats : vec![ crate::manifest::ArtifactFormat::Gguf ],
          tool_calling : false,
          multimodal : false,
          max_context : None,
          max_output : None,
        },
      }
    }
  }

  #[ async_trait ]
  impl ProviderAdapter for LocalRunnerAdapter
  {
    fn descriptor( &self ) -> &ProviderDescriptor
    {
      &self.descriptor
    }

    async fn invoke( &self, request : &InferenceRequest ) -> Result< Response, Error >
    {
      let content = request.messages.last().map( | m | m.content.clone() ).unwrap_or_default();
      Ok( Response
      {
        request_id : request.request_id.clone(),
        model : request.model.clone(),
        content : format!( "[local:{}] {content}", self.descriptor.provider_id ),
        tokens_used : content.split_whitespace().count() as u64,
        duration_ms : 0,
        metadata : HashMap::from( [ ( "provider_id".to_string(), self.descriptor.provider_id.clone() ) ] ),
      } )
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;
    use crate::request::{ Message, Role };

    fn sample_request() -> InferenceRequest
    {
      InferenceRequest
      {
        request_id : "r1".into(),
        model : "m1".into(),
        messages : vec![ Message { role : Role::User, content : "hello world".into(), name : None, tool_call_id : None } ],
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
    async fn mock_adapter_echoes_last_message()
    {
      let adapter = MockAdapter::new( "p1" );
      let response = adapter.invoke( &sample_request() ).await.unwrap();
      assert_eq!( response.content, "hello world" );
      assert_eq!( adapter.invocation_count(), 1 );
    }

    #[ tokio::test ]
    async fn armed_failure_surfaces_once()
    {
      let adapter = MockAdapter::new( "p1" );
      adapter.arm_failure();
      assert!( adapter.invoke( &sample_request() ).await.is_err() );
      assert!( adapter.invoke( &sample_request() ).await.is_ok() );
    }

    #[ tokio::test ]
    async fn armed_rate_limit_surfaces_once_with_retry_after()
    {
      let adapter = MockAdapter::new( "p1" );
      adapter.arm_rate_limit( 250 );
      match adapter.invoke( &sample_request() ).await
      {
        Err( Error::RateLimited { provider_id, retry_after_ms } ) =>
        {
          assert_eq!( provider_id, "p1" );
          assert_eq!( retry_after_ms, 250 );
        }
        other => panic!( "expected RateLimited, got {other:?}" ),
      }
      assert!( adapter.invoke( &sample_request() ).await.is_ok() );
    }

    #[ tokio::test ]
    async fn local_runner_adapter_tags_content()
    {
      let adapter = LocalRunnerAdapter::new( "local-1", vec![ "cuda".to_string() ] );
      let response = adapter.invoke( &sample_request() ).await.unwrap();
      assert!( response.content.starts_with( "[local:local-1]" ) );
    }

    #[ tokio::test ]
    async fn default_initialize_and_supports_accept_everything()
    {
      use crate::tenant::TenantContext;

      let adapter = MockAdapter::new( "p1" );
      assert!( adapter.initialize( &Default::default() ).await.is_ok() );
      assert!( adapter.supports( "any-model", &TenantContext::default_tenant() ) );
    }

    #[ test ]
    fn with_capabilities_overrides_the_descriptor()
    {
      let adapter = MockAdapter::new( "p1" ).with_capabilities( true, true, Some( 32_000 ), Some( 4_096 ) );
      assert!( adapter.descriptor().tool_calling );
      assert!( adapter.descriptor().multimodal );
      assert_eq!( adapter.descriptor().max_context, Some( 32_000 ) );
      assert_eq!( adapter.descriptor().max_output, Some( 4_096 ) );
    }
  }
}

::mod_interface::mod_interface!
{
  exposed use private::MockAdapter;
  exposed use private::LocalRunnerAdapter;
}
