//! A warm runner handle : one initialized local inference session bound
//! to a model and device (spec.md §4.8 `RunnerSession`).

mod private
{
  use std::time::Instant;
  use crate::error::Error;
  use crate::manifest::ModelManifest;
  use crate::request::InferenceRequest;
  use crate::response::Response;

  /// One warm, loaded model session a [`crate::session::pool::SessionPool`]
  /// hands out to callers. Implementations own whatever native handle
  /// (mmap'd weights, device context, ...) backs actual inference;
  /// concrete model-format loading is out of scope here (spec.md §1).
  pub trait RunnerSession : Send + Sync
  {
    /// The model this session was initialized for.
    fn model_id( &self ) -> &str;

    /// The device this session is bound to (`"cpu"`, `"cuda:0"`, ...).
    fn device( &self ) -> &str;

    /// Run one request against this session.
    ///
    /// # Errors
    ///
    /// Propagates whatever failure the underlying runner reports,
    /// classified into the gateway's closed [`Error`] taxonomy.
    fn run( &self, request : &InferenceRequest ) -> Result< Response, Error >;

    /// Release the native resources backing this session (spec.md §4.8 :
    /// "closing a session releases all native resources before the pool
    /// forgets it"). Called by [`crate::session::pool::SessionPool::shutdown`]
    /// and whenever a returned session is evicted rather than re-pooled.
    /// Implementations with nothing to release (the common case for a
    /// session that owns no native handle) can rely on the default no-op.
    fn close( &self )
    {
    }
  }

  /// In-memory [`RunnerSession`] used by tests and as a worked example :
  /// echoes input without touching any real model artifact.
  #[ derive( Debug ) ]
  pub struct InMemoryRunnerSession
  {
    model_id : String,
    device : String,
    created_at : Instant,
  }

  impl InMemoryRunnerSession
  {
    /// Construct a session for `manifest` pinned to `device`.
    #[ must_use ]
    pub fn new( manifest : &ModelManifest, device : impl Into< String > ) -> Self
    {
      Self { model_id : manifest.model_id.clone(), device : device.into(), created_at : Instant::now() }
    }

    /// How long this session has been alive.
    #[ must_use ]
    pub fn age( &self ) -> core::time::Duration
    {
      self.created_at.elapsed()
    }
  }

  impl RunnerSession for InMemoryRunnerSession
  {
    fn model_id( &self ) -> &str
    {
      &self.model_id
    }

    fn device( &self ) -> &str
    {
      &self.device
    }

    fn run( &self, request : &InferenceRequest ) -> Result< Response, Error >
    {
      let content = request.messages.last().map( | m | m.content.clone() ).unwrap_or_default();
      Ok( Response
      {
        request_id : request.request_id.clone(),
        model : self.model_id.clone(),
        content,
        tokens_used : 0,
        duration_ms : 0,
        metadata : std::collections::HashMap::new(),
      } )
    }
  }
}

::mod_interface::mod_interface!
{
  exposed use private::RunnerSession;
  exposed use private::InMemoryRunnerSession;
}
