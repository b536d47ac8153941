//! The provider adapter contract (spec.md §4.5) : the seam between the
//! engine and a concrete vendor wire protocol. Concrete vendor protocols
//! are out of scope here (spec.md §1) — callers plug in their own
//! adapters implementing this trait.

mod private
{
  use async_trait::async_trait;
  use crate::error::Error;
  use crate::manifest::ArtifactFormat;
  use crate::request::InferenceRequest;
  use crate::response::{ Chunk, Response };
  use crate::tenant::TenantContext;

  /// Static capability/identity facts about a provider, consulted by the
  /// router's scoring function (spec.md §4.3).
  #[ derive( Debug, Clone, PartialEq ) ]
  pub struct ProviderDescriptor
  {
    /// Stable provider id, unique within a [`crate::provider::registry::ProviderRegistry`].
    pub provider_id : String,
    /// Version string for this adapter. Multiple versions of the same
    /// `provider_id` may be registered at once (spec.md §4.4 Registry
    /// invariants); comparisons are lexical, so callers wanting numeric
    /// ordering past a single digit should zero-pad (`"02.0.0"`, not
    /// `"2.0.0"`).
    pub version : String,
    /// Devices this provider can dispatch to.
    pub supported_devices : Vec< String >,
    /// Whether this provider supports `Chunk` streaming.
    pub supports_streaming : bool,
    /// Declared cost weight consulted by cost-aware scoring factors.
    pub relative_cost : f64,
    /// Local artifact formats this provider can load directly (empty for
    /// a provider that only ever serves via a remote API and carries no
    /// `ModelManifest` artifact of its own), consulted by the router's
    /// native-format scoring bonus (spec.md §4.3 : "+50 if any artifact
    /// format is in `provider.supportedFormats`").
    pub supported_formats : Vec< ArtifactFormat >,
    /// Whether this provider can execute tool/function calls.
    pub tool_calling : bool,
    /// Whether this provider accepts multimodal (non-text) content.
    pub multimodal : bool,
    /// Maximum input context length in tokens, if the provider declares
    /// one.
    pub max_context : Option< u32 >,
    /// Maximum output length in tokens, if the provider declares one.
    pub max_output : Option< u32 >,
  }

  /// A concrete integration with one upstream model-serving backend
  /// (spec.md §4.5 `ProviderAdapter`). Implementations own whatever
  /// client, connection pool, or in-process runner handle is needed to
  /// actually serve a request; this crate ships no vendor-specific wire
  /// protocol implementations (spec.md §1 Non-goals).
  #[ async_trait ]
  pub trait ProviderAdapter : Send + Sync
  {
    /// Static descriptor consulted by router scoring.
    fn descriptor( &self ) -> &ProviderDescriptor;

    /// One-time adapter configuration, run before the adapter is
    /// registered (spec.md §4.4 `Initialize(config)`). `config` carries
    /// whatever vendor-specific settings (API keys, endpoints, tuning
    /// knobs) the concrete adapter needs; this crate only defines the
    /// seam, not any wire protocol's actual config shape (spec.md §1
    /// Non-goals). Adapters with nothing to configure (the common case
    /// for a deterministic test double) can rely on the default no-op.
    ///
    /// # Errors
    ///
    /// Implementations return an [`Error`] if `config` is missing a
    /// required key or otherwise fails validation.
    async fn initialize( &self, config : &crate::request::Parameters ) -> Result< (), Error >
    {
      let _ = config;
      Ok( () )
    }

    /// Whether this provider can serve `model_id` for `tenant` (spec.md
    /// §4.4 `Supports(modelId, tenantCtx)`), consulted before a provider
    /// is offered to the router as a candidate. Defaults to `true` : most
    /// adapters serve every model the caller routes to them and rely on
    /// [`ProviderDescriptor::supported_devices`]/manifest resolution for
    /// compatibility instead.
    fn supports( &self, model_id : &str, tenant : &TenantContext ) -> bool
    {
      let _ = model_id;
      let _ = tenant;
      true
    }

    /// Serve a single non-streamed request.
    ///
    /// # Errors
    ///
    /// Implementations classify failures into the closed [`Error`]
    /// taxonomy so the reliability envelope (retry/circuit breaker/
    /// failover) can reason about retryability uniformly across vendors.
    async fn invoke( &self, request : &InferenceRequest ) -> Result< Response, Error >;

    /// Serve a single streamed request as a sequence of chunks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValidationError`] by default for adapters whose
    /// descriptor reports `supports_streaming == false`.
    async fn invoke_streaming(
      &self,
      request : &InferenceRequest,
    ) -> Result< crate::streaming::ChunkStream, Error >
    {
      let _ = request;
      Err( Error::ValidationError( format!(
        "provider {} does not support streaming", self.descriptor().provider_id
      ) ) )
    }

    /// Cheap liveness probe consulted by health checks (spec.md §4.7).
    ///
    /// # Errors
    ///
    /// Any `Err` is treated as `Unhealthy` by the caller.
    async fn ping( &self ) -> Result< (), Error >
    {
      Ok( () )
    }

    /// Release any resources held by this adapter (spec.md §4.4
    /// `Shutdown()`). Called by [`crate::provider::registry::ProviderRegistry::unregister`]
    /// callers that want deterministic teardown; adapters with nothing to
    /// release (the common case for a stateless remote-API client) can
    /// rely on the default no-op.
    async fn shutdown( &self )
    {
    }
  }

  #[ allow( dead_code ) ]
  fn _assert_chunk_bound( _ : &Chunk ) {}
}

::mod_interface::mod_interface!
{
  exposed use private::ProviderDescriptor;
  exposed use private::ProviderAdapter;
}
