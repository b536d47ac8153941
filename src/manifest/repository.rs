//! Resolution of `(tenant, modelId)` to a [`ModelManifest`] (spec.md §2
//! component 3). Persistence is an external collaborator; this module only
//! specifies the read-only contract the engine consumes, plus an in-memory
//! implementation used by tests and as a reference for a real backing
//! store (database, object-storage index, ...).

mod private
{
  use std::collections::HashMap;
  use std::sync::RwLock;
  use crate::error::Error;
  use crate::manifest::{ ModelManifest, ArtifactFormat };

  /// Resolves manifests, and for local formats, resolves an artifact to a
  /// filesystem path a local runner can load directly.
  pub trait ModelRepository : Send + Sync
  {
    /// Look up the manifest for `(tenant_id, model_id)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModelNotFound`] when no manifest is registered.
    fn resolve( &self, tenant_id : &str, model_id : &str ) -> Result< ModelManifest, Error >;

    /// Resolve a local-format artifact already present in a manifest to a
    /// filesystem path a native runner can `mmap`/load.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VersionNotFound`] if the requested format is not
    /// among the manifest's artifacts.
    fn resolve_artifact_path( &self, manifest : &ModelManifest, format : ArtifactFormat ) -> Result< String, Error >
    {
      manifest.artifacts.get( &format )
        .map( | location | location.uri.clone() )
        .ok_or_else( || Error::VersionNotFound( format!( "no {format:?} artifact for model {}", manifest.model_id ) ) )
    }
  }

  /// In-memory `ModelRepository` used by tests and as a minimal reference
  /// implementation. A production deployment backs this trait with a real
  /// manifest store (spec.md §1 : persistence is an external collaborator).
  #[ derive( Debug, Default ) ]
  pub struct InMemoryModelRepository
  {
    manifests : RwLock< HashMap< ( String, String ), ModelManifest > >,
  }

  impl InMemoryModelRepository
  {
    /// Construct an empty repository.
    #[ must_use ]
    #[ inline ]
    pub fn new() -> Self
    {
      Self::default()
    }

    /// Register (or re-register) a manifest.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[ inline ]
    pub fn register( &self, manifest : ModelManifest )
    {
      let key = ( manifest.tenant_id.clone(), manifest.model_id.clone() );
      self.manifests.write().unwrap().insert( key, manifest );
    }
  }

  impl ModelRepository for InMemoryModelRepository
  {
    #[ inline ]
    fn resolve( &self, tenant_id : &str, model_id : &str ) -> Result< ModelManifest, Error >
    {
      let key = ( tenant_id.to_string(), model_id.to_string() );
      self.manifests.read().unwrap()
        .get( &key )
        .cloned()
        .ok_or_else( || Error::ModelNotFound( format!( "{tenant_id}/{model_id}" ) ) )
    }
  }
}

::mod_interface::mod_interface!
{
  exposed use private::ModelRepository;
  exposed use private::InMemoryModelRepository;
}
