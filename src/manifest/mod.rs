//! Model manifests and versions (spec.md §3, §6) : the external record the
//! router and session manager consult to learn where a model's artifacts
//! live and what it requires. Persistence of these records is out of scope
//! (spec.md §1); this module only defines the shapes and the read-only
//! repository contract.

/// Resolution of `(tenant, modelId)` to a manifest; see [`repository`].
pub mod repository;

mod private
{
  use std::collections::HashMap;
  use serde::{ Deserialize, Serialize };

  /// On-disk / object-storage model artifact format.
  #[ derive( Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize ) ]
  pub enum ArtifactFormat
  {
    /// GGUF, served by local llama.cpp-style runners.
    Gguf,
    /// ONNX runtime format.
    Onnx,
    /// NVIDIA TensorRT engine.
    TensorRt,
    /// TorchScript.
    TorchScript,
    /// TensorFlow SavedModel directory.
    TensorFlowSavedModel,
  }

  /// Where one artifact lives and how to verify it.
  #[ derive( Debug, Clone, PartialEq, Serialize, Deserialize ) ]
  pub struct ArtifactLocation
  {
    /// Object storage or filesystem URI.
    pub uri : String,
    /// Content checksum, frozen after upload.
    pub checksum : String,
    /// Size in bytes.
    pub size_bytes : u64,
    /// Optional storage ETag.
    pub etag : Option< String >,
  }

  /// Resource requirements a provider must satisfy to serve this model.
  #[ derive( Debug, Clone, Default, PartialEq, Serialize, Deserialize ) ]
  pub struct ResourceRequirements
  {
    /// Minimum VRAM in megabytes, if GPU-bound.
    pub min_vram_mb : Option< u64 >,
    /// Minimum system RAM in megabytes.
    pub min_ram_mb : Option< u64 >,
    /// Whether CUDA is required (as opposed to merely preferred).
    pub requires_cuda : bool,
  }

  /// Metadata record describing a model and where its artifacts live
  /// (spec.md §3 `ModelManifest`).
  ///
  /// Invariant: `modelId` is unique per tenant, and at least one artifact
  /// or a `providerId` tag must be present — a manifest for a model served
  /// entirely by a cloud provider carries no artifacts at all.
  #[ derive( Debug, Clone, PartialEq, Serialize, Deserialize ) ]
  pub struct ModelManifest
  {
    /// Model identifier, unique within `tenant_id`.
    pub model_id : String,
    /// Owning tenant.
    pub tenant_id : String,
    /// Human-readable name.
    pub name : String,
    /// Manifest version string.
    pub version : String,
    /// Artifacts keyed by format.
    pub artifacts : HashMap< ArtifactFormat, ArtifactLocation >,
    /// Devices this model may run on (`"cpu"`, `"cuda"`, ...).
    pub supported_devices : Vec< String >,
    /// Resource requirements.
    pub resource_requirements : ResourceRequirements,
    /// If non-empty, this model is served entirely by the named cloud
    /// provider and carries no local artifacts.
    pub provider_tag : Option< String >,
    /// Free-form manifest metadata.
    pub metadata : HashMap< String, String >,
  }

  impl ModelManifest
  {
    /// Validate the "at least one artifact OR a providerId tag" invariant.
    #[ must_use ]
    pub fn is_valid( &self ) -> bool
    {
      !self.model_id.is_empty()
        && !self.tenant_id.is_empty()
        && ( !self.artifacts.is_empty() || self.provider_tag.is_some() )
    }
  }

  /// Lifecycle status of a [`ModelVersion`].
  #[ derive( Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize ) ]
  pub enum ModelVersionStatus
  {
    /// Currently servable.
    Active,
    /// Servable but scheduled for removal.
    Deprecated,
    /// No longer servable.
    Deleted,
  }

  /// One uploaded version of a model (spec.md §3 `ModelVersion`).
  ///
  /// Exactly one `ACTIVE` version exists per `(model, versionString)`
  /// tuple; `checksum` is frozen once uploaded.
  #[ derive( Debug, Clone, PartialEq, Serialize, Deserialize ) ]
  pub struct ModelVersion
  {
    /// Version string, e.g. `"1.2.0"`.
    pub version_string : String,
    /// Storage location of the version's payload.
    pub storage_uri : String,
    /// Artifact format of this version.
    pub format : ArtifactFormat,
    /// Checksum, immutable once set.
    pub checksum : String,
    /// Size in bytes.
    pub size_bytes : u64,
    /// Lifecycle status.
    pub status : ModelVersionStatus,
    /// JSON snapshot of the manifest at upload time.
    pub manifest_snapshot : serde_json::Value,
  }
}

::mod_interface::mod_interface!
{
  exposed use private::ArtifactFormat;
  exposed use private::ArtifactLocation;
  exposed use private::ResourceRequirements;
  exposed use private::ModelManifest;
  exposed use private::ModelVersionStatus;
  exposed use private::ModelVersion;
}
