//! Provider-neutral response, stream chunk, and error envelope shapes
//! (spec.md §6).

mod private
{
  use std::collections::HashMap;
  use serde::{ Deserialize, Serialize };

  /// A completed, non-streamed inference response.
  #[ derive( Debug, Clone, PartialEq, Serialize, Deserialize ) ]
  pub struct Response
  {
    /// Echoes the originating request id.
    pub request_id : String,
    /// Resolved model identifier actually served.
    pub model : String,
    /// Generated text.
    pub content : String,
    /// Total tokens consumed by the call (provider-reported or estimated).
    pub tokens_used : u64,
    /// Wall-clock duration of the call.
    pub duration_ms : u64,
    /// Free-form response metadata (`finishReason`, `providerId`, ...).
    pub metadata : HashMap< String, String >,
  }

  /// One chunk of a streamed inference response (spec.md §4.9).
  #[ derive( Debug, Clone, PartialEq, Serialize, Deserialize ) ]
  pub struct Chunk
  {
    /// Echoes the originating request id.
    pub request_id : String,
    /// Incremental text delta.
    pub delta : String,
    /// Whether this is the terminal chunk of the stream.
    pub is_final : bool,
    /// Free-form chunk metadata.
    pub metadata : HashMap< String, String >,
  }

  /// Provider-neutral error envelope surfaced at the boundary (spec.md §6).
  #[ derive( Debug, Clone, PartialEq, Serialize, Deserialize ) ]
  pub struct ErrorEnvelope
  {
    /// Stable error code (closed set, spec.md §7).
    pub error_code : String,
    /// Human-readable message.
    pub message : String,
    /// Echoes the originating request id, if known.
    pub request_id : String,
    /// HTTP status an external surface should map this onto.
    pub http_status : u16,
    /// Whether the pipeline considered this error retryable.
    pub retryable : bool,
    /// Free-form error details.
    pub details : HashMap< String, String >,
  }

  impl From< ( &crate::error::Error, &str ) > for ErrorEnvelope
  {
    #[ inline ]
    fn from( ( error, request_id ) : ( &crate::error::Error, &str ) ) -> Self
    {
      Self
      {
        error_code : error.code().to_string(),
        message : error.to_string(),
        request_id : request_id.to_string(),
        http_status : error.http_status(),
        retryable : error.retryable(),
        details : HashMap::new(),
      }
    }
  }
}

::mod_interface::mod_interface!
{
  exposed use private::Response;
  exposed use private::Chunk;
  exposed use private::ErrorEnvelope;
}
