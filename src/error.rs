//! Closed error taxonomy for the inference gateway.
//!
//! Every error surfaced by the core belongs to the closed set defined here.
//! Each variant carries a stable `httpStatus` (for an external HTTP layer to
//! map onto) and a `retryable` bit consulted by the retry/fallback logic.

mod private
{
  use error_tools::dependency::thiserror;

  /// Errors produced by the inference gateway core.
  #[ derive( Debug, thiserror::Error, Clone, PartialEq ) ]
  pub enum Error
  {
    /// Request malformed or violates schema.
    #[ error( "validation error : {0}" ) ]
    ValidationError( String ),

    /// Missing or invalid tenant / credentials.
    #[ error( "authentication error : {0}" ) ]
    AuthError( String ),

    /// No manifest for (tenant, model).
    #[ error( "model not found : {0}" ) ]
    ModelNotFound( String ),

    /// Model exists, version missing.
    #[ error( "version not found : {0}" ) ]
    VersionNotFound( String ),

    /// Router returned an empty candidate set.
    #[ error( "no compatible provider for model : {0}" ) ]
    NoCompatibleProvider( String ),

    /// Tenant or provider quota denied.
    #[ error( "quota exceeded : {0}" ) ]
    QuotaExceeded( String ),

    /// Circuit breaker open for the selected provider.
    #[ error( "circuit open for {operation} : retry after {retry_after_ms}ms" ) ]
    CircuitOpen
    {
      /// Operation key the breaker is tracking.
      operation : String,
      /// Estimated time until the breaker allows probes again.
      retry_after_ms : u64,
    },

    /// Effective timeout elapsed.
    #[ error( "timeout after {0}ms" ) ]
    Timeout( u64 ),

    /// Provider returned a retryable error (5xx, 429, network).
    #[ error( "upstream transient error : {0}" ) ]
    UpstreamTransient( String ),

    /// Provider returned a non-retryable error.
    #[ error( "upstream permanent error : {0}" ) ]
    UpstreamPermanent( String ),

    /// Provider returned a rate-limit response carrying a retry-after
    /// duration (spec.md §4.7 : "on observing a rate-limit response, the
    /// provider is marked suspended for a retry-after duration").
    #[ error( "rate limited by {provider_id} : retry after {retry_after_ms}ms" ) ]
    RateLimited
    {
      /// The provider that returned the rate-limit response.
      provider_id : String,
      /// Duration the caller should wait before retrying this provider.
      retry_after_ms : u64,
    },

    /// Policy plugin returned DENY.
    #[ error( "policy denied : {0}" ) ]
    PolicyDenied( String ),

    /// Invariant violation or other unexpected internal condition.
    #[ error( "internal error : {0}" ) ]
    InternalError( String ),

    /// Request cancelled before completion.
    #[ error( "cancelled" ) ]
    Cancelled,

    /// Invalid configuration supplied at startup or at reload.
    #[ error( "configuration error : {0}" ) ]
    ConfigurationError( String ),
  }

  impl Error
  {
    /// Whether the pipeline is permitted to retry / fall back on this error.
    #[ must_use ]
    #[ inline ]
    pub fn retryable( &self ) -> bool
    {
      matches!(
        self,
        Error::CircuitOpen { .. } | Error::Timeout( _ ) | Error::UpstreamTransient( _ ) | Error::RateLimited { .. }
      )
    }

    /// Whether a fallback hop may be attempted for this error (spec.md §4.10 / §7).
    #[ must_use ]
    #[ inline ]
    pub fn fallback_eligible( &self ) -> bool
    {
      matches!(
        self,
        Error::CircuitOpen { .. } | Error::Timeout( _ ) | Error::UpstreamTransient( _ ) | Error::RateLimited { .. }
      )
    }

    /// The stable HTTP status an external surface should map this onto.
    #[ must_use ]
    #[ inline ]
    pub fn http_status( &self ) -> u16
    {
      match self
      {
        Error::ValidationError( _ ) => 400,
        Error::AuthError( _ ) => 401,
        Error::ModelNotFound( _ ) | Error::VersionNotFound( _ ) | Error::NoCompatibleProvider( _ ) => 404,
        Error::QuotaExceeded( _ ) => 429,
        Error::CircuitOpen { .. } => 503,
        Error::Timeout( _ ) => 504,
        Error::UpstreamTransient( _ ) => 503,
        Error::UpstreamPermanent( _ ) => 502,
        Error::RateLimited { .. } => 429,
        Error::PolicyDenied( _ ) => 403,
        Error::InternalError( _ ) | Error::ConfigurationError( _ ) => 500,
        Error::Cancelled => 499,
      }
    }

    /// The stable error code string for the external error envelope (spec.md §6).
    #[ must_use ]
    #[ inline ]
    pub fn code( &self ) -> &'static str
    {
      match self
      {
        Error::ValidationError( _ ) => "ValidationError",
        Error::AuthError( _ ) => "AuthError",
        Error::ModelNotFound( _ ) => "ModelNotFound",
        Error::VersionNotFound( _ ) => "VersionNotFound",
        Error::NoCompatibleProvider( _ ) => "NoCompatibleProvider",
        Error::QuotaExceeded( _ ) => "QuotaExceeded",
        Error::CircuitOpen { .. } => "CircuitOpen",
        Error::Timeout( _ ) => "Timeout",
        Error::UpstreamTransient( _ ) => "UpstreamTransient",
        Error::UpstreamPermanent( _ ) => "UpstreamPermanent",
        Error::RateLimited { .. } => "RateLimited",
        Error::PolicyDenied( _ ) => "PolicyDenied",
        Error::InternalError( _ ) => "InternalError",
        Error::Cancelled => "Cancelled",
        Error::ConfigurationError( _ ) => "ConfigurationError",
      }
    }
  }

  impl From< serde_json::Error > for Error
  {
    #[ inline ]
    fn from( err : serde_json::Error ) -> Self
    {
      Error::InternalError( format!( "serialization error : {err}" ) )
    }
  }
}

::mod_interface::mod_interface!
{
  exposed use private::Error;
}
