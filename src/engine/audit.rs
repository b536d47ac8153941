//! Audit trail emission seam (spec.md §1 : persistence of audit records
//! is an external collaborator). Defines only the event shape and the
//! sink trait the engine calls into.

mod private
{
  use crate::context::RequestStatus;

  /// One audit-worthy lifecycle event. Carries identifying tags only;
  /// message content is never included (spec.md §4.12).
  #[ derive( Debug, Clone ) ]
  pub struct AuditEvent
  {
    /// The request this event concerns.
    pub request_id : String,
    /// Owning tenant.
    pub tenant_id : String,
    /// Provider dispatched to, if routing had completed by this point.
    pub provider_id : Option< String >,
    /// Status the request transitioned into.
    pub status : RequestStatus,
    /// Attempt number at the time of this event.
    pub attempt : u32,
    /// Wall-clock time this event was recorded (spec.md §4.12 audit
    /// records are timestamped).
    pub recorded_at : chrono::DateTime< chrono::Utc >,
  }

  /// Consumes [`AuditEvent`]s. Implementations forward to whatever
  /// external audit store the deployment uses; this crate ships no
  /// concrete sink (spec.md §1 Non-goals).
  pub trait AuditSink : Send + Sync
  {
    /// Record one event.
    fn record( &self, event : AuditEvent );
  }

  /// Discards every event. The default sink when no external audit
  /// store is wired in.
  #[ derive( Debug, Default, Clone, Copy ) ]
  pub struct NoopAuditSink;

  impl AuditSink for NoopAuditSink
  {
    fn record( &self, _event : AuditEvent ) {}
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    #[ test ]
    fn noop_sink_accepts_events()
    {
      let sink = NoopAuditSink;
      sink.record( AuditEvent
      {
        request_id : "r1".into(), tenant_id : "default".into(), provider_id : None,
        status : RequestStatus::Completed, attempt : 1, recorded_at : chrono::Utc::now(),
      } );
    }
  }
}

::mod_interface::mod_interface!
{
  exposed use private::AuditEvent;
  exposed use private::AuditSink;
  exposed use private::NoopAuditSink;
}
