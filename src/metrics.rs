//! Metrics emission seam (spec.md §1 : concrete metrics sinks are an
//! external collaborator). This module defines only the event shapes and
//! the sink trait the engine calls into; no metrics backend ships here.

mod private
{
  use core::time::Duration;

  /// One emitted metrics event (spec.md §4.12 : carries identifying tags,
  /// never full request/response content).
  #[ derive( Debug, Clone ) ]
  pub enum MetricEvent
  {
    /// A request completed this phase; `duration` covers the phase only.
    PhaseCompleted { request_id : String, phase : &'static str, duration : Duration },
    /// A request reached a terminal state.
    RequestTerminal { request_id : String, tenant_id : String, provider_id : Option< String >, outcome : &'static str },
    /// A provider's circuit breaker changed state.
    CircuitStateChanged { provider_id : String, state : &'static str },
    /// A quota check was rejected.
    QuotaRejected { entity_id : String, scope : &'static str },
    /// A retry attempt was made.
    RetryAttempted { request_id : String, attempt : u32 },
  }

  /// Consumes [`MetricEvent`]s. Implementations forward to whatever
  /// external metrics system the deployment uses (spec.md §1 Non-goals :
  /// this crate ships no concrete sink).
  pub trait MetricsSink : Send + Sync
  {
    /// Record one event. Must not block the caller for long; slow sinks
    /// should buffer internally.
    fn record( &self, event : MetricEvent );
  }

  /// Discards every event. The default sink when no external collector
  /// is wired in.
  #[ derive( Debug, Default, Clone, Copy ) ]
  pub struct NoopMetricsSink;

  impl MetricsSink for NoopMetricsSink
  {
    fn record( &self, _event : MetricEvent ) {}
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    #[ test ]
    fn noop_sink_accepts_every_event_variant()
    {
      let sink = NoopMetricsSink;
      sink.record( MetricEvent::PhaseCompleted { request_id : "r1".into(), phase : "validation", duration : Duration::from_millis( 1 ) } );
      sink.record( MetricEvent::RequestTerminal { request_id : "r1".into(), tenant_id : "default".into(), provider_id : None, outcome : "completed" } );
      sink.record( MetricEvent::CircuitStateChanged { provider_id : "p1".into(), state : "open" } );
      sink.record( MetricEvent::QuotaRejected { entity_id : "tenant-a".into(), scope : "tenant" } );
      sink.record( MetricEvent::RetryAttempted { request_id : "r1".into(), attempt : 2 } );
    }
  }
}

::mod_interface::mod_interface!
{
  exposed use private::MetricEvent;
  exposed use private::MetricsSink;
  exposed use private::NoopMetricsSink;
}
