//! Per-request context and the pure pipeline state machine (spec.md §3,
//! §4.2, §8 invariant 2).

mod private
{
  use std::collections::HashMap;
  use crate::error::Error;
  use crate::request::InferenceRequest;
  use crate::response::Response;

  /// A pipeline phase, executed in this fixed ascending order.
  #[ derive( Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash ) ]
  pub enum Phase
  {
    /// Schema / structural validation.
    Validation,
    /// Request transformation prior to dispatch (e.g. prompt templating).
    PreProcessing,
    /// Provider selection and invocation.
    ProviderDispatch,
    /// Response transformation after dispatch.
    PostProcessing,
  }

  impl Phase
  {
    /// All phases in fixed execution order.
    #[ must_use ]
    #[ inline ]
    pub fn ordered() -> [ Phase; 4 ]
    {
      [ Phase::Validation, Phase::PreProcessing, Phase::ProviderDispatch, Phase::PostProcessing ]
    }

    /// The phase following this one, or `None` after `PostProcessing`.
    #[ must_use ]
    #[ inline ]
    pub fn next( self ) -> Option< Phase >
    {
      match self
      {
        Phase::Validation => Some( Phase::PreProcessing ),
        Phase::PreProcessing => Some( Phase::ProviderDispatch ),
        Phase::ProviderDispatch => Some( Phase::PostProcessing ),
        Phase::PostProcessing => None,
      }
    }
  }

  /// Lifecycle status of an [`InferenceContext`] (spec.md §4.2).
  #[ derive( Debug, Clone, Copy, PartialEq, Eq ) ]
  pub enum RequestStatus
  {
    /// Context constructed, not yet started.
    Created,
    /// Pipeline currently executing a phase.
    Running,
    /// A retryable phase failure occurred; about to re-enter `Running`.
    Retrying,
    /// Terminal : pipeline completed successfully.
    Completed,
    /// Terminal : retries exhausted or a non-retryable failure occurred.
    Failed,
    /// Terminal : an external cancel signal arrived before completion.
    Cancelled,
  }

  impl RequestStatus
  {
    /// Whether this status is terminal (`COMPLETED`, `FAILED`, `CANCELLED`).
    #[ must_use ]
    #[ inline ]
    pub fn is_terminal( self ) -> bool
    {
      matches!( self, RequestStatus::Completed | RequestStatus::Failed | RequestStatus::Cancelled )
    }
  }

  /// A signal fed into the pure transition function [`next_status`].
  #[ derive( Debug, Clone, Copy, PartialEq, Eq ) ]
  pub enum Signal
  {
    /// Engine begins executing the pipeline.
    Start,
    /// A phase completed without error and more phases remain.
    PhaseAdvanced,
    /// The final phase completed without error.
    PipelineCompleted,
    /// A phase failed with a retryable error and attempts remain.
    RetryableFailure,
    /// A phase failed and either the error is non-retryable or attempts
    /// are exhausted.
    TerminalFailure,
    /// An external cancel signal arrived.
    CancelRequested,
  }

  /// Pure `(current, signal) -> next` transition function (spec.md §4.2,
  /// §8 invariant 2). Feeding the same pair always yields the same result;
  /// illegal transitions map to `Failed` via [`Error::InternalError`].
  #[ must_use ]
  pub fn next_status( current : RequestStatus, signal : Signal ) -> Result< RequestStatus, Error >
  {
    use RequestStatus::{ Cancelled, Completed, Created, Failed, Retrying, Running };
    use Signal::{ CancelRequested, PhaseAdvanced, PipelineCompleted, RetryableFailure, Start, TerminalFailure };

    if current.is_terminal()
    {
      return Err( Error::InternalError( format!( "no transitions out of terminal state {current:?}" ) ) );
    }

    match ( current, signal )
    {
      ( Created, Start ) => Ok( Running ),
      ( Running, PhaseAdvanced ) => Ok( Running ),
      ( Running, PipelineCompleted ) => Ok( Completed ),
      ( Running, RetryableFailure ) => Ok( Retrying ),
      ( Running, TerminalFailure ) => Ok( Failed ),
      ( Retrying, Start ) => Ok( Running ),
      ( Created | Running | Retrying, CancelRequested ) => Ok( Cancelled ),
      ( current, signal ) => Err( Error::InternalError(
        format!( "illegal transition : {current:?} + {signal:?}" )
      ) ),
    }
  }

  /// Per-request pipeline context (spec.md §3 `InferenceContext`).
  ///
  /// Exactly one of `response`/`error` is set once the context reaches a
  /// terminal status; `status` only moves forward except via `Retrying`.
  #[ derive( Debug, Clone ) ]
  pub struct InferenceContext
  {
    /// The originating request, immutable.
    pub request : InferenceRequest,
    /// Owning tenant id (denormalized from the request for convenience).
    pub tenant_id : String,
    /// Current pipeline phase.
    pub phase : Phase,
    /// Current lifecycle status.
    pub status : RequestStatus,
    /// 1-based attempt counter across retries.
    pub attempt : u32,
    /// Response slot, set exactly once at a successful terminal state.
    pub response : Option< Response >,
    /// Error slot, set exactly once at a failed/cancelled terminal state.
    pub error : Option< Error >,
    /// Free-form per-request attributes plugins may stash data in.
    pub attributes : HashMap< String, String >,
  }

  impl InferenceContext
  {
    /// Construct a fresh context for `request`.
    #[ must_use ]
    pub fn new( request : InferenceRequest, tenant_id : impl Into< String > ) -> Self
    {
      Self
      {
        request,
        tenant_id : tenant_id.into(),
        phase : Phase::Validation,
        status : RequestStatus::Created,
        attempt : 1,
        response : None,
        error : None,
        attributes : HashMap::new(),
      }
    }

    /// Request the pure transition and, if legal, apply it in place.
    pub fn transition( &mut self, signal : Signal ) -> Result< (), Error >
    {
      let next = next_status( self.status, signal )?;
      self.status = next;
      Ok( () )
    }

    /// Reset the context for a single fallback hop to a fresh provider : a
    /// new attempt counter and a context back at `PROVIDER_DISPATCH`
    /// (spec.md §4.10 : "creating a fresh context with attempt reset").
    #[ must_use ]
    pub fn for_fallback_hop( &self ) -> Self
    {
      Self
      {
        request : self.request.clone(),
        tenant_id : self.tenant_id.clone(),
        phase : Phase::ProviderDispatch,
        status : RequestStatus::Running,
        attempt : 1,
        response : None,
        error : None,
        attributes : self.attributes.clone(),
      }
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    #[ test ]
    fn start_then_complete()
    {
      assert_eq!( next_status( RequestStatus::Created, Signal::Start ).unwrap(), RequestStatus::Running );
      assert_eq!( next_status( RequestStatus::Running, Signal::PipelineCompleted ).unwrap(), RequestStatus::Completed );
    }

    #[ test ]
    fn retry_then_resume()
    {
      assert_eq!( next_status( RequestStatus::Running, Signal::RetryableFailure ).unwrap(), RequestStatus::Retrying );
      assert_eq!( next_status( RequestStatus::Retrying, Signal::Start ).unwrap(), RequestStatus::Running );
    }

    #[ test ]
    fn terminal_states_reject_further_transitions()
    {
      assert!( next_status( RequestStatus::Completed, Signal::Start ).is_err() );
      assert!( next_status( RequestStatus::Failed, Signal::CancelRequested ).is_err() );
      assert!( next_status( RequestStatus::Cancelled, Signal::Start ).is_err() );
    }

    #[ test ]
    fn cancel_from_any_nonterminal_state()
    {
      assert_eq!( next_status( RequestStatus::Created, Signal::CancelRequested ).unwrap(), RequestStatus::Cancelled );
      assert_eq!( next_status( RequestStatus::Running, Signal::CancelRequested ).unwrap(), RequestStatus::Cancelled );
      assert_eq!( next_status( RequestStatus::Retrying, Signal::CancelRequested ).unwrap(), RequestStatus::Cancelled );
    }

    #[ test ]
    fn transition_is_pure_and_deterministic()
    {
      let a = next_status( RequestStatus::Running, Signal::RetryableFailure );
      let b = next_status( RequestStatus::Running, Signal::RetryableFailure );
      assert_eq!( a, b );
    }

    #[ test ]
    fn phase_order_is_fixed()
    {
      let order = Phase::ordered();
      assert_eq!( order, [ Phase::Validation, Phase::PreProcessing, Phase::ProviderDispatch, Phase::PostProcessing ] );
      assert_eq!( Phase::Validation.next(), Some( Phase::PreProcessing ) );
      assert_eq!( Phase::PostProcessing.next(), None );
    }
  }
}

::mod_interface::mod_interface!
{
  exposed use private::Phase;
  exposed use private::RequestStatus;
  exposed use private::Signal;
  exposed use private::next_status;
  exposed use private::InferenceContext;
}
