//! The phase-plugin contract (spec.md §4.1, §4.4) and the outcome-tag
//! result type plugins return instead of raising exceptions for control
//! flow (spec.md Design Notes §9).

mod private
{
  use crate::context::{ InferenceContext, Phase };
  use crate::error::Error;

  /// What a plugin wants the engine to do next, returned instead of using
  /// exceptions for ordinary control flow.
  #[ derive( Debug, Clone, PartialEq, Eq ) ]
  pub enum Outcome
  {
    /// Continue to the next plugin / phase unchanged.
    Continue,
    /// Stop running plugins in the current phase and advance directly.
    ShortCircuit,
    /// Abort the pipeline with a terminal, non-retryable validation error.
    Abort( String ),
    /// Abort the pipeline because a policy plugin denied the request
    /// (spec.md §4.1 : "`PolicyDenied` when a policy plugin denies").
    /// Distinct from [`Outcome::Abort`] so the engine can surface the
    /// correct closed-set error kind instead of collapsing every abort
    /// into `ValidationError`.
    Deny( String ),
    /// Abort the current attempt but allow the retry/failover machinery to
    /// try again.
    Retry( String ),
  }

  /// A single pipeline plugin bound to one or more phases (spec.md §4.1
  /// `PipelinePlugin`).
  ///
  /// Implementations must be side-effect-idempotent with respect to
  /// `context.attempt` : the engine may invoke the same phase's plugins
  /// more than once across retries.
  pub trait PipelinePlugin : Send + Sync
  {
    /// Stable plugin identifier, unique within a [`crate::pipeline::registry::PluginRegistry`].
    fn name( &self ) -> &str;

    /// Phases this plugin participates in.
    fn phases( &self ) -> &[ Phase ];

    /// Relative ordering within a phase; lower runs first. Ties break by
    /// registration order.
    fn priority( &self ) -> i32
    {
      0
    }

    /// Execute against `context` for `phase`.
    ///
    /// # Errors
    ///
    /// Plugins may still return `Err` for genuine infrastructure failures
    /// (e.g. a panic-adjacent invariant violation); ordinary control flow
    /// uses [`Outcome`] instead.
    fn execute( &self, context : &mut InferenceContext, phase : Phase ) -> Result< Outcome, Error >;
  }
}

::mod_interface::mod_interface!
{
  exposed use private::Outcome;
  exposed use private::PipelinePlugin;
}
