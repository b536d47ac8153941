//! Async single-job tracking (spec.md §4.1, §4.8 : "Async single-job
//! submission returns a jobId immediately; the engine enqueues the request
//! on an internal executor and stores status keyed by jobId").
//!
//! Unlike [`crate::batch::BatchRegistry`], which deliberately retains only
//! status counters (DESIGN.md : source exposes no batch payload retention),
//! a single async job has no other channel through which a caller can ever
//! retrieve its result, so [`JobStatus::Completed`]/[`JobStatus::Failed`]
//! carry the terminal [`Response`]/[`Error`] rather than a status label.

mod private
{
  use std::collections::HashMap;
  use std::sync::RwLock;
  use crate::error::Error;
  use crate::response::Response;

  /// Current state of one asynchronously submitted request.
  #[ derive( Debug, Clone ) ]
  pub enum JobStatus
  {
    /// Submitted, not yet picked up by the executor.
    Pending,
    /// Currently executing the pipeline.
    Running,
    /// Terminal : completed successfully.
    Completed( Response ),
    /// Terminal : failed with this error.
    Failed( Error ),
    /// Terminal : cancelled before completion.
    Cancelled,
  }

  impl JobStatus
  {
    /// Whether this status is terminal.
    #[ must_use ]
    pub fn is_terminal( &self ) -> bool
    {
      matches!( self, JobStatus::Completed( _ ) | JobStatus::Failed( _ ) | JobStatus::Cancelled )
    }
  }

  /// Registry of in-flight and completed async jobs keyed by job id.
  #[ derive( Debug, Default ) ]
  pub struct AsyncJobRegistry
  {
    jobs : RwLock< HashMap< String, JobStatus > >,
  }

  impl AsyncJobRegistry
  {
    /// Construct an empty registry.
    #[ must_use ]
    pub fn new() -> Self
    {
      Self::default()
    }

    /// Register a freshly submitted job as `Pending`.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn create( &self, job_id : impl Into< String > )
    {
      self.jobs.write().unwrap().insert( job_id.into(), JobStatus::Pending );
    }

    /// Mark a job as currently executing.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn mark_running( &self, job_id : &str )
    {
      if let Some( status ) = self.jobs.write().unwrap().get_mut( job_id )
      {
        *status = JobStatus::Running;
      }
    }

    /// Record a successful terminal outcome.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn complete( &self, job_id : &str, response : Response )
    {
      self.jobs.write().unwrap().insert( job_id.to_string(), JobStatus::Completed( response ) );
    }

    /// Record a failed terminal outcome.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn fail( &self, job_id : &str, error : Error )
    {
      self.jobs.write().unwrap().insert( job_id.to_string(), JobStatus::Failed( error ) );
    }

    /// Record a cancelled terminal outcome.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn cancel( &self, job_id : &str )
    {
      self.jobs.write().unwrap().insert( job_id.to_string(), JobStatus::Cancelled );
    }

    /// Look up the current status of a job.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValidationError`] if `job_id` is unknown.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn status( &self, job_id : &str ) -> Result< JobStatus, Error >
    {
      self.jobs.read().unwrap()
        .get( job_id )
        .cloned()
        .ok_or_else( || Error::ValidationError( format!( "unknown job id : {job_id}" ) ) )
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    fn sample_response() -> Response
    {
      Response
      {
        request_id : "r1".into(),
        model : "m1".into(),
        content : "hi".into(),
        tokens_used : 1,
        duration_ms : 1,
        metadata : HashMap::new(),
      }
    }

    #[ test ]
    fn lifecycle_pending_running_completed()
    {
      let registry = AsyncJobRegistry::new();
      registry.create( "job-1" );
      assert!( matches!( registry.status( "job-1" ).unwrap(), JobStatus::Pending ) );

      registry.mark_running( "job-1" );
      assert!( matches!( registry.status( "job-1" ).unwrap(), JobStatus::Running ) );

      registry.complete( "job-1", sample_response() );
      let status = registry.status( "job-1" ).unwrap();
      assert!( status.is_terminal() );
      assert!( matches!( status, JobStatus::Completed( response ) if response.content == "hi" ) );
    }

    #[ test ]
    fn unknown_job_id_rejected()
    {
      let registry = AsyncJobRegistry::new();
      assert!( registry.status( "missing" ).is_err() );
    }

    #[ test ]
    fn failure_and_cancellation_are_terminal()
    {
      let registry = AsyncJobRegistry::new();
      registry.create( "job-2" );
      registry.fail( "job-2", Error::UpstreamPermanent( "boom".into() ) );
      assert!( registry.status( "job-2" ).unwrap().is_terminal() );

      registry.create( "job-3" );
      registry.cancel( "job-3" );
      assert!( matches!( registry.status( "job-3" ).unwrap(), JobStatus::Cancelled ) );
    }
  }
}

::mod_interface::mod_interface!
{
  exposed use private::JobStatus;
  exposed use private::AsyncJobRegistry;
}
