//! Batch job tracking (spec.md §4.x Batch operations) : status-only
//! bookkeeping for a set of requests submitted together, with
//! `completed + failed <= total` enforced atomically and O(1) status
//! queries. Batch payloads themselves are not retained (spec.md Design
//! Notes §9 Open Question : resolved in `DESIGN.md`).

mod private
{
  use std::collections::HashMap;
  use std::sync::atomic::{ AtomicU64, Ordering };
  use std::sync::RwLock;
  use crate::error::Error;

  /// Snapshot of a batch job's progress, safe to clone and hand to
  /// callers without holding any lock.
  #[ derive( Debug, Clone, Copy, PartialEq, Eq ) ]
  pub struct BatchStatus
  {
    /// Requests submitted as part of this batch.
    pub total : u64,
    /// Requests that reached `COMPLETED`.
    pub completed : u64,
    /// Requests that reached `FAILED` or `CANCELLED`.
    pub failed : u64,
  }

  impl BatchStatus
  {
    /// Whether every request in the batch has reached a terminal state.
    #[ must_use ]
    #[ inline ]
    pub fn is_done( self ) -> bool
    {
      self.completed + self.failed >= self.total
    }

    /// Requests still running or queued.
    #[ must_use ]
    #[ inline ]
    pub fn remaining( self ) -> u64
    {
      self.total.saturating_sub( self.completed + self.failed )
    }
  }

  /// Tracks one batch's progress via atomic counters, never materializing
  /// per-request payloads (spec.md : only status is retained).
  #[ derive( Debug ) ]
  pub struct BatchJob
  {
    total : u64,
    completed : AtomicU64,
    failed : AtomicU64,
  }

  impl BatchJob
  {
    /// Construct a job tracking `total` requests, none yet terminal.
    #[ must_use ]
    pub fn new( total : u64 ) -> Self
    {
      Self { total, completed : AtomicU64::new( 0 ), failed : AtomicU64::new( 0 ) }
    }

    /// Record one request reaching `COMPLETED`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InternalError`] if this would push
    /// `completed + failed` past `total` — a caller bug (double
    /// reporting for the same request).
    pub fn record_completed( &self ) -> Result< (), Error >
    {
      self.record( &self.completed )
    }

    /// Record one request reaching `FAILED`/`CANCELLED`.
    ///
    /// # Errors
    ///
    /// See [`BatchJob::record_completed`].
    pub fn record_failed( &self ) -> Result< (), Error >
    {
      self.record( &self.failed )
    }

    fn record( &self, counter : &AtomicU64 ) -> Result< (), Error >
    {
      let completed = self.completed.load( Ordering::SeqCst );
      let failed = self.failed.load( Ordering::SeqCst );
      if completed + failed >= self.total
      {
        return Err( Error::InternalError( "batch job over-reported : completed + failed already at total".to_string() ) );
      }
      counter.fetch_add( 1, Ordering::SeqCst );
      Ok( () )
    }

    /// O(1) snapshot of current progress.
    #[ must_use ]
    pub fn status( &self ) -> BatchStatus
    {
      BatchStatus
      {
        total : self.total,
        completed : self.completed.load( Ordering::SeqCst ),
        failed : self.failed.load( Ordering::SeqCst ),
      }
    }
  }

  /// Registry of in-flight and completed [`BatchJob`]s keyed by batch id.
  #[ derive( Debug, Default ) ]
  pub struct BatchRegistry
  {
    jobs : RwLock< HashMap< String, BatchJob > >,
  }

  impl BatchRegistry
  {
    /// Construct an empty registry.
    #[ must_use ]
    pub fn new() -> Self
    {
      Self::default()
    }

    /// Register a new batch of `total` requests under `batch_id`.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn create( &self, batch_id : impl Into< String >, total : u64 )
    {
      self.jobs.write().unwrap().insert( batch_id.into(), BatchJob::new( total ) );
    }

    /// O(1) status lookup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValidationError`] if `batch_id` is unknown.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn status( &self, batch_id : &str ) -> Result< BatchStatus, Error >
    {
      self.jobs.read().unwrap()
        .get( batch_id )
        .map( BatchJob::status )
        .ok_or_else( || Error::ValidationError( format!( "unknown batch id : {batch_id}" ) ) )
    }

    /// Record one request's terminal outcome against its batch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValidationError`] if `batch_id` is unknown, or
    /// propagates [`BatchJob::record_completed`]/[`BatchJob::record_failed`].
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn record( &self, batch_id : &str, succeeded : bool ) -> Result< (), Error >
    {
      let jobs = self.jobs.read().unwrap();
      let job = jobs.get( batch_id ).ok_or_else( || Error::ValidationError( format!( "unknown batch id : {batch_id}" ) ) )?;
      if succeeded { job.record_completed() } else { job.record_failed() }
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    #[ test ]
    fn status_tracks_progress()
    {
      let job = BatchJob::new( 3 );
      job.record_completed().unwrap();
      job.record_failed().unwrap();
      let status = job.status();
      assert_eq!( status.completed, 1 );
      assert_eq!( status.failed, 1 );
      assert_eq!( status.remaining(), 1 );
      assert!( !status.is_done() );
    }

    #[ test ]
    fn over_reporting_rejected()
    {
      let job = BatchJob::new( 1 );
      job.record_completed().unwrap();
      assert!( job.record_completed().is_err() );
      assert!( job.record_failed().is_err() );
    }

    #[ test ]
    fn registry_round_trip()
    {
      let registry = BatchRegistry::new();
      registry.create( "batch-1", 2 );
      registry.record( "batch-1", true ).unwrap();
      registry.record( "batch-1", false ).unwrap();
      let status = registry.status( "batch-1" ).unwrap();
      assert!( status.is_done() );
    }

    #[ test ]
    fn unknown_batch_id_rejected()
    {
      let registry = BatchRegistry::new();
      assert!( registry.status( "missing" ).is_err() );
    }
  }
}

::mod_interface::mod_interface!
{
  exposed use private::BatchStatus;
  exposed use private::BatchJob;
  exposed use private::BatchRegistry;
}
