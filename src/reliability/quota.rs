//! Quota enforcement (spec.md §4.6) : an atomic `check_and_increment`
//! per entity (tenant or provider), backed by either a token-bucket or a
//! sliding-window counter, generalized from the teacher's per-window
//! token buckets.

mod private
{
  use std::collections::HashMap;
  use std::collections::VecDeque;
  use std::sync::Mutex;
  use core::time::Duration;
  use std::time::Instant;
  use crate::error::Error;

  /// Which counting algorithm backs a [`QuotaPolicy`] (spec.md §4.6).
  #[ derive( Debug, Clone, Copy ) ]
  pub enum QuotaAlgorithm
  {
    /// Smooth refill at a constant rate, allowing short bursts up to
    /// capacity.
    TokenBucket,
    /// Exact count of events in the trailing window, no bursting past
    /// the limit.
    SlidingWindow,
  }

  /// Quota policy for one entity class (spec.md §4.6 : per-tenant and
  /// per-provider quotas share this shape).
  #[ derive( Debug, Clone, Copy ) ]
  pub struct QuotaPolicy
  {
    /// Counting algorithm.
    pub algorithm : QuotaAlgorithm,
    /// Maximum requests allowed per `period`.
    pub limit : u32,
    /// The reset period (spec.md §4.6 : per-entity reset periods).
    pub period : Duration,
  }

  impl Default for QuotaPolicy
  {
    fn default() -> Self
    {
      Self { algorithm : QuotaAlgorithm::TokenBucket, limit : 100, period : Duration::from_secs( 60 ) }
    }
  }

  enum Counter
  {
    TokenBucket { tokens : f64, last_refill : Instant },
    SlidingWindow { events : VecDeque< Instant > },
  }

  /// Tracks quota state for every entity sharing a [`QuotaPolicy`].
  pub struct QuotaManager
  {
    policy : QuotaPolicy,
    counters : Mutex< HashMap< String, Counter > >,
  }

  impl core::fmt::Debug for QuotaManager
  {
    fn fmt( &self, f : &mut core::fmt::Formatter< '_ > ) -> core::fmt::Result
    {
      f.debug_struct( "QuotaManager" ).field( "policy", &self.policy ).finish()
    }
  }

  impl QuotaManager
  {
    /// Construct a manager enforcing `policy` uniformly across entities.
    #[ must_use ]
    pub fn new( policy : QuotaPolicy ) -> Self
    {
      Self { policy, counters : Mutex::new( HashMap::new() ) }
    }

    /// Atomically check whether `entity_id` has remaining quota and, if
    /// so, consume one unit (spec.md §4.6 : `CheckAndIncrement` is a
    /// single atomic operation, not a check followed by a separate
    /// increment).
    ///
    /// # Errors
    ///
    /// Returns [`Error::QuotaExceeded`] if the entity has no remaining
    /// quota this period.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn check_and_increment( &self, entity_id : &str ) -> Result< (), Error >
    {
      let mut counters = self.counters.lock().unwrap();
      let counter = counters.entry( entity_id.to_string() ).or_insert_with( || self.fresh_counter() );

      let allowed = match ( &mut *counter, self.policy.algorithm )
      {
        ( Counter::TokenBucket { tokens, last_refill }, QuotaAlgorithm::TokenBucket ) =>
        {
          let now = Instant::now();
          let elapsed = now.duration_since( *last_refill ).as_secs_f64();
          let refill_rate = f64::from( self.policy.limit ) / self.policy.period.as_secs_f64();
          *tokens = ( *tokens + elapsed * refill_rate ).min( f64::from( self.policy.limit ) );
          *last_refill = now;

          if *tokens >= 1.0
          {
            *tokens -= 1.0;
            true
          }
          else
          {
            false
          }
        }
        ( Counter::SlidingWindow { events }, QuotaAlgorithm::SlidingWindow ) =>
        {
          let now = Instant::now();
          while events.front().is_some_and( | at | now.duration_since( *at ) >= self.policy.period )
          {
            events.pop_front();
          }

          if events.len() < self.policy.limit as usize
          {
            events.push_back( now );
            true
          }
          else
          {
            false
          }
        }
        _ => unreachable!( "counter variant always matches the manager's configured algorithm" ),
      };

      if allowed
      {
        Ok( () )
      }
      else
      {
        Err( Error::QuotaExceeded( entity_id.to_string() ) )
      }
    }

    /// Reset `entity_id`'s quota to full capacity.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn reset( &self, entity_id : &str )
    {
      self.counters.lock().unwrap().insert( entity_id.to_string(), self.fresh_counter() );
    }

    fn fresh_counter( &self ) -> Counter
    {
      match self.policy.algorithm
      {
        QuotaAlgorithm::TokenBucket => Counter::TokenBucket { tokens : f64::from( self.policy.limit ), last_refill : Instant::now() },
        QuotaAlgorithm::SlidingWindow => Counter::SlidingWindow { events : VecDeque::new() },
      }
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    #[ test ]
    fn token_bucket_rejects_past_limit()
    {
      let manager = QuotaManager::new( QuotaPolicy { algorithm : QuotaAlgorithm::TokenBucket, limit : 2, period : Duration::from_secs( 60 ) } );
      assert!( manager.check_and_increment( "tenant-a" ).is_ok() );
      assert!( manager.check_and_increment( "tenant-a" ).is_ok() );
      assert!( manager.check_and_increment( "tenant-a" ).is_err() );
    }

    #[ test ]
    fn sliding_window_rejects_past_limit()
    {
      let manager = QuotaManager::new( QuotaPolicy { algorithm : QuotaAlgorithm::SlidingWindow, limit : 2, period : Duration::from_secs( 60 ) } );
      assert!( manager.check_and_increment( "tenant-a" ).is_ok() );
      assert!( manager.check_and_increment( "tenant-a" ).is_ok() );
      assert!( manager.check_and_increment( "tenant-a" ).is_err() );
    }

    #[ test ]
    fn entities_tracked_independently()
    {
      let manager = QuotaManager::new( QuotaPolicy { algorithm : QuotaAlgorithm::TokenBucket, limit : 1, period : Duration::from_secs( 60 ) } );
      assert!( manager.check_and_increment( "tenant-a" ).is_ok() );
      assert!( manager.check_and_increment( "tenant-b" ).is_ok() );
      assert!( manager.check_and_increment( "tenant-a" ).is_err() );
    }

    #[ test ]
    fn reset_restores_full_capacity()
    {
      let manager = QuotaManager::new( QuotaPolicy { algorithm : QuotaAlgorithm::TokenBucket, limit : 1, period : Duration::from_secs( 60 ) } );
      manager.check_and_increment( "tenant-a" ).unwrap();
      assert!( manager.check_and_increment( "tenant-a" ).is_err() );
      manager.reset( "tenant-a" );
      assert!( manager.check_and_increment( "tenant-a" ).is_ok() );
    }
  }
}

::mod_interface::mod_interface!
{
  exposed use private::QuotaAlgorithm;
  exposed use private::QuotaPolicy;
  exposed use private::QuotaManager;
}
