//! Runtime metrics cache (spec.md §2 component 6, Design Notes §5) :
//! rolling P95 latency, 5-minute error rate, and current in-flight load
//! per `(provider, model)`, feeding the router's live signals rather than
//! the hardcoded `load_fraction : 0.0` the initial pass shipped with.
//! Writes are append-only per key; reads snapshot the current sample set
//! under a short-lived lock (spec.md : "writes are append-only into a
//! ring, reads are snapshot-consistent").

mod private
{
  use std::collections::HashMap;
  use std::sync::atomic::{ AtomicI64, Ordering };
  use std::sync::{ Arc, Mutex, RwLock };
  use std::time::Instant;
  use core::time::Duration;

  struct Sample
  {
    at : Instant,
    duration : Duration,
    success : bool,
  }

  #[ derive( Default ) ]
  struct WindowEntry
  {
    in_flight : AtomicI64,
    samples : Mutex< Vec< Sample > >,
  }

  type Key = ( String, String );

  /// Caches rolling per-`(provider_id, model_id)` call outcomes.
  ///
  /// `window` bounds how far back a latency/error-rate read looks
  /// (spec.md §4.3 : "5-min rolling error rate buckets" — default 5
  /// minutes); `assumed_capacity` is the in-flight count treated as
  /// `load_fraction == 1.0`, since this crate has no separate concept of
  /// a per-provider concurrency limit to divide by.
  pub struct RuntimeMetricsCache
  {
    entries : RwLock< HashMap< Key, Arc< WindowEntry > > >,
    window : Duration,
    assumed_capacity : u32,
  }

  impl core::fmt::Debug for RuntimeMetricsCache
  {
    fn fmt( &self, f : &mut core::fmt::Formatter< '_ > ) -> core::fmt::Result
    {
      f.debug_struct( "RuntimeMetricsCache" ).field( "window", &self.window ).finish()
    }
  }

  impl Default for RuntimeMetricsCache
  {
    fn default() -> Self
    {
      Self::new( Duration::from_secs( 300 ), 8 )
    }
  }

  /// Releases the in-flight slot acquired by [`RuntimeMetricsCache::enter`]
  /// when dropped, so a panicking or cancelled call never leaks load.
  pub struct CallGuard
  {
    entry : Arc< WindowEntry >,
  }

  impl Drop for CallGuard
  {
    fn drop( &mut self )
    {
      self.entry.in_flight.fetch_sub( 1, Ordering::SeqCst );
    }
  }

  impl RuntimeMetricsCache
  {
    /// Construct a cache with an explicit rolling `window` and
    /// `assumed_capacity`.
    #[ must_use ]
    pub fn new( window : Duration, assumed_capacity : u32 ) -> Self
    {
      Self { entries : RwLock::new( HashMap::new() ), window, assumed_capacity : assumed_capacity.max( 1 ) }
    }

    fn entry_for( &self, provider_id : &str, model_id : &str ) -> Arc< WindowEntry >
    {
      let key = ( provider_id.to_string(), model_id.to_string() );
      if let Some( entry ) = self.entries.read().unwrap().get( &key )
      {
        return Arc::clone( entry );
      }
      let mut entries = self.entries.write().unwrap();
      Arc::clone( entries.entry( key ).or_insert_with( || Arc::new( WindowEntry::default() ) ) )
    }

    /// Mark one call to `(provider_id, model_id)` as started, incrementing
    /// its in-flight count until the returned guard drops.
    #[ must_use ]
    pub fn enter( &self, provider_id : &str, model_id : &str ) -> CallGuard
    {
      let entry = self.entry_for( provider_id, model_id );
      entry.in_flight.fetch_add( 1, Ordering::SeqCst );
      CallGuard { entry }
    }

    /// Record one completed call's outcome, pruning samples older than
    /// `window`.
    ///
    /// # Panics
    ///
    /// Panics if an internal lock is poisoned.
    pub fn record_completion( &self, provider_id : &str, model_id : &str, duration : Duration, success : bool )
    {
      let entry = self.entry_for( provider_id, model_id );
      let mut samples = entry.samples.lock().unwrap();
      samples.push( Sample { at : Instant::now(), duration, success } );
      let window = self.window;
      samples.retain( | sample | sample.at.elapsed() < window );
    }

    /// Current in-flight load as a fraction of `assumed_capacity`,
    /// clamped to `[0, 1]` (spec.md §4.3 `load_fraction`).
    ///
    /// # Panics
    ///
    /// Panics if an internal lock is poisoned.
    #[ must_use ]
    pub fn load_fraction( &self, provider_id : &str, model_id : &str ) -> f64
    {
      let entry = self.entry_for( provider_id, model_id );
      let in_flight = entry.in_flight.load( Ordering::SeqCst ).max( 0 ) as f64;
      ( in_flight / f64::from( self.assumed_capacity ) ).clamp( 0.0, 1.0 )
    }

    /// Fraction of calls within the rolling window that failed, or `None`
    /// if no calls have been recorded yet (spec.md §4.3 : "0 if no data").
    ///
    /// # Panics
    ///
    /// Panics if an internal lock is poisoned.
    #[ must_use ]
    pub fn error_rate( &self, provider_id : &str, model_id : &str ) -> Option< f64 >
    {
      let entry = self.entry_for( provider_id, model_id );
      let samples = entry.samples.lock().unwrap();
      if samples.is_empty()
      {
        return None;
      }
      #[ allow( clippy::cast_precision_loss ) ]
      let failed = samples.iter().filter( | sample | !sample.success ).count() as f64;
      #[ allow( clippy::cast_precision_loss ) ]
      Some( failed / samples.len() as f64 )
    }

    /// P95 latency across the rolling window, or `None` if no calls have
    /// been recorded yet.
    ///
    /// # Panics
    ///
    /// Panics if an internal lock is poisoned.
    #[ must_use ]
    pub fn p95_latency( &self, provider_id : &str, model_id : &str ) -> Option< Duration >
    {
      let entry = self.entry_for( provider_id, model_id );
      let samples = entry.samples.lock().unwrap();
      if samples.is_empty()
      {
        return None;
      }
      let mut durations : Vec< Duration > = samples.iter().map( | sample | sample.duration ).collect();
      durations.sort();
      #[ allow( clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss ) ]
      let index = ( ( durations.len() as f64 ) * 0.95 ).ceil() as usize;
      Some( durations[ index.min( durations.len() - 1 ).saturating_sub( if index == 0 { 0 } else { 1 } ) ] )
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    #[ test ]
    fn no_samples_reports_no_data()
    {
      let cache = RuntimeMetricsCache::default();
      assert_eq!( cache.error_rate( "p1", "m1" ), None );
      assert_eq!( cache.p95_latency( "p1", "m1" ), None );
      assert_eq!( cache.load_fraction( "p1", "m1" ), 0.0 );
    }

    #[ test ]
    fn enter_raises_load_and_drop_releases_it()
    {
      let cache = RuntimeMetricsCache::new( Duration::from_secs( 60 ), 2 );
      let guard = cache.enter( "p1", "m1" );
      assert!( ( cache.load_fraction( "p1", "m1" ) - 0.5 ).abs() < f64::EPSILON );
      drop( guard );
      assert_eq!( cache.load_fraction( "p1", "m1" ), 0.0 );
    }

    #[ test ]
    fn error_rate_reflects_recorded_failures()
    {
      let cache = RuntimeMetricsCache::default();
      cache.record_completion( "p1", "m1", Duration::from_millis( 10 ), true );
      cache.record_completion( "p1", "m1", Duration::from_millis( 10 ), false );
      cache.record_completion( "p1", "m1", Duration::from_millis( 10 ), false );
      assert!( ( cache.error_rate( "p1", "m1" ).unwrap() - ( 2.0 / 3.0 ) ).abs() < f64::EPSILON );
    }

    #[ test ]
    fn p95_latency_is_near_the_top_of_the_distribution()
    {
      let cache = RuntimeMetricsCache::default();
      for millis in 1..=100u64
      {
        cache.record_completion( "p1", "m1", Duration::from_millis( millis ), true );
      }
      let p95 = cache.p95_latency( "p1", "m1" ).unwrap();
      assert!( p95 >= Duration::from_millis( 94 ) && p95 <= Duration::from_millis( 100 ) );
    }

    #[ test ]
    fn samples_outside_the_window_are_pruned_on_read()
    {
      let cache = RuntimeMetricsCache::new( Duration::from_millis( 10 ), 8 );
      cache.record_completion( "p1", "m1", Duration::from_millis( 1 ), false );
      std::thread::sleep( Duration::from_millis( 30 ) );
      cache.record_completion( "p1", "m1", Duration::from_millis( 1 ), true );
      assert_eq!( cache.error_rate( "p1", "m1" ), Some( 0.0 ) );
    }

    #[ test ]
    fn distinct_provider_model_pairs_are_tracked_independently()
    {
      let cache = RuntimeMetricsCache::default();
      cache.record_completion( "p1", "m1", Duration::from_millis( 1 ), false );
      assert_eq!( cache.error_rate( "p1", "m1" ), Some( 1.0 ) );
      assert_eq!( cache.error_rate( "p1", "m2" ), None );
      assert_eq!( cache.error_rate( "p2", "m1" ), None );
    }
  }
}

::mod_interface::mod_interface!
{
  exposed use private::RuntimeMetricsCache;
  exposed use private::CallGuard;
}
