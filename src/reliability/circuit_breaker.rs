//! Per-provider circuit breaker (spec.md §4.6), generalizing the
//! teacher's single-endpoint breaker to one instance per provider id kept
//! in a [`CircuitBreakerRegistry`].

mod private
{
  use std::collections::{ HashMap, VecDeque };
  use std::sync::atomic::{ AtomicU32, Ordering };
  use std::sync::{ Arc, Mutex };
  use std::time::{ Duration, Instant };
  use crate::error::Error;

  #[ cfg( feature = "logging" ) ]
  use tracing::{ info, warn, debug };

  /// Circuit breaker configuration (spec.md §4.6).
  #[ derive( Debug, Clone ) ]
  pub struct CircuitBreakerConfig
  {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold : u32,
    /// How long the circuit stays open before probing again.
    pub open_timeout : Duration,
    /// Consecutive successes in `HalfOpen` needed to close the circuit.
    pub success_threshold : u32,
    /// Number of most recent outcomes kept for the failure-rate
    /// calculation (spec.md §4.6 default `W = 10`).
    pub sliding_window_size : usize,
    /// Failure fraction over the sliding window, once full, at or above
    /// which the circuit opens even without hitting `failure_threshold`
    /// consecutively (spec.md §4.6).
    pub failure_rate_threshold : f64,
    /// Maximum number of concurrent probe requests admitted while
    /// `HalfOpen` (spec.md §8 invariant 4 : half-open admits a bounded
    /// number of probes, not unlimited concurrent calls).
    pub half_open_permits : u32,
  }

  impl Default for CircuitBreakerConfig
  {
    fn default() -> Self
    {
      Self
      {
        failure_threshold : 5,
        open_timeout : Duration::from_secs( 60 ),
        success_threshold : 2,
        sliding_window_size : 10,
        failure_rate_threshold : 0.5,
        half_open_permits : 3,
      }
    }
  }

  /// Circuit breaker state (spec.md §4.6).
  #[ derive( Debug, Clone, Copy, PartialEq ) ]
  pub enum CircuitState
  {
    /// Requests pass through normally.
    Closed,
    /// Requests fail immediately until `open_timeout` elapses.
    Open( Instant ),
    /// Probing : a limited number of requests are allowed through.
    HalfOpen,
  }

  /// A single provider's circuit breaker.
  #[ derive( Debug ) ]
  pub struct CircuitBreaker
  {
    config : CircuitBreakerConfig,
    state : Mutex< CircuitState >,
    consecutive_failures : Mutex< u32 >,
    consecutive_successes : Mutex< u32 >,
    window : Mutex< VecDeque< bool > >,
    half_open_in_flight : AtomicU32,
  }

  impl CircuitBreaker
  {
    /// Construct a closed breaker with `config`.
    #[ must_use ]
    pub fn new( config : CircuitBreakerConfig ) -> Self
    {
      Self
      {
        config,
        state : Mutex::new( CircuitState::Closed ),
        consecutive_failures : Mutex::new( 0 ),
        consecutive_successes : Mutex::new( 0 ),
        window : Mutex::new( VecDeque::new() ),
        half_open_in_flight : AtomicU32::new( 0 ),
      }
    }

    /// Current state, transitioning `Open -> HalfOpen` if the timeout has
    /// elapsed.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn state( &self ) -> CircuitState
    {
      let mut state = self.state.lock().unwrap();
      if let CircuitState::Open( opened_at ) = *state
      {
        if opened_at.elapsed() >= self.config.open_timeout
        {
          *state = CircuitState::HalfOpen;

          #[ cfg( feature = "logging" ) ]
          info!( "circuit breaker transitioning to half-open" );
        }
      }
      *state
    }

    /// Whether a request should be allowed through right now. While
    /// `HalfOpen`, admits at most `config.half_open_permits` concurrent
    /// probes rather than every caller (spec.md §8 invariant 4); each
    /// granted probe must be followed by a matching [`CircuitBreaker::record_success`]
    /// or [`CircuitBreaker::record_failure`] to release its slot.
    #[ must_use ]
    pub fn should_allow_request( &self ) -> bool
    {
      match self.state()
      {
        CircuitState::Closed => true,
        CircuitState::Open( _ ) =>
        {
          #[ cfg( feature = "logging" ) ]
          debug!( "circuit breaker open, blocking request" );
          false
        }
        CircuitState::HalfOpen =>
        {
          let mut in_flight = self.half_open_in_flight.load( Ordering::SeqCst );
          loop
          {
            if in_flight >= self.config.half_open_permits
            {
              return false;
            }
            match self.half_open_in_flight.compare_exchange(
              in_flight, in_flight + 1, Ordering::SeqCst, Ordering::SeqCst,
            )
            {
              Ok( _ ) => return true,
              Err( observed ) => in_flight = observed,
            }
          }
        }
      }
    }

    /// Release a half-open probe slot acquired by [`CircuitBreaker::should_allow_request`]
    /// without otherwise touching breaker state. Callers that decide not
    /// to count an outcome toward the failure/success tally (e.g. an
    /// error outside [`is_circuit_breaker_error`]) must call this so the
    /// probe slot isn't leaked.
    pub fn release_probe_slot( &self )
    {
      self.release_half_open_permit();
    }

    fn release_half_open_permit( &self )
    {
      let _ = self.half_open_in_flight.fetch_update( Ordering::SeqCst, Ordering::SeqCst, | n | Some( n.saturating_sub( 1 ) ) );
    }

    fn record_window( &self, success : bool ) -> f64
    {
      let mut window = self.window.lock().unwrap();
      window.push_back( success );
      while window.len() > self.config.sliding_window_size
      {
        window.pop_front();
      }
      if window.len() < self.config.sliding_window_size || window.is_empty()
      {
        return 0.0;
      }
      #[ allow( clippy::cast_precision_loss ) ]
      let failed = window.iter().filter( | outcome | !**outcome ).count() as f64;
      #[ allow( clippy::cast_precision_loss ) ]
      ( failed / window.len() as f64 )
    }

    /// Record a successful call.
    ///
    /// # Panics
    ///
    /// Panics if an internal lock is poisoned.
    pub fn record_success( &self )
    {
      self.record_window( true );
      let mut state = self.state.lock().unwrap();
      let mut failures = self.consecutive_failures.lock().unwrap();
      let mut successes = self.consecutive_successes.lock().unwrap();

      *failures = 0;

      match *state
      {
        CircuitState::HalfOpen =>
        {
          self.release_half_open_permit();
          *successes += 1;
          if *successes >= self.config.success_threshold
          {
            *state = CircuitState::Closed;
            *successes = 0;
            self.half_open_in_flight.store( 0, Ordering::SeqCst );

            #[ cfg( feature = "logging" ) ]
            info!( "circuit breaker closed after recovery" );
          }
        }
        CircuitState::Closed => *successes = 0,
        CircuitState::Open( _ ) => {}
      }
    }

    /// Record a failed call.
    ///
    /// # Panics
    ///
    /// Panics if an internal lock is poisoned.
    pub fn record_failure( &self )
    {
      let failure_rate = self.record_window( false );
      let mut state = self.state.lock().unwrap();
      let mut failures = self.consecutive_failures.lock().unwrap();
      let mut successes = self.consecutive_successes.lock().unwrap();

      *failures += 1;
      *successes = 0;

      if matches!( *state, CircuitState::HalfOpen )
      {
        self.release_half_open_permit();
      }

      let should_open = *failures >= self.config.failure_threshold || failure_rate >= self.config.failure_rate_threshold;

      if should_open && !matches!( *state, CircuitState::Open( _ ) )
      {
        let now = Instant::now();
        *state = CircuitState::Open( now );
        self.half_open_in_flight.store( 0, Ordering::SeqCst );

        #[ cfg( feature = "logging" ) ]
        warn!( "circuit breaker opened after {} consecutive failures (window failure rate {:.2})", *failures, failure_rate );
      }
    }

    /// Force the circuit open immediately, regardless of recorded
    /// outcomes (spec.md §4.6 `TripOpen`). Used by operators or health
    /// checks that detect a provider outage through a channel other than
    /// the request path itself.
    ///
    /// # Panics
    ///
    /// Panics if an internal lock is poisoned.
    pub fn trip_open( &self )
    {
      *self.state.lock().unwrap() = CircuitState::Open( Instant::now() );
      self.half_open_in_flight.store( 0, Ordering::SeqCst );

      #[ cfg( feature = "logging" ) ]
      warn!( "circuit breaker force-opened" );
    }

    /// Force the circuit back to `Closed` and clear all recorded history
    /// (spec.md §4.6 `Reset`). Used by operators re-admitting a provider
    /// known to have recovered.
    ///
    /// # Panics
    ///
    /// Panics if an internal lock is poisoned.
    pub fn reset( &self )
    {
      *self.state.lock().unwrap() = CircuitState::Closed;
      *self.consecutive_failures.lock().unwrap() = 0;
      *self.consecutive_successes.lock().unwrap() = 0;
      self.window.lock().unwrap().clear();
      self.half_open_in_flight.store( 0, Ordering::SeqCst );

      #[ cfg( feature = "logging" ) ]
      info!( "circuit breaker reset to closed" );
    }
  }

  /// One breaker per provider id, created on first use (spec.md §4.6 :
  /// applied per provider).
  #[ derive( Default ) ]
  pub struct CircuitBreakerRegistry
  {
    config : CircuitBreakerConfig,
    breakers : Mutex< HashMap< String, Arc< CircuitBreaker > > >,
  }

  impl core::fmt::Debug for CircuitBreakerRegistry
  {
    fn fmt( &self, f : &mut core::fmt::Formatter< '_ > ) -> core::fmt::Result
    {
      f.debug_struct( "CircuitBreakerRegistry" ).finish()
    }
  }

  impl CircuitBreakerRegistry
  {
    /// Construct a registry applying `config` to every provider's
    /// breaker.
    #[ must_use ]
    pub fn new( config : CircuitBreakerConfig ) -> Self
    {
      Self { config, breakers : Mutex::new( HashMap::new() ) }
    }

    /// The breaker for `provider_id`, created lazily.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn breaker_for( &self, provider_id : &str ) -> Arc< CircuitBreaker >
    {
      let mut breakers = self.breakers.lock().unwrap();
      Arc::clone( breakers.entry( provider_id.to_string() )
        .or_insert_with( || Arc::new( CircuitBreaker::new( self.config.clone() ) ) ) )
    }

    /// Whether `provider_id`'s breaker is currently open (creates the
    /// breaker if it does not exist yet, defaulting to closed).
    #[ must_use ]
    pub fn is_open( &self, provider_id : &str ) -> bool
    {
      matches!( self.breaker_for( provider_id ).state(), CircuitState::Open( _ ) )
    }

    /// Force `provider_id`'s breaker open (spec.md §4.6 `TripOpen`).
    pub fn trip_open( &self, provider_id : &str )
    {
      self.breaker_for( provider_id ).trip_open();
    }

    /// Force `provider_id`'s breaker back to `Closed` (spec.md §4.6 `Reset`).
    pub fn reset( &self, provider_id : &str )
    {
      self.breaker_for( provider_id ).reset();
    }
  }

  /// Errors counted against the circuit breaker (spec.md §4.6 : upstream
  /// transient failures and timeouts, not validation/quota errors).
  #[ must_use ]
  pub fn is_circuit_breaker_error( error : &Error ) -> bool
  {
    matches!( error, Error::UpstreamTransient( _ ) | Error::Timeout( _ ) )
  }

  /// Run `operation` through `breaker`, short-circuiting with
  /// [`Error::CircuitOpen`] when the circuit is open and updating breaker
  /// state from the outcome.
  ///
  /// # Errors
  ///
  /// Returns [`Error::CircuitOpen`] without calling `operation` if the
  /// circuit is open; otherwise propagates `operation`'s error.
  pub async fn execute_with_circuit_breaker< T, F, Fut >(
    breaker : &CircuitBreaker,
    operation_name : &str,
    operation : F,
  ) -> Result< T, Error >
  where
    F : FnOnce() -> Fut,
    Fut : core::future::Future< Output = Result< T, Error > >,
  {
    if !breaker.should_allow_request()
    {
      return Err( Error::CircuitOpen { operation : operation_name.to_string(), retry_after_ms : 0 } );
    }

    match operation().await
    {
      Ok( value ) =>
      {
        breaker.record_success();
        Ok( value )
      }
      Err( error ) =>
      {
        if is_circuit_breaker_error( &error )
        {
          breaker.record_failure();
        }
        else
        {
          breaker.release_probe_slot();
        }
        Err( error )
      }
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    #[ test ]
    fn opens_after_failure_threshold()
    {
      let breaker = CircuitBreaker::new( CircuitBreakerConfig { failure_threshold : 3, ..CircuitBreakerConfig::default() } );
      for _ in 0..2
      {
        breaker.record_failure();
        assert!( breaker.should_allow_request() );
      }
      breaker.record_failure();
      assert!( !breaker.should_allow_request() );
    }

    #[ test ]
    fn half_open_closes_after_success_threshold()
    {
      let breaker = CircuitBreaker::new( CircuitBreakerConfig
      {
        failure_threshold : 1,
        open_timeout : Duration::from_millis( 0 ),
        success_threshold : 2,
      } );
      breaker.record_failure();
      assert_eq!( breaker.state(), CircuitState::HalfOpen );
      breaker.record_success();
      assert_eq!( breaker.state(), CircuitState::HalfOpen );
      breaker.record_success();
      assert_eq!( breaker.state(), CircuitState::Closed );
    }

    #[ test ]
    fn registry_creates_independent_breakers_per_provider()
    {
      let registry = CircuitBreakerRegistry::new( CircuitBreakerConfig { failure_threshold : 1, ..CircuitBreakerConfig::default() } );
      registry.breaker_for( "p1" ).record_failure();
      assert!( registry.is_open( "p1" ) );
      assert!( !registry.is_open( "p2" ) );
    }

    #[ tokio::test ]
    async fn execute_short_circuits_when_open()
    {
      let breaker = CircuitBreaker::new( CircuitBreakerConfig { failure_threshold : 1, ..CircuitBreakerConfig::default() } );
      breaker.record_failure();
      let result : Result< (), Error > = execute_with_circuit_breaker( &breaker, "op", || async { Ok( () ) } ).await;
      assert!( matches!( result, Err( Error::CircuitOpen { .. } ) ) );
    }

    #[ test ]
    fn failure_rate_over_a_full_window_opens_the_circuit_without_consecutive_failures()
    {
      let breaker = CircuitBreaker::new( CircuitBreakerConfig
      {
        failure_threshold : 100,
        sliding_window_size : 10,
        failure_rate_threshold : 0.5,
        ..CircuitBreakerConfig::default()
      } );
      for _ in 0..5
      {
        breaker.record_success();
        breaker.record_failure();
      }
      assert!( !breaker.should_allow_request() );
    }

    #[ test ]
    fn half_open_admits_no_more_than_configured_permits()
    {
      let breaker = CircuitBreaker::new( CircuitBreakerConfig
      {
        failure_threshold : 1,
        open_timeout : Duration::from_millis( 0 ),
        half_open_permits : 2,
        ..CircuitBreakerConfig::default()
      } );
      breaker.record_failure();
      assert_eq!( breaker.state(), CircuitState::HalfOpen );

      assert!( breaker.should_allow_request() );
      assert!( breaker.should_allow_request() );
      assert!( !breaker.should_allow_request(), "a third concurrent half-open probe must be refused" );
    }

    #[ test ]
    fn releasing_a_probe_slot_frees_room_for_another()
    {
      let breaker = CircuitBreaker::new( CircuitBreakerConfig
      {
        failure_threshold : 1,
        open_timeout : Duration::from_millis( 0 ),
        half_open_permits : 1,
        ..CircuitBreakerConfig::default()
      } );
      breaker.record_failure();
      assert!( breaker.should_allow_request() );
      assert!( !breaker.should_allow_request() );

      breaker.release_probe_slot();
      assert!( breaker.should_allow_request() );
    }

    #[ test ]
    fn trip_open_forces_the_circuit_open_from_closed()
    {
      let breaker = CircuitBreaker::new( CircuitBreakerConfig::default() );
      assert!( breaker.should_allow_request() );
      breaker.trip_open();
      assert!( !breaker.should_allow_request() );
    }

    #[ test ]
    fn reset_restores_a_tripped_breaker_to_closed()
    {
      let breaker = CircuitBreaker::new( CircuitBreakerConfig { failure_threshold : 1, ..CircuitBreakerConfig::default() } );
      breaker.record_failure();
      assert!( !breaker.should_allow_request() );

      breaker.reset();
      assert_eq!( breaker.state(), CircuitState::Closed );
      assert!( breaker.should_allow_request() );
    }

    #[ test ]
    fn registry_trip_open_and_reset_target_one_provider()
    {
      let registry = CircuitBreakerRegistry::new( CircuitBreakerConfig::default() );
      registry.trip_open( "p1" );
      assert!( registry.is_open( "p1" ) );
      assert!( !registry.is_open( "p2" ) );

      registry.reset( "p1" );
      assert!( !registry.is_open( "p1" ) );
    }
  }
}

::mod_interface::mod_interface!
{
  exposed use private::CircuitBreakerConfig;
  exposed use private::CircuitState;
  exposed use private::CircuitBreaker;
  exposed use private::CircuitBreakerRegistry;
  exposed use private::is_circuit_breaker_error;
  exposed use private::execute_with_circuit_breaker;
}
