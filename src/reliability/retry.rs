//! Retry with exponential backoff and jitter (spec.md §4.6), generalized
//! from per-HTTP-call retries to retrying a phase/provider-dispatch
//! closure against the gateway's own closed error taxonomy.

mod private
{
  use core::time::Duration;
  use std::time::Instant;
  use rand::Rng;
  use crate::error::Error;

  #[ cfg( feature = "logging" ) ]
  use tracing::{ debug, warn };

  /// Retry configuration (spec.md §4.6).
  #[ derive( Debug, Clone ) ]
  pub struct RetryConfig
  {
    /// Maximum retry attempts, not counting the first try.
    pub max_retries : u32,
    /// Base delay for the first retry.
    pub base_delay : Duration,
    /// Ceiling applied to the computed delay.
    pub max_delay : Duration,
    /// Exponential backoff multiplier.
    pub backoff_multiplier : f64,
    /// Whether to add up-to-50% random jitter to each delay.
    pub enable_jitter : bool,
    /// Ceiling on total elapsed time across all attempts.
    pub max_elapsed_time : Option< Duration >,
  }

  impl Default for RetryConfig
  {
    fn default() -> Self
    {
      Self
      {
        max_retries : 3,
        base_delay : Duration::from_millis( 200 ),
        max_delay : Duration::from_secs( 10 ),
        backoff_multiplier : 2.0,
        enable_jitter : true,
        max_elapsed_time : Some( Duration::from_secs( 60 ) ),
      }
    }
  }

  /// Whether `error` is worth retrying at all (spec.md §7 closed
  /// taxonomy's `retryable()` accessor, reused here directly).
  #[ must_use ]
  #[ inline ]
  pub fn is_retryable_error( error : &Error ) -> bool
  {
    error.retryable()
  }

  /// Exponential backoff with optional jitter, capped at `max_delay`
  /// (spec.md §4.6).
  #[ must_use ]
  pub fn calculate_retry_delay( attempt : u32, config : &RetryConfig ) -> Duration
  {
    let base_delay_ms = config.base_delay.as_millis() as f64;
    let backoff_delay_ms = base_delay_ms * config.backoff_multiplier.powi( ( attempt.max( 1 ) - 1 ) as i32 );

    let mut delay_ms = backoff_delay_ms as u64;

    if config.enable_jitter && delay_ms > 0
    {
      let jitter_range = delay_ms / 2;
      let jitter = rand::rng().random_range( 0..=jitter_range );
      delay_ms += jitter;
    }

    let max_delay_ms = config.max_delay.as_millis() as u64;
    Duration::from_millis( delay_ms.min( max_delay_ms ) )
  }

  /// Run `operation`, retrying on retryable errors per `config` until
  /// attempts or elapsed time are exhausted (spec.md §4.6).
  ///
  /// # Errors
  ///
  /// Returns the last error once retries are exhausted, or immediately
  /// once a non-retryable error is observed.
  pub async fn execute_with_retries< T, F, Fut >( config : &RetryConfig, mut operation : F ) -> Result< T, Error >
  where
    F : FnMut( u32 ) -> Fut,
    Fut : core::future::Future< Output = Result< T, Error > >,
  {
    let start_time = Instant::now();
    let mut attempt = 1u32;

    loop
    {
      match operation( attempt ).await
      {
        Ok( value ) =>
        {
          #[ cfg( feature = "logging" ) ]
          if attempt > 1
          {
            debug!( attempt, "request succeeded after retries" );
          }
          return Ok( value );
        }
        Err( error ) =>
        {
          if !is_retryable_error( &error )
          {
            #[ cfg( feature = "logging" ) ]
            debug!( %error, "non-retryable error encountered" );
            return Err( error );
          }

          if attempt > config.max_retries
          {
            #[ cfg( feature = "logging" ) ]
            warn!( max_retries = config.max_retries, "max retry attempts exceeded" );
            return Err( error );
          }

          if let Some( max_elapsed ) = config.max_elapsed_time
          {
            if start_time.elapsed() >= max_elapsed
            {
              #[ cfg( feature = "logging" ) ]
              warn!( elapsed_ms = start_time.elapsed().as_millis() as u64, "max elapsed time exceeded" );
              return Err( error );
            }
          }

          let delay = calculate_retry_delay( attempt, config );

          #[ cfg( feature = "logging" ) ]
          debug!( attempt, delay_ms = delay.as_millis() as u64, %error, "retrying after delay" );

          tokio::time::sleep( delay ).await;
          attempt += 1;
        }
      }
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;
    use std::sync::atomic::{ AtomicU32, Ordering };

    #[ test ]
    fn delay_grows_exponentially_without_jitter()
    {
      let config = RetryConfig { enable_jitter : false, base_delay : Duration::from_millis( 100 ), backoff_multiplier : 2.0, max_delay : Duration::from_secs( 10 ), ..RetryConfig::default() };
      assert_eq!( calculate_retry_delay( 1, &config ), Duration::from_millis( 100 ) );
      assert_eq!( calculate_retry_delay( 2, &config ), Duration::from_millis( 200 ) );
      assert_eq!( calculate_retry_delay( 3, &config ), Duration::from_millis( 400 ) );
    }

    #[ test ]
    fn delay_capped_at_max_delay()
    {
      let config = RetryConfig { enable_jitter : false, base_delay : Duration::from_millis( 100 ), backoff_multiplier : 10.0, max_delay : Duration::from_millis( 500 ), ..RetryConfig::default() };
      assert_eq!( calculate_retry_delay( 5, &config ), Duration::from_millis( 500 ) );
    }

    #[ tokio::test ]
    async fn retries_until_success()
    {
      let attempts = AtomicU32::new( 0 );
      let config = RetryConfig { base_delay : Duration::from_millis( 1 ), max_elapsed_time : None, ..RetryConfig::default() };

      let result : Result< u32, Error > = execute_with_retries( &config, | attempt |
      {
        attempts.fetch_add( 1, Ordering::SeqCst );
        async move
        {
          if attempt < 3
          {
            Err( Error::UpstreamTransient( "transient".to_string() ) )
          }
          else
          {
            Ok( attempt )
          }
        }
      } ).await;

      assert_eq!( result.unwrap(), 3 );
      assert_eq!( attempts.load( Ordering::SeqCst ), 3 );
    }

    #[ tokio::test ]
    async fn non_retryable_error_returns_immediately()
    {
      let attempts = AtomicU32::new( 0 );
      let config = RetryConfig::default();

      let result : Result< (), Error > = execute_with_retries( &config, | _attempt |
      {
        attempts.fetch_add( 1, Ordering::SeqCst );
        async { Err( Error::ValidationError( "bad request".to_string() ) ) }
      } ).await;

      assert!( result.is_err() );
      assert_eq!( attempts.load( Ordering::SeqCst ), 1 );
    }

    #[ tokio::test ]
    async fn exhausts_max_retries()
    {
      let attempts = AtomicU32::new( 0 );
      let config = RetryConfig { max_retries : 2, base_delay : Duration::from_millis( 1 ), max_elapsed_time : None, ..RetryConfig::default() };

      let result : Result< (), Error > = execute_with_retries( &config, | _attempt |
      {
        attempts.fetch_add( 1, Ordering::SeqCst );
        async { Err( Error::UpstreamTransient( "still down".to_string() ) ) }
      } ).await;

      assert!( result.is_err() );
      assert_eq!( attempts.load( Ordering::SeqCst ), 3 );
    }
  }
}

::mod_interface::mod_interface!
{
  exposed use private::RetryConfig;
  exposed use private::is_retryable_error;
  exposed use private::calculate_retry_delay;
  exposed use private::execute_with_retries;
}
