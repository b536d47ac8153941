//! Warm-pool session manager (spec.md §4.8) : a semaphore-bounded pool of
//! [`RunnerSession`]s per model, LIFO reuse of idle sessions, and
//! maintenance-driven idle eviction — generalized from the worker-pool
//! architecture other production candle-based runners use to keep models
//! resident in memory rather than reloading per request.

mod private
{
  use std::collections::HashMap;
  use std::sync::atomic::{ AtomicBool, Ordering };
  use std::sync::Arc;
  use std::time::Instant;
  use core::time::Duration;
  use tokio::sync::{ Mutex, Semaphore };
  use crate::error::Error;
  use crate::manifest::ModelManifest;
  use crate::session::runner::RunnerSession;

  #[ cfg( feature = "logging" ) ]
  use tracing::{ debug, info };

  /// Session pool configuration (spec.md §4.8).
  #[ derive( Debug, Clone ) ]
  pub struct SessionPoolConfig
  {
    /// Maximum concurrently-held sessions per model key.
    pub max_sessions_per_key : usize,
    /// How long an idle session may sit before the maintenance sweep
    /// evicts it.
    pub max_idle : Duration,
    /// Idle sessions per key the maintenance sweep never evicts below,
    /// even when they have sat longer than `max_idle` (spec.md §3/§4.5 :
    /// the pool is a `(minSize, maxSize, idleTimeout)` contract, not just
    /// a ceiling). Defaults to `0`, matching the ceiling-only behavior
    /// this pool shipped with before a floor was added.
    pub min_sessions_per_key : usize,
  }

  impl Default for SessionPoolConfig
  {
    fn default() -> Self
    {
      Self { max_sessions_per_key : 4, max_idle : Duration::from_secs( 300 ), min_sessions_per_key : 0 }
    }
  }

  struct IdleSession
  {
    session : Arc< dyn RunnerSession >,
    idle_since : Instant,
  }

  struct KeyState
  {
    semaphore : Arc< Semaphore >,
    idle : Vec< IdleSession >,
  }

  /// A session checked out of the pool; dropping it returns the session
  /// to the idle stack rather than tearing it down.
  pub struct SessionGuard
  {
    pool : Arc< SessionPoolInner >,
    key : String,
    session : Option< Arc< dyn RunnerSession > >,
    _permit : tokio::sync::OwnedSemaphorePermit,
  }

  impl core::ops::Deref for SessionGuard
  {
    type Target = dyn RunnerSession;

    fn deref( &self ) -> &Self::Target
    {
      self.session.as_deref().expect( "session present until drop" )
    }
  }

  impl Drop for SessionGuard
  {
    fn drop( &mut self )
    {
      if let Some( session ) = self.session.take()
      {
        self.pool.return_session( &self.key, session );
      }
    }
  }

  struct SessionPoolInner
  {
    config : SessionPoolConfig,
    keys : Mutex< HashMap< String, KeyState > >,
    shutdown : AtomicBool,
  }

  impl SessionPoolInner
  {
    fn return_session( &self, key : &str, session : Arc< dyn RunnerSession > )
    {
      if self.shutdown.load( Ordering::SeqCst )
      {
        session.close();
        return;
      }
      if let Ok( mut keys ) = self.keys.try_lock()
      {
        if let Some( state ) = keys.get_mut( key )
        {
          state.idle.push( IdleSession { session, idle_since : Instant::now() } );
        }
      }
    }
  }

  /// Warm pool of [`RunnerSession`]s, one sub-pool per model key
  /// (typically `"{tenant_id}:{model_id}:{device}"`).
  pub struct SessionPool< F >
  where
    F : Fn( &ModelManifest, &str ) -> Result< Arc< dyn RunnerSession >, Error > + Send + Sync,
  {
    inner : Arc< SessionPoolInner >,
    factory : F,
  }

  impl< F > core::fmt::Debug for SessionPool< F >
  where
    F : Fn( &ModelManifest, &str ) -> Result< Arc< dyn RunnerSession >, Error > + Send + Sync,
  {
    fn fmt( &self, f : &mut core::fmt::Formatter< '_ > ) -> core::fmt::Result
    {
      f.debug_struct( "SessionPool" ).finish()
    }
  }

  impl< F > SessionPool< F >
  where
    F : Fn( &ModelManifest, &str ) -> Result< Arc< dyn RunnerSession >, Error > + Send + Sync,
  {
    /// Construct a pool creating fresh sessions via `factory` on cold
    /// start.
    #[ must_use ]
    pub fn new( config : SessionPoolConfig, factory : F ) -> Self
    {
      Self { inner : Arc::new( SessionPoolInner { config, keys : Mutex::new( HashMap::new() ), shutdown : AtomicBool::new( false ) } ), factory }
    }

    /// Acquire a session for `(manifest, device)`, reusing an idle
    /// session (LIFO) if one is available or constructing a fresh one if
    /// the per-key concurrency limit allows.
    ///
    /// # Errors
    ///
    /// Propagates [`Error`] from the session factory, or
    /// [`Error::InternalError`] if the pool has been shut down.
    pub async fn acquire( &self, manifest : &ModelManifest, device : &str ) -> Result< SessionGuard, Error >
    {
      if self.inner.shutdown.load( Ordering::SeqCst )
      {
        return Err( Error::InternalError( "session pool is shut down".to_string() ) );
      }

      let key = format!( "{}:{}:{device}", manifest.tenant_id, manifest.model_id );

      let semaphore = {
        let mut keys = self.inner.keys.lock().await;
        Arc::clone( &keys.entry( key.clone() )
          .or_insert_with( || KeyState { semaphore : Arc::new( Semaphore::new( self.inner.config.max_sessions_per_key ) ), idle : Vec::new() } )
          .semaphore )
      };

      let permit = Arc::clone( &semaphore ).acquire_owned().await
        .map_err( | _ | Error::InternalError( "session pool semaphore closed".to_string() ) )?;

      let reused = {
        let mut keys = self.inner.keys.lock().await;
        keys.get_mut( &key ).and_then( | state | state.idle.pop() )
      };

      let session = match reused
      {
        Some( idle ) =>
        {
          #[ cfg( feature = "logging" ) ]
          debug!( key = %key, "reused idle session" );
          idle.session
        }
        None =>
        {
          #[ cfg( feature = "logging" ) ]
          debug!( key = %key, "spawning fresh session (cold start)" );
          ( self.factory )( manifest, device )?
        }
      };

      Ok( SessionGuard { pool : Arc::clone( &self.inner ), key, session : Some( session ), _permit : permit } )
    }

    /// Evict idle sessions that have sat longer than `max_idle`,
    /// oldest-eviction-first within each key, but never below
    /// `min_sessions_per_key` (spec.md §4.5). Intended to run
    /// periodically from a maintenance task (spec.md §4.8).
    pub async fn evict_idle( &self )
    {
      let mut keys = self.inner.keys.lock().await;
      let max_idle = self.inner.config.max_idle;
      let min_size = self.inner.config.min_sessions_per_key;

      for ( _key, state ) in keys.iter_mut()
      {
        let before = state.idle.len();
        let mut evicted = Vec::new();
        let mut index = 0;

        while index < state.idle.len() && state.idle.len() > min_size
        {
          if state.idle[ index ].idle_since.elapsed() >= max_idle
          {
            evicted.push( state.idle.remove( index ) );
          }
          else
          {
            index += 1;
          }
        }

        for entry in evicted
        {
          entry.session.close();
        }

        #[ cfg( feature = "logging" ) ]
        if state.idle.len() < before
        {
          info!( evicted = before - state.idle.len(), "evicted idle sessions" );
        }
      }
    }

    /// Total idle sessions currently held across all keys, for tests and
    /// diagnostics.
    pub async fn idle_count( &self ) -> usize
    {
      self.inner.keys.lock().await.values().map( | state | state.idle.len() ).sum()
    }

    /// Close every session in the pool (spec.md §4.8 : "Shutdown closes
    /// every session; semaphore permits are not reused across shutdown").
    /// Closes every currently-idle session and every key's semaphore, so
    /// any acquire blocked on a permit wakes with an error rather than a
    /// session, and sessions returned by in-flight [`SessionGuard`]s after
    /// this call are closed immediately instead of re-pooled.
    ///
    /// Idempotent: calling this more than once is a no-op after the first.
    pub async fn shutdown( &self )
    {
      self.inner.shutdown.store( true, Ordering::SeqCst );
      let mut keys = self.inner.keys.lock().await;
      for ( _key, state ) in keys.iter_mut()
      {
        for idle in state.idle.drain( .. )
        {
          idle.session.close();
        }
        state.semaphore.close();
      }

      #[ cfg( feature = "logging" ) ]
      info!( keys = keys.len(), "session pool shut down" );
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;
    use crate::session::runner::InMemoryRunnerSession;
    use std::collections::HashMap as StdHashMap;

    fn sample_manifest() -> ModelManifest
    {
      ModelManifest
      {
        model_id : "m1".into(),
        tenant_id : "default".into(),
        name : "Model One".into(),
        version : "1".into(),
        artifacts : StdHashMap::new(),
        supported_devices : vec![ "cpu".to_string() ],
        resource_requirements : Default::default(),
        provider_tag : None,
        metadata : StdHashMap::new(),
      }
    }

    fn factory( manifest : &ModelManifest, device : &str ) -> Result< Arc< dyn RunnerSession >, Error >
    {
      Ok( Arc::new( InMemoryRunnerSession::new( manifest, device ) ) )
    }

    #[ tokio::test ]
    async fn acquire_reuses_returned_session()
    {
      let pool = SessionPool::new( SessionPoolConfig::default(), factory );
      let manifest = sample_manifest();

      {
        let _guard = pool.acquire( &manifest, "cpu" ).await.unwrap();
      }
      assert_eq!( pool.idle_count().await, 1 );

      let _guard = pool.acquire( &manifest, "cpu" ).await.unwrap();
      assert_eq!( pool.idle_count().await, 0 );
    }

    #[ tokio::test ]
    async fn concurrency_bounded_by_max_sessions_per_key()
    {
      let pool = SessionPool::new( SessionPoolConfig { max_sessions_per_key : 1, ..SessionPoolConfig::default() }, factory );
      let manifest = sample_manifest();

      let guard = pool.acquire( &manifest, "cpu" ).await.unwrap();
      let second = tokio::time::timeout( Duration::from_millis( 50 ), pool.acquire( &manifest, "cpu" ) ).await;
      assert!( second.is_err(), "second acquire should block while the only permit is held" );
      drop( guard );
    }

    #[ tokio::test ]
    async fn evict_idle_removes_stale_sessions()
    {
      let pool = SessionPool::new( SessionPoolConfig { max_idle : Duration::from_millis( 10 ), ..SessionPoolConfig::default() }, factory );
      let manifest = sample_manifest();
      { let _guard = pool.acquire( &manifest, "cpu" ).await.unwrap(); }
      assert_eq!( pool.idle_count().await, 1 );

      tokio::time::sleep( Duration::from_millis( 30 ) ).await;
      pool.evict_idle().await;
      assert_eq!( pool.idle_count().await, 0 );
    }

    #[ tokio::test ]
    async fn evict_idle_respects_the_minimum_floor()
    {
      let pool = SessionPool::new(
        SessionPoolConfig { max_sessions_per_key : 3, max_idle : Duration::from_millis( 10 ), min_sessions_per_key : 2 },
        factory,
      );
      let manifest = sample_manifest();
      let guards = vec!
      [
        pool.acquire( &manifest, "cpu" ).await.unwrap(),
        pool.acquire( &manifest, "cpu" ).await.unwrap(),
        pool.acquire( &manifest, "cpu" ).await.unwrap(),
      ];
      drop( guards );
      assert_eq!( pool.idle_count().await, 3 );

      tokio::time::sleep( Duration::from_millis( 30 ) ).await;
      pool.evict_idle().await;
      assert_eq!( pool.idle_count().await, 2, "eviction must not drop below min_sessions_per_key" );
    }

    #[ tokio::test ]
    async fn shutdown_closes_idle_sessions_and_rejects_further_acquires()
    {
      let pool = SessionPool::new( SessionPoolConfig::default(), factory );
      let manifest = sample_manifest();
      { let _guard = pool.acquire( &manifest, "cpu" ).await.unwrap(); }
      assert_eq!( pool.idle_count().await, 1 );

      pool.shutdown().await;
      assert_eq!( pool.idle_count().await, 0 );
      assert!( pool.acquire( &manifest, "cpu" ).await.is_err() );
    }

    #[ tokio::test ]
    async fn session_returned_after_shutdown_is_closed_rather_than_repooled()
    {
      let pool = SessionPool::new( SessionPoolConfig::default(), factory );
      let manifest = sample_manifest();
      let guard = pool.acquire( &manifest, "cpu" ).await.unwrap();

      pool.shutdown().await;
      drop( guard );

      assert_eq!( pool.idle_count().await, 0 );
    }
  }
}

::mod_interface::mod_interface!
{
  exposed use private::SessionPoolConfig;
  exposed use private::SessionGuard;
  exposed use private::SessionPool;
}
