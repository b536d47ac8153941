//! Streaming response plumbing (spec.md §4.9) : backpressure via bounded
//! channels, time-to-first-token tracking, and the rule that a failure
//! after the first chunk has been emitted is never retried transparently.

mod private
{
  use core::pin::Pin;
  use core::time::Duration;
  use std::sync::atomic::{ AtomicBool, Ordering };
  use std::sync::Arc;
  use std::time::Instant;
  use futures_core::Stream;
  use tokio::sync::{ mpsc, Notify };
  use tokio_stream::wrappers::ReceiverStream;
  use tokio_stream::StreamExt;
  use crate::error::Error;
  use crate::response::Chunk;

  /// A boxed stream of chunks, as returned by [`crate::provider::adapter::ProviderAdapter::invoke_streaming`].
  pub type ChunkStream = Pin< Box< dyn Stream< Item = Result< Chunk, Error > > + Send > >;

  /// Default bound on the backpressure channel between a provider adapter
  /// and the consumer driving the stream (spec.md §4.9 : bounded buffer,
  /// not unbounded fan-out).
  pub const DEFAULT_CHANNEL_CAPACITY : usize = 32;

  /// Sender half handed to provider adapters producing chunks.
  pub type ChunkSender = mpsc::Sender< Result< Chunk, Error > >;

  /// Build a bounded producer/consumer pair for a streaming invocation.
  #[ must_use ]
  pub fn channel( capacity : usize ) -> ( ChunkSender, ChunkStream )
  {
    let ( tx, rx ) = mpsc::channel( capacity.max( 1 ) );
    let stream = ReceiverStream::new( rx );
    ( tx, Box::pin( stream ) )
  }

  /// Tracks stream-level timing and the post-first-chunk retry rule
  /// (spec.md §4.9 : once any chunk has reached the caller, a mid-stream
  /// failure is surfaced as-is, never silently retried from the top).
  #[ derive( Debug ) ]
  pub struct StreamProgress
  {
    started_at : Instant,
    first_chunk_at : Option< Instant >,
    chunks_emitted : u64,
  }

  impl Default for StreamProgress
  {
    fn default() -> Self
    {
      Self::new()
    }
  }

  impl StreamProgress
  {
    /// Begin tracking a new stream.
    #[ must_use ]
    pub fn new() -> Self
    {
      Self { started_at : Instant::now(), first_chunk_at : None, chunks_emitted : 0 }
    }

    /// Record that one chunk was delivered to the caller.
    pub fn record_chunk( &mut self )
    {
      if self.first_chunk_at.is_none()
      {
        self.first_chunk_at = Some( Instant::now() );
      }
      self.chunks_emitted += 1;
    }

    /// Time elapsed until the first chunk, if one has been emitted yet.
    #[ must_use ]
    pub fn time_to_first_token( &self ) -> Option< Duration >
    {
      self.first_chunk_at.map( | at | at.saturating_duration_since( self.started_at ) )
    }

    /// Whether any chunk has reached the caller yet. Once true, a
    /// mid-stream failure must not be retried transparently.
    #[ must_use ]
    #[ inline ]
    pub fn has_emitted( &self ) -> bool
    {
      self.chunks_emitted > 0
    }

    /// Total chunks emitted so far.
    #[ must_use ]
    #[ inline ]
    pub fn chunks_emitted( &self ) -> u64
    {
      self.chunks_emitted
    }
  }

  /// Classify a mid-stream failure per spec.md §4.9 : retryable only if
  /// no chunk has reached the caller yet and the error itself is
  /// retryable.
  #[ must_use ]
  pub fn is_transparently_retryable( progress : &StreamProgress, error : &Error ) -> bool
  {
    !progress.has_emitted() && error.retryable()
  }

  #[ derive( Debug ) ]
  struct CancellationInner
  {
    cancelled : AtomicBool,
    notify : Notify,
  }

  /// An explicit cancellation signal (spec.md Design Notes §9 : "replace
  /// [coroutine/async chains] with explicit cancellation tokens"), handed
  /// to a streaming invocation so an external cancel request can interrupt
  /// it between chunks without the engine needing to poll.
  #[ derive( Debug, Clone ) ]
  pub struct CancellationToken
  {
    inner : Arc< CancellationInner >,
  }

  impl Default for CancellationToken
  {
    fn default() -> Self
    {
      Self::new()
    }
  }

  impl CancellationToken
  {
    /// Construct a fresh, not-yet-cancelled token.
    #[ must_use ]
    pub fn new() -> Self
    {
      Self { inner : Arc::new( CancellationInner { cancelled : AtomicBool::new( false ), notify : Notify::new() } ) }
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel( &self )
    {
      self.inner.cancelled.store( true, Ordering::SeqCst );
      self.inner.notify.notify_waiters();
    }

    /// Whether [`CancellationToken::cancel`] has been called.
    #[ must_use ]
    pub fn is_cancelled( &self ) -> bool
    {
      self.inner.cancelled.load( Ordering::SeqCst )
    }

    /// Resolves once cancelled; resolves immediately if already cancelled.
    pub async fn cancelled( &self )
    {
      if self.is_cancelled()
      {
        return;
      }
      self.inner.notify.notified().await;
    }
  }

  /// Drain a [`ChunkStream`] into a `Vec`, used by tests and by adapters
  /// that need to buffer a stream into a single [`crate::response::Response`].
  ///
  /// # Errors
  ///
  /// Returns the first `Err` encountered, without buffering anything past
  /// it.
  pub async fn collect( mut stream : ChunkStream ) -> Result< Vec< Chunk >, Error >
  {
    let mut out = Vec::new();
    while let Some( item ) = stream.next().await
    {
      out.push( item? );
    }
    Ok( out )
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;
    use std::collections::HashMap;

    #[ tokio::test ]
    async fn channel_roundtrips_chunks()
    {
      let ( tx, stream ) = channel( DEFAULT_CHANNEL_CAPACITY );
      tx.send( Ok( Chunk { request_id : "r1".into(), delta : "a".into(), is_final : false, metadata : HashMap::new() } ) ).await.unwrap();
      tx.send( Ok( Chunk { request_id : "r1".into(), delta : "b".into(), is_final : true, metadata : HashMap::new() } ) ).await.unwrap();
      drop( tx );

      let chunks = collect( stream ).await.unwrap();
      assert_eq!( chunks.len(), 2 );
      assert!( chunks[ 1 ].is_final );
    }

    #[ test ]
    fn progress_tracks_first_chunk()
    {
      let mut progress = StreamProgress::new();
      assert!( !progress.has_emitted() );
      progress.record_chunk();
      assert!( progress.has_emitted() );
      assert!( progress.time_to_first_token().is_some() );
    }

    #[ test ]
    fn post_first_chunk_failure_is_not_transparently_retryable()
    {
      let mut progress = StreamProgress::new();
      progress.record_chunk();
      let error = Error::UpstreamTransient( "connection reset".into() );
      assert!( !is_transparently_retryable( &progress, &error ) );
    }

    #[ test ]
    fn pre_first_chunk_retryable_failure_is_transparently_retryable()
    {
      let progress = StreamProgress::new();
      let error = Error::UpstreamTransient( "connection reset".into() );
      assert!( is_transparently_retryable( &progress, &error ) );
    }

    #[ tokio::test ]
    async fn cancellation_token_resolves_after_cancel()
    {
      let token = CancellationToken::new();
      assert!( !token.is_cancelled() );

      let waiter = token.clone();
      let handle = tokio::spawn( async move { waiter.cancelled().await; } );

      tokio::task::yield_now().await;
      token.cancel();
      handle.await.unwrap();
      assert!( token.is_cancelled() );
    }

    #[ tokio::test ]
    async fn cancellation_token_already_cancelled_resolves_immediately()
    {
      let token = CancellationToken::new();
      token.cancel();
      tokio::time::timeout( Duration::from_millis( 50 ), token.cancelled() ).await.unwrap();
    }
  }
}

::mod_interface::mod_interface!
{
  exposed use private::ChunkStream;
  exposed use private::ChunkSender;
  exposed use private::DEFAULT_CHANNEL_CAPACITY;
  exposed use private::channel;
  exposed use private::StreamProgress;
  exposed use private::CancellationToken;
  exposed use private::is_transparently_retryable;
  exposed use private::collect;
}
