//! Warm local runner sessions and the pool that manages them
//! (spec.md §4.8).

/// The `RunnerSession` contract and an in-memory reference implementation.
pub mod runner;
/// Semaphore-bounded, idle-evicting session pool.
pub mod pool;
