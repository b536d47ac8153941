//! Circuit breaker, retry, quota enforcement, and provider health checks
//! (spec.md §4.4, §4.6).

/// Per-provider circuit breakers.
pub mod circuit_breaker;
/// Exponential backoff retry.
pub mod retry;
/// Tenant/provider quota enforcement.
pub mod quota;
/// Combined tenant + provider quota enforcement point.
pub mod provider_quota;
/// Cached per-provider health status, refreshed by a periodic sweep.
pub mod health;
