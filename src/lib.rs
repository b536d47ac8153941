//! # Multi-tenant LLM inference gateway
//!
//! Core request-lifecycle engine for routing inference requests across
//! provider adapters, local warm runners, and the reliability envelope
//! (circuit breaker, retry, quota, single-hop failover) that keeps a
//! multi-tenant deployment honest under partial outages.
//!
//! ## Governing scope
//!
//! This crate is the core engine only. It does not ship an HTTP/REST
//! surface, JWT authentication, manifest/tenant persistence, artifact
//! download, model format conversion, or any concrete vendor wire
//! protocol — those are external collaborators that plug into the seams
//! this crate defines (`ProviderAdapter`, `MetricsSink`, `AuditSink`,
//! `ConfigLoader`). What it does own:
//!
//! - the phase pipeline and plugin registry (validation, pre-processing,
//!   dispatch, post-processing)
//! - the provider registry and multi-factor router
//! - the warm-pool session manager for local runners
//! - the reliability envelope : circuit breaker, retry with backoff,
//!   per-tenant/per-provider quota, single-hop failover, cached provider
//!   health checks
//! - batch job status tracking
//!
//! ## Feature flags
//!
//! Every reliability feature is opt-in and explicitly named, in the style
//! of the provider crates this gateway generalizes : `retry`,
//! `circuit_breaker`, `quota`, `failover`, `health_checks`, `session_pool`,
//! `streaming`, `batch_operations`, `dynamic_configuration`, `logging`.
//! `full` enables all of them; `enabled` pulls in the dependency set every
//! feature above is built from.

#![ doc( html_root_url = "https://docs.rs/inference_gateway/latest/inference_gateway/" ) ]
#![ cfg_attr( doc, doc = include_str!( concat!( env!( "CARGO_MANIFEST_DIR" ), "/", "readme.md" ) ) ) ]

/// Pipeline phases, request status, and the pure state-transition function
/// driving a request through its lifecycle.
pub mod context;
/// The closed error taxonomy every fallible operation in this crate returns.
pub mod error;
/// Tenant identity carried read-only through the pipeline.
pub mod tenant;
/// The inbound inference request shape and its validation rules.
pub mod request;
/// The outbound response and streaming chunk shapes.
pub mod response;
/// Model manifests, versions, and the read-only repository contract.
pub mod manifest;
/// The phase pipeline : plugin trait, registry, and reference plugins.
pub mod pipeline;
/// The provider adapter contract, registry, and reference adapters.
pub mod provider;
/// Multi-factor provider routing and the `preferredProvider` policy.
pub mod router;
/// The warm-pool runner/session manager.
pub mod session;
/// The reliability envelope : circuit breaker, retry, quota.
pub mod reliability;
/// Metrics emission seam (external sinks only).
pub mod metrics;
/// Batch job status tracking.
pub mod batch;
/// Bounded, backpressured chunk streaming.
pub mod streaming;
/// The request-lifecycle engine tying the above together.
pub mod engine;
/// The process-scoped runtime owning every registry.
pub mod runtime;
/// Typed gateway configuration.
pub mod config;

pub use context::{ InferenceContext, Phase, RequestStatus, Signal };
pub use engine::Engine;
pub use error::Error;
pub use request::InferenceRequest;
pub use response::Response;
pub use runtime::Runtime;
pub use tenant::TenantContext;
