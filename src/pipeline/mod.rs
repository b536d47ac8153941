//! The request-lifecycle pipeline : plugin contract, registry, and the
//! built-in phase plugins shipped with the gateway (spec.md §4.1).

/// The plugin trait and the outcome-tag control-flow type.
pub mod plugin;
/// The phase-indexed plugin registry.
pub mod registry;
/// Built-in validation and pass-through plugins.
pub mod builtin;
