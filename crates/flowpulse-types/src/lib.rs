//! Shared domain types for flowpulse.
//!
//! Workflow execution events, the derived progress aggregate, read-side
//! projections, configuration and error types.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror, secrecy.

pub mod config;
pub mod error;
pub mod event;
pub mod progress;
pub mod status;
