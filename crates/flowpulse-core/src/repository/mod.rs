//! Storage ports.
//!
//! These traits define the storage interface that the infrastructure layer
//! (flowpulse-infra) implements. The core crate never depends on any
//! specific storage technology.

pub mod event_store;
pub mod memory;

pub use event_store::{AppendReceipt, EventStore};
