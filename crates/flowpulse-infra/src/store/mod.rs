//! Durable event storage.

pub mod file_store;
pub mod format;

pub use file_store::FileEventStore;
