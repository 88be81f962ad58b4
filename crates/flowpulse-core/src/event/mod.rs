//! Live progress notifications.

pub mod bus;

pub use bus::ProgressBus;
