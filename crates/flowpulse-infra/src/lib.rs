//! Infrastructure layer for flowpulse.
//!
//! Implements the ports defined in `flowpulse-core`: the file-backed event
//! store and HTTP dependency probes. Also owns webhook signature
//! verification, configuration loading and the data directory layout.

pub mod config;
pub mod filesystem;
pub mod health;
pub mod store;
pub mod webhook;
