//! Aggregation logic and port definitions for flowpulse.
//!
//! This crate defines the ports (`EventStore`, `HealthProbe`) that the
//! infrastructure layer implements, and everything that runs on top of them:
//! the fold, the live aggregator, activity tracking and the status queries.
//! It depends only on `flowpulse-types`, never on `flowpulse-infra`.

pub mod activity;
pub mod aggregate;
pub mod event;
pub mod health;
pub mod repository;
pub mod status;
