//! Dependency probes.

pub mod http_probe;

pub use http_probe::HttpDependencyProbe;
