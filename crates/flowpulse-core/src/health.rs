//! Downstream dependency probes for the health report.
//!
//! `HealthProbe` uses native async fn in traits. `BoxHealthProbe` erases the
//! concrete type so the status service can hold a heterogeneous list:
//! 1. `HealthProbeDyn` is the object-safe twin with a boxed future
//! 2. a blanket impl covers every `T: HealthProbe`
//! 3. `BoxHealthProbe` wraps `Box<dyn HealthProbeDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use flowpulse_types::status::ComponentHealth;

/// A named, non-critical dependency check.
pub trait HealthProbe: Send + Sync {
    /// Component name in the health report.
    fn name(&self) -> &str;

    /// Probe the dependency. Implementations must bound their own latency.
    fn check(&self) -> impl Future<Output = ComponentHealth> + Send;
}

pub trait HealthProbeDyn: Send + Sync {
    fn name(&self) -> &str;

    fn check_boxed<'a>(&'a self) -> Pin<Box<dyn Future<Output = ComponentHealth> + Send + 'a>>;
}

impl<T: HealthProbe> HealthProbeDyn for T {
    fn name(&self) -> &str {
        HealthProbe::name(self)
    }

    fn check_boxed<'a>(&'a self) -> Pin<Box<dyn Future<Output = ComponentHealth> + Send + 'a>> {
        Box::pin(self.check())
    }
}

/// Type-erased health probe.
pub struct BoxHealthProbe {
    inner: Box<dyn HealthProbeDyn>,
}

impl BoxHealthProbe {
    pub fn new<T: HealthProbe + 'static>(probe: T) -> Self {
        Self {
            inner: Box::new(probe),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn check(&self) -> ComponentHealth {
        self.inner.check_boxed().await
    }
}

impl std::fmt::Debug for BoxHealthProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxHealthProbe")
            .field("name", &self.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowpulse_types::status::HealthStatus;

    struct StaticProbe(HealthStatus);

    impl HealthProbe for StaticProbe {
        fn name(&self) -> &str {
            "static"
        }

        async fn check(&self) -> ComponentHealth {
            match self.0 {
                HealthStatus::Healthy => ComponentHealth::healthy(false, "ok"),
                _ => ComponentHealth::unhealthy(false, "down"),
            }
        }
    }

    #[tokio::test]
    async fn boxed_probe_delegates() {
        let probe = BoxHealthProbe::new(StaticProbe(HealthStatus::Unhealthy));
        assert_eq!(probe.name(), "static");
        assert_eq!(probe.check().await.status, HealthStatus::Unhealthy);
        assert!(format!("{probe:?}").contains("static"));
    }
}
