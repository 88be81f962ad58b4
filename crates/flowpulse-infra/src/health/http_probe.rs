//! HTTP GET probe for a downstream dependency.

use std::time::{Duration, Instant};

use flowpulse_core::health::HealthProbe;
use flowpulse_types::config::DependencyCheck;
use flowpulse_types::status::ComponentHealth;

/// Healthy when `GET {url}` answers 2xx within the timeout.
#[derive(Debug, Clone)]
pub struct HttpDependencyProbe {
    name: String,
    url: String,
    client: reqwest::Client,
}

impl HttpDependencyProbe {
    pub fn new(name: impl Into<String>, url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            name: name.into(),
            url: url.into(),
            client,
        }
    }

    pub fn from_check(check: &DependencyCheck) -> Self {
        Self::new(
            check.name.clone(),
            check.url.clone(),
            Duration::from_millis(check.timeout_ms),
        )
    }
}

impl HealthProbe for HttpDependencyProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> ComponentHealth {
        let started = Instant::now();
        match self.client.get(&self.url).send().await {
            Ok(resp) if resp.status().is_success() => ComponentHealth::healthy(
                false,
                format!("HTTP {} in {}ms", resp.status().as_u16(), started.elapsed().as_millis()),
            ),
            Ok(resp) => ComponentHealth::unhealthy(false, format!("HTTP {}", resp.status().as_u16())),
            Err(e) => {
                tracing::debug!(dependency = %self.name, error = %e, "dependency probe failed");
                let reason = if e.is_timeout() {
                    "timed out".to_string()
                } else if e.is_connect() {
                    "connection failed".to_string()
                } else {
                    e.to_string()
                };
                ComponentHealth::unhealthy(false, reason)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowpulse_types::status::HealthStatus;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn serve_once(status_line: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let response =
                format!("HTTP/1.1 {status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            socket.write_all(response.as_bytes()).await.unwrap();
        });
        format!("http://{addr}/health")
    }

    #[tokio::test]
    async fn success_status_is_healthy() {
        let url = serve_once("200 OK").await;
        let probe = HttpDependencyProbe::new("analytics", url, Duration::from_secs(2));
        let health = probe.check().await;
        assert_eq!(health.status, HealthStatus::Healthy);
        assert!(!health.critical);
        assert!(health.details.starts_with("HTTP 200"));
    }

    #[tokio::test]
    async fn error_status_is_unhealthy() {
        let url = serve_once("503 Service Unavailable").await;
        let probe = HttpDependencyProbe::new("analytics", url, Duration::from_secs(2));
        let health = probe.check().await;
        assert_eq!(health.status, HealthStatus::Unhealthy);
        assert_eq!(health.details, "HTTP 503");
    }

    #[tokio::test]
    async fn refused_connection_is_unhealthy() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let probe = HttpDependencyProbe::from_check(&DependencyCheck {
            name: "crm".to_string(),
            url: format!("http://{addr}/"),
            timeout_ms: 500,
        });
        assert_eq!(probe.name(), "crm");
        assert_eq!(probe.check().await.status, HealthStatus::Unhealthy);
    }
}
