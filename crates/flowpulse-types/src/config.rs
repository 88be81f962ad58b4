//! Configuration types for flowpulse.
//!
//! `ConfigFile` mirrors `config.toml` on disk; every field has a default so
//! an empty file is valid. `ServiceConfig` is the resolved configuration the
//! service runs with, produced by the loader in `flowpulse-infra` after
//! applying environment overrides and the runtime profile.

use std::path::PathBuf;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Default webhook source name (`/api/webhooks/agent-workflow`).
pub const DEFAULT_SOURCE: &str = "agent";

/// Execution context the service runs in.
///
/// Only `Development` may enable unverified webhooks. Release builds always
/// resolve to `Production`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeProfile {
    Production,
    Development,
}

impl RuntimeProfile {
    /// Profile of the running binary: `Development` for debug builds only.
    pub fn current() -> Self {
        if cfg!(debug_assertions) {
            RuntimeProfile::Development
        } else {
            RuntimeProfile::Production
        }
    }
}

// ---------------------------------------------------------------------------
// On-disk representation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub webhook: WebhookFileConfig,
    #[serde(default)]
    pub storage: StorageFileConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub health: HealthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookFileConfig {
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default, skip_serializing)]
    pub secret: Option<String>,
    #[serde(default = "default_tolerance_secs")]
    pub tolerance_secs: u64,
    /// Honoured only under the development profile.
    #[serde(default)]
    pub allow_unverified_webhooks: bool,
}

impl Default for WebhookFileConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            secret: None,
            tolerance_secs: default_tolerance_secs(),
            allow_unverified_webhooks: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageFileConfig {
    /// Storage root; defaults to `{data_dir}/events`.
    #[serde(default)]
    pub root: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound for verify + append + aggregate on one request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Aggregator is reported degraded when its last update is older than this.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
    #[serde(default)]
    pub dependencies: Vec<DependencyCheck>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: default_stale_after_secs(),
            dependencies: Vec::new(),
        }
    }
}

/// A downstream HTTP dependency probed by the health check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyCheck {
    pub name: String,
    pub url: String,
    #[serde(default = "default_dependency_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_source() -> String {
    DEFAULT_SOURCE.to_string()
}

fn default_tolerance_secs() -> u64 {
    300
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8787
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_stale_after_secs() -> u64 {
    86_400
}

fn default_dependency_timeout_ms() -> u64 {
    2_000
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Webhook authentication settings.
///
/// The bypass flag is private: it starts `false` and only
/// [`WebhookConfig::allow_unverified`] can flip it, which refuses to do so
/// outside the development profile.
#[derive(Debug)]
pub struct WebhookConfig {
    pub source: String,
    secret: Option<SecretString>,
    pub tolerance_secs: u64,
    allow_unverified_webhooks: bool,
}

impl WebhookConfig {
    pub fn new(source: impl Into<String>, secret: Option<SecretString>, tolerance_secs: u64) -> Self {
        Self {
            source: source.into(),
            secret,
            tolerance_secs,
            allow_unverified_webhooks: false,
        }
    }

    /// Enable the verification bypass. Returns whether it took effect.
    pub fn allow_unverified(&mut self, profile: RuntimeProfile) -> bool {
        self.allow_unverified_webhooks = profile == RuntimeProfile::Development;
        self.allow_unverified_webhooks
    }

    pub fn allow_unverified_webhooks(&self) -> bool {
        self.allow_unverified_webhooks
    }

    pub fn secret(&self) -> Option<&SecretString> {
        self.secret.as_ref()
    }

    /// Route the agent system posts to, e.g. `/api/webhooks/agent-workflow`.
    pub fn webhook_path(&self) -> String {
        format!("/api/webhooks/{}-workflow", self.source)
    }

    /// Lowercase signature header name, e.g. `x-agent-signature`.
    pub fn signature_header(&self) -> String {
        format!("x-{}-signature", self.source.to_lowercase())
    }
}

/// Fully resolved service configuration.
#[derive(Debug)]
pub struct ServiceConfig {
    pub profile: RuntimeProfile,
    pub webhook: WebhookConfig,
    pub storage_root: PathBuf,
    pub server: ServerConfig,
    pub health: HealthConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: ConfigFile = toml::from_str("").unwrap();
        assert_eq!(config.webhook.source, "agent");
        assert_eq!(config.webhook.tolerance_secs, 300);
        assert!(!config.webhook.allow_unverified_webhooks);
        assert!(config.webhook.secret.is_none());
        assert!(config.storage.root.is_none());
        assert_eq!(config.server.port, 8787);
        assert_eq!(config.server.request_timeout_secs, 10);
        assert_eq!(config.health.stale_after_secs, 86_400);
        assert!(config.health.dependencies.is_empty());
    }

    #[test]
    fn parses_full_file() {
        let toml_str = r#"
[webhook]
source = "n8n"
secret = "s3cret"
tolerance_secs = 120

[storage]
root = "/var/lib/flowpulse"

[server]
port = 9000

[[health.dependencies]]
name = "analytics"
url = "http://localhost:7000/health"
"#;
        let config: ConfigFile = toml::from_str(toml_str).unwrap();
        assert_eq!(config.webhook.source, "n8n");
        assert_eq!(config.webhook.secret.as_deref(), Some("s3cret"));
        assert_eq!(config.webhook.tolerance_secs, 120);
        assert_eq!(config.storage.root, Some(PathBuf::from("/var/lib/flowpulse")));
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.health.dependencies.len(), 1);
        assert_eq!(config.health.dependencies[0].timeout_ms, 2_000);
    }

    #[test]
    fn secret_is_never_serialized() {
        let mut config = ConfigFile::default();
        config.webhook.secret = Some("do-not-print".to_string());
        let out = toml::to_string(&config).unwrap();
        assert!(!out.contains("do-not-print"));
    }

    #[test]
    fn bypass_only_takes_effect_in_development() {
        let mut prod = WebhookConfig::new("agent", None, 300);
        assert!(!prod.allow_unverified(RuntimeProfile::Production));
        assert!(!prod.allow_unverified_webhooks());

        let mut dev = WebhookConfig::new("agent", None, 300);
        assert!(dev.allow_unverified(RuntimeProfile::Development));
        assert!(dev.allow_unverified_webhooks());
    }

    #[test]
    fn webhook_routes_follow_source() {
        let config = WebhookConfig::new("Agent", None, 300);
        assert_eq!(config.webhook_path(), "/api/webhooks/Agent-workflow");
        assert_eq!(config.signature_header(), "x-agent-signature");
    }

    #[test]
    fn debug_output_redacts_secret() {
        let config = WebhookConfig::new("agent", Some(SecretString::from("hunter2")), 300);
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
    }
}
