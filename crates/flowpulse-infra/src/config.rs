//! Service configuration loader.
//!
//! Reads `config.toml` from the data directory (`~/.flowpulse/` by default)
//! into [`ConfigFile`], falling back to defaults when the file is missing or
//! malformed, then applies environment overrides and the runtime profile to
//! produce a [`ServiceConfig`].

use std::path::Path;

use flowpulse_types::config::{ConfigFile, RuntimeProfile, ServiceConfig, WebhookConfig};
use flowpulse_types::error::ConfigError;
use secrecy::SecretString;

use crate::filesystem::{config_path, default_storage_root};

pub const SECRET_ENV: &str = "FLOWPULSE_WEBHOOK_SECRET";
pub const TOLERANCE_ENV: &str = "FLOWPULSE_SIGNATURE_TOLERANCE_SECS";
pub const SOURCE_ENV: &str = "FLOWPULSE_WEBHOOK_SOURCE";
pub const ALLOW_UNVERIFIED_ENV: &str = "FLOWPULSE_ALLOW_UNVERIFIED_WEBHOOKS";

/// Read `{data_dir}/config.toml`.
///
/// - Missing file: defaults.
/// - Unreadable or unparseable file: logs a warning and returns defaults.
pub async fn load_config_file(data_dir: &Path) -> ConfigFile {
    let path = config_path(data_dir);

    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", path.display());
            return ConfigFile::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return ConfigFile::default();
        }
    };

    match toml::from_str::<ConfigFile>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            ConfigFile::default()
        }
    }
}

/// Load the service configuration using the process environment.
pub async fn load_config(
    data_dir: &Path,
    profile: RuntimeProfile,
) -> Result<ServiceConfig, ConfigError> {
    let file = load_config_file(data_dir).await;
    resolve(file, data_dir, profile, |key| std::env::var(key).ok())
}

/// Apply environment overrides and the profile to a parsed config file.
///
/// `env` looks up a variable by name.
pub fn resolve(
    file: ConfigFile,
    data_dir: &Path,
    profile: RuntimeProfile,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ServiceConfig, ConfigError> {
    let ConfigFile {
        webhook,
        storage,
        server,
        health,
    } = file;

    let source = env(SOURCE_ENV).unwrap_or(webhook.source);
    validate_source(&source)?;

    let tolerance_secs = match env(TOLERANCE_ENV) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidValue {
                key: TOLERANCE_ENV.to_string(),
                message: e.to_string(),
            })?,
        None => webhook.tolerance_secs,
    };

    let secret = env(SECRET_ENV)
        .or(webhook.secret)
        .filter(|s| !s.trim().is_empty())
        .map(SecretString::from);

    let allow_unverified = match env(ALLOW_UNVERIFIED_ENV) {
        Some(raw) => parse_flag(ALLOW_UNVERIFIED_ENV, &raw)?,
        None => webhook.allow_unverified_webhooks,
    };

    let mut webhook = WebhookConfig::new(source, secret, tolerance_secs);
    if allow_unverified {
        if webhook.allow_unverified(profile) {
            tracing::warn!("webhook signature verification is DISABLED (development profile)");
        } else {
            tracing::warn!("allow_unverified_webhooks ignored outside the development profile");
        }
    }

    if webhook.secret().is_none() {
        match profile {
            RuntimeProfile::Production => return Err(ConfigError::MissingSecret),
            RuntimeProfile::Development if !webhook.allow_unverified_webhooks() => {
                tracing::warn!("no webhook secret configured, every webhook will be rejected");
            }
            RuntimeProfile::Development => {}
        }
    }

    if server.request_timeout_secs == 0 {
        return Err(ConfigError::InvalidValue {
            key: "server.request_timeout_secs".to_string(),
            message: "must be greater than zero".to_string(),
        });
    }

    let storage_root = storage
        .root
        .unwrap_or_else(|| default_storage_root(data_dir));

    Ok(ServiceConfig {
        profile,
        webhook,
        storage_root,
        server,
        health,
    })
}

fn validate_source(source: &str) -> Result<(), ConfigError> {
    let valid = !source.is_empty()
        && source
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            key: "webhook.source".to_string(),
            message: format!("'{source}' must be non-empty [A-Za-z0-9_-]"),
        })
    }
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got '{other}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[tokio::test]
    async fn missing_file_returns_defaults() {
        let tmp = TempDir::new().unwrap();
        let file = load_config_file(tmp.path()).await;
        assert_eq!(file.webhook.source, "agent");
        assert_eq!(file.server.port, 8787);
    }

    #[tokio::test]
    async fn invalid_toml_returns_defaults() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();
        let file = load_config_file(tmp.path()).await;
        assert_eq!(file.webhook.tolerance_secs, 300);
    }

    #[tokio::test]
    async fn valid_toml_is_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            "[webhook]\nsource = \"n8n\"\nsecret = \"from-file\"\n\n[server]\nport = 9100\n",
        )
        .await
        .unwrap();

        let file = load_config_file(tmp.path()).await;
        let config = resolve(file, tmp.path(), RuntimeProfile::Production, env_of(&[])).unwrap();
        assert_eq!(config.webhook.source, "n8n");
        assert_eq!(config.server.port, 9100);
        assert_eq!(
            config.webhook.secret().unwrap().expose_secret(),
            "from-file"
        );
        assert_eq!(config.storage_root, tmp.path().join("events"));
    }

    #[test]
    fn production_without_secret_is_rejected() {
        let err = resolve(
            ConfigFile::default(),
            Path::new("/data"),
            RuntimeProfile::Production,
            env_of(&[]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingSecret));

        let blank = resolve(
            ConfigFile::default(),
            Path::new("/data"),
            RuntimeProfile::Production,
            env_of(&[(SECRET_ENV, "   ")]),
        );
        assert!(matches!(blank, Err(ConfigError::MissingSecret)));
    }

    #[test]
    fn environment_overrides_file() {
        let mut file = ConfigFile::default();
        file.webhook.secret = Some("from-file".to_string());
        file.storage.root = Some(PathBuf::from("/var/lib/flowpulse"));

        let config = resolve(
            file,
            Path::new("/data"),
            RuntimeProfile::Production,
            env_of(&[
                (SECRET_ENV, "from-env"),
                (TOLERANCE_ENV, "60"),
                (SOURCE_ENV, "crew"),
            ]),
        )
        .unwrap();

        assert_eq!(config.webhook.secret().unwrap().expose_secret(), "from-env");
        assert_eq!(config.webhook.tolerance_secs, 60);
        assert_eq!(config.webhook.webhook_path(), "/api/webhooks/crew-workflow");
        assert_eq!(config.storage_root, PathBuf::from("/var/lib/flowpulse"));
    }

    #[test]
    fn bypass_is_ignored_in_production() {
        let config = resolve(
            ConfigFile::default(),
            Path::new("/data"),
            RuntimeProfile::Production,
            env_of(&[(SECRET_ENV, "s"), (ALLOW_UNVERIFIED_ENV, "true")]),
        )
        .unwrap();
        assert!(!config.webhook.allow_unverified_webhooks());
    }

    #[test]
    fn bypass_applies_in_development_without_secret() {
        let config = resolve(
            ConfigFile::default(),
            Path::new("/data"),
            RuntimeProfile::Development,
            env_of(&[(ALLOW_UNVERIFIED_ENV, "1")]),
        )
        .unwrap();
        assert!(config.webhook.allow_unverified_webhooks());
        assert!(config.webhook.secret().is_none());
    }

    #[test]
    fn invalid_values_are_reported() {
        let bad_tolerance = resolve(
            ConfigFile::default(),
            Path::new("/data"),
            RuntimeProfile::Development,
            env_of(&[(TOLERANCE_ENV, "five minutes")]),
        );
        assert!(matches!(
            bad_tolerance,
            Err(ConfigError::InvalidValue { key, .. }) if key == TOLERANCE_ENV
        ));

        let bad_source = resolve(
            ConfigFile::default(),
            Path::new("/data"),
            RuntimeProfile::Development,
            env_of(&[(SOURCE_ENV, "a/b")]),
        );
        assert!(matches!(bad_source, Err(ConfigError::InvalidValue { .. })));

        let bad_flag = resolve(
            ConfigFile::default(),
            Path::new("/data"),
            RuntimeProfile::Development,
            env_of(&[(ALLOW_UNVERIFIED_ENV, "maybe")]),
        );
        assert!(matches!(bad_flag, Err(ConfigError::InvalidValue { .. })));
    }
}
