//! `fpulse sign`: produce a signature header for a body file.
//!
//! Useful for replaying a captured event against a running receiver:
//!
//! ```text
//! curl -H "X-Agent-Signature: $(fpulse sign event.json)" \
//!      --data-binary @event.json http://127.0.0.1:8787/api/webhooks/agent-workflow
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};

use flowpulse_infra::webhook::sign;

/// Print the header value for the body in `file`.
pub async fn sign_body(
    file: &Path,
    secret: SecretString,
    timestamp: Option<i64>,
    json: bool,
) -> Result<()> {
    let body = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;

    let timestamp = timestamp.unwrap_or_else(|| chrono::Utc::now().timestamp());
    let header = sign(&body, secret.expose_secret().as_bytes(), timestamp)?;

    if json {
        let out = serde_json::json!({
            "timestamp": timestamp,
            "header": header,
            "body_bytes": body.len(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{header}");
    }
    Ok(())
}
