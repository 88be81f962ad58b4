//! Timestamped HMAC-SHA256 webhook signatures.
//!
//! Header format: `t=<unix_seconds>,v1=<hex_hmac_sha256>`. The MAC covers
//! `"{t}.{raw_body}"`, so a captured body cannot be replayed under a fresh
//! timestamp. Several `v1` entries may be present while a secret rotates;
//! the header verifies if any of them matches.
//!
//! `verify()` is pure. `WebhookVerifier` wraps it with the configured secret,
//! the clock, the development-only bypass and rejection logging.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use flowpulse_types::config::WebhookConfig;

type HmacSha256 = Hmac<Sha256>;

/// Why a signature was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("signature does not match")]
    InvalidSignature,

    #[error("signature timestamp outside the tolerance window")]
    StaleTimestamp,

    #[error("malformed signature header: {0}")]
    MalformedHeader(String),
}

struct ParsedHeader {
    timestamp: i64,
    signatures: Vec<String>,
}

fn parse_header(header: &str) -> Result<ParsedHeader, SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for entry in header.split(',') {
        let Some((key, value)) = entry.trim().split_once('=') else {
            continue;
        };
        match key.trim() {
            "t" => {
                let t = value.trim().parse::<i64>().map_err(|_| {
                    SignatureError::MalformedHeader("timestamp is not an integer".to_string())
                })?;
                timestamp = Some(t);
            }
            "v1" => signatures.push(value.trim().to_string()),
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| SignatureError::MalformedHeader("missing t".to_string()))?;
    if signatures.is_empty() {
        return Err(SignatureError::MalformedHeader("missing v1".to_string()));
    }
    Ok(ParsedHeader {
        timestamp,
        signatures,
    })
}

fn mac_for(secret: &[u8], timestamp: i64, body: &[u8]) -> Result<HmacSha256, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|_| SignatureError::InvalidSignature)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    Ok(mac)
}

/// Verify a signature header against the raw request body.
///
/// The digest is checked first, then the timestamp window, so a stale but
/// otherwise valid header yields `StaleTimestamp`.
pub fn verify(
    body: &[u8],
    header: &str,
    secret: &[u8],
    tolerance_secs: u64,
    now_unix: i64,
) -> Result<(), SignatureError> {
    let parsed = parse_header(header)?;

    let mut decoded = Vec::with_capacity(parsed.signatures.len());
    for candidate in &parsed.signatures {
        decoded.push(hex_decode(candidate).ok_or(SignatureError::InvalidSignature)?);
    }

    let mac = mac_for(secret, parsed.timestamp, body)?;
    let matched = decoded
        .iter()
        .any(|expected| mac.clone().verify_slice(expected).is_ok());
    if !matched {
        return Err(SignatureError::InvalidSignature);
    }

    if now_unix.abs_diff(parsed.timestamp) > tolerance_secs {
        return Err(SignatureError::StaleTimestamp);
    }
    Ok(())
}

/// Produce a header for `body` signed at `timestamp`.
pub fn sign(body: &[u8], secret: &[u8], timestamp: i64) -> Result<String, SignatureError> {
    let digest = mac_for(secret, timestamp, body)?.finalize().into_bytes();
    Ok(format!("t={timestamp},v1={}", hex_encode(&digest)))
}

/// Result of a successful request check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified,
    /// Accepted without verification (development bypass).
    Bypassed,
}

/// Request-side verifier bound to the service configuration.
pub struct WebhookVerifier {
    secret: Option<SecretString>,
    tolerance_secs: u64,
    allow_unverified: bool,
    header_name: String,
}

impl WebhookVerifier {
    pub fn from_config(config: &WebhookConfig) -> Self {
        Self {
            secret: config
                .secret()
                .map(|s| SecretString::from(s.expose_secret())),
            tolerance_secs: config.tolerance_secs,
            allow_unverified: config.allow_unverified_webhooks(),
            header_name: config.signature_header(),
        }
    }

    /// Lowercase name of the signature header this verifier reads.
    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    pub fn verify_request(
        &self,
        body: &[u8],
        header: Option<&str>,
    ) -> Result<VerifyOutcome, SignatureError> {
        self.verify_request_at(body, header, chrono::Utc::now().timestamp())
    }

    pub fn verify_request_at(
        &self,
        body: &[u8],
        header: Option<&str>,
        now_unix: i64,
    ) -> Result<VerifyOutcome, SignatureError> {
        if self.allow_unverified {
            tracing::warn!(header = %self.header_name, "webhook accepted without verification");
            return Ok(VerifyOutcome::Bypassed);
        }

        let result = match (header, &self.secret) {
            (None, _) => Err(SignatureError::MalformedHeader(format!(
                "missing {} header",
                self.header_name
            ))),
            (Some(_), None) => Err(SignatureError::InvalidSignature),
            (Some(value), Some(secret)) => verify(
                body,
                value,
                secret.expose_secret().as_bytes(),
                self.tolerance_secs,
                now_unix,
            ),
        };

        if let Err(e) = &result {
            tracing::warn!(
                header = %self.header_name,
                value = header.unwrap_or(""),
                secret_configured = self.secret.is_some(),
                error = %e,
                "webhook signature rejected"
            );
        }
        result.map(|()| VerifyOutcome::Verified)
    }
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("header_name", &self.header_name)
            .field("tolerance_secs", &self.tolerance_secs)
            .field("allow_unverified", &self.allow_unverified)
            .finish_non_exhaustive()
    }
}

/// Decode a hex string to bytes.
fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    if hex.is_empty() || hex.len() % 2 != 0 || !hex.is_ascii() {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
