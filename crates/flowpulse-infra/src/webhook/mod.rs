//! Inbound webhook authentication.

pub mod signature;

pub use signature::{SignatureError, VerifyOutcome, WebhookVerifier, sign, verify};
