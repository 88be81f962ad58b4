//! On-disk stream format: key escaping, shape detection and normalisation.
//!
//! Streams written over time came in several shapes. Detection happens once
//! per load and yields a tagged [`StreamShape`]; every recognised shape
//! normalises to the same canonical sequence of `StoredEvent`s.

use chrono::{DateTime, Utc};
use flowpulse_types::event::{StoredEvent, WorkflowExecutionEvent};
use serde::{Deserialize, Serialize};

/// Version written in the canonical envelope.
pub const FORMAT_VERSION: u32 = 1;

/// Canonical write shape.
#[derive(Debug, Serialize)]
pub struct StreamFile<'a> {
    pub version: u32,
    pub workflow_id: &'a str,
    pub events: &'a [StoredEvent],
}

/// Shape of a stream file as found on disk.
#[derive(Debug)]
pub enum StreamShape {
    /// Bare JSON array of events.
    LegacyArray(Vec<serde_json::Value>),
    /// Object with an `events` array; `version` absent on older files.
    Wrapped {
        version: Option<u64>,
        events: Vec<serde_json::Value>,
    },
    Unrecognized,
}

impl StreamShape {
    pub fn detect(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Array(entries) => StreamShape::LegacyArray(entries),
            serde_json::Value::Object(mut map) => match map.remove("events") {
                Some(serde_json::Value::Array(events)) => StreamShape::Wrapped {
                    version: map.get("version").and_then(serde_json::Value::as_u64),
                    events,
                },
                _ => StreamShape::Unrecognized,
            },
            _ => StreamShape::Unrecognized,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StreamShape::LegacyArray(_) => "legacy_array",
            StreamShape::Wrapped { .. } => "wrapped",
            StreamShape::Unrecognized => "unrecognized",
        }
    }
}

/// Content that cannot be read as a stream at all.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("unrecognized stream shape")]
    Unrecognized,
}

/// A decoded stream plus what normalisation had to do.
#[derive(Debug, Default)]
pub struct DecodedStream {
    pub events: Vec<StoredEvent>,
    /// The file was not in the canonical shape.
    pub drifted: bool,
    /// Entries that could not be parsed and were dropped.
    pub skipped: usize,
}

/// Entry as found in any historical shape.
#[derive(Deserialize)]
struct RawEntry {
    #[serde(default)]
    received_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    event: WorkflowExecutionEvent,
}

/// Decode raw file content into canonical events.
///
/// Sequences are renumbered by position. Entries without `received_at`
/// fall back to their `occurred_at`.
pub fn decode(bytes: &[u8]) -> Result<DecodedStream, DecodeError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(DecodedStream::default());
    }

    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;

    let (entries, drifted) = match StreamShape::detect(value) {
        StreamShape::LegacyArray(entries) => (entries, true),
        StreamShape::Wrapped { version, events } => {
            (events, version != Some(u64::from(FORMAT_VERSION)))
        }
        StreamShape::Unrecognized => return Err(DecodeError::Unrecognized),
    };

    let mut decoded = DecodedStream {
        drifted,
        ..DecodedStream::default()
    };
    for entry in entries {
        match serde_json::from_value::<RawEntry>(entry) {
            Ok(raw) => {
                let sequence = decoded.events.len() as u64 + 1;
                decoded.events.push(StoredEvent {
                    sequence,
                    received_at: raw.received_at.unwrap_or(raw.event.occurred_at),
                    event: raw.event,
                });
            }
            Err(_) => decoded.skipped += 1,
        }
    }
    Ok(decoded)
}

/// Serialize events in the canonical shape.
pub fn encode(workflow_id: &str, events: &[StoredEvent]) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec_pretty(&StreamFile {
        version: FORMAT_VERSION,
        workflow_id,
        events,
    })
}

fn is_key_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-')
}

/// Escape a workflow id into a file-safe stream key.
///
/// Bytes outside `[A-Za-z0-9._-]` become `%XX`, so the mapping is reversible
/// and distinct ids never share a file.
pub fn encode_stream_key(workflow_id: &str) -> String {
    let mut key = String::with_capacity(workflow_id.len());
    for b in workflow_id.bytes() {
        if is_key_byte(b) {
            key.push(b as char);
        } else {
            key.push_str(&format!("%{b:02X}"));
        }
    }
    key
}

/// Reverse of [`encode_stream_key`]. `None` for names this store did not write.
pub fn decode_stream_key(key: &str) -> Option<String> {
    let bytes = key.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = key.get(i + 1..i + 3)?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            b if is_key_byte(b) => {
                out.push(b);
                i += 1;
            }
            _ => return None,
        }
    }
    String::from_utf8(out).ok()
}

/// File name, inside the quarantine directory, for a stream moved aside at
/// `unix_ms`.
pub fn quarantine_file_name(key: &str, unix_ms: i64) -> String {
    format!("{key}.{unix_ms}.json")
}

/// Workflow id for a file in the streams directory. Temp files and anything
/// else without a `.json` suffix are skipped.
pub fn workflow_id_from_file_name(name: &str) -> Option<String> {
    let key = name.strip_suffix(".json")?;
    if key.is_empty() {
        return None;
    }
    decode_stream_key(key)
}
