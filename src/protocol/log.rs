//! Typed wrappers for the `log` module.
//!
//! One event: `log.entryAdded`.

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::{Map, Value};

use super::codec::BidiEvent;

// ============================================================================
// log.entryAdded
// ============================================================================

/// `log.entryAdded`: the remote end appended an entry to a log.
#[derive(Debug, Clone, Copy)]
pub struct EntryAdded;

impl BidiEvent for EntryAdded {
    const METHOD: &'static str = "log.entryAdded";
    type Params = LogEntry;
}

/// Payload of [`EntryAdded`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Severity of the entry.
    pub level: LogLevel,

    /// Log source (`"console"`, `"javascript"`, ...).
    #[serde(rename = "type", default)]
    pub kind: Option<String>,

    /// Entry text; absent when the payload is non-textual.
    #[serde(default)]
    pub text: Option<String>,

    /// Milliseconds since the epoch, as reported by the remote end.
    pub timestamp: i64,

    /// Fields this crate does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Log entry severities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Debug-level entry.
    Debug,
    /// Informational entry.
    Info,
    /// Warning entry.
    Warn,
    /// Error entry.
    Error,
}

// ============================================================================
// Tests
// ============================================================================
