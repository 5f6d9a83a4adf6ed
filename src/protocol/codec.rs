//! Codec traits: the seam between typed wrappers and the opaque core.
//!
//! The dispatch core treats every command as an opaque `{method, params}`
//! pair and every event as a `{method, params}` pair. These traits let
//! per-module wrappers (and downstream crates) layer typed APIs on top:
//! [`BidiCommand`] turns a typed command into its method name and params,
//! and declares the typed result to decode; [`BidiEvent`] binds an event
//! method name to its typed payload.

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

// ============================================================================
// BidiCommand
// ============================================================================

/// A typed command that the driver can send.
///
/// Implementors are plain serializable structs; the struct's fields become
/// the command's `params` object.
///
/// # Example
///
/// ```ignore
/// #[derive(Serialize)]
/// struct Status {}
///
/// impl BidiCommand for Status {
///     const METHOD: &'static str = "session.status";
///     type Output = StatusResult;
/// }
/// ```
pub trait BidiCommand: Serialize {
    /// Command name in `module.methodName` format.
    const METHOD: &'static str;

    /// Typed shape of the `result` object in the success response.
    type Output: DeserializeOwned;

    /// Encodes this command's fields as the wire `params` object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the command cannot be serialized.
    fn params(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(Error::Json)
    }
}

// ============================================================================
// BidiEvent
// ============================================================================

/// A typed event the driver can subscribe to.
pub trait BidiEvent {
    /// Event name in `module.eventName` format.
    const METHOD: &'static str;

    /// Typed shape of the event's `params` object.
    type Params: DeserializeOwned;
}

// ============================================================================
// EmptyResult
// ============================================================================

/// Result type for commands whose success response carries no data.
///
/// Remote ends are free to attach vendor fields; they are preserved but
/// not interpreted.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct EmptyResult {
    /// Fields this crate does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// Tests
// ============================================================================
