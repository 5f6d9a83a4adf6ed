//! Wire protocol message types and codec traits.
//!
//! This module defines the message envelopes exchanged with the remote end
//! and the codec seam typed wrappers are built on.
//!
//! # Protocol Overview
//!
//! | Message | Direction | Purpose |
//! |---------|-----------|---------|
//! | [`CommandEnvelope`] | local → remote | command request |
//! | [`SuccessResponse`] | remote → local | command completed |
//! | [`ErrorResponse`] | remote → local | command failed |
//! | [`EventMessage`] | remote → local | spontaneous notification |
//!
//! # Command Naming
//!
//! Commands and events follow `module.methodName` format:
//!
//! - `session.status`
//! - `browsingContext.navigate`
//! - `log.entryAdded`
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `message` | Wire envelopes and inbound classification |
//! | `codec` | [`BidiCommand`] / [`BidiEvent`] traits |
//! | `session` | Typed `session.*` commands |
//! | `browsing_context` | Typed `browsingContext.*` commands |
//! | `log` | Typed `log.*` events |

// ============================================================================
// Submodules
// ============================================================================

/// Typed `browsingContext.*` commands.
pub mod browsing_context;

/// Codec traits connecting typed wrappers to the opaque core.
pub mod codec;

/// Typed `log.*` events.
pub mod log;

/// Wire envelopes and inbound classification.
pub mod message;

/// Typed `session.*` commands.
pub mod session;

// ============================================================================
// Re-exports
// ============================================================================

pub use codec::{BidiCommand, BidiEvent, EmptyResult};
pub use message::{
    CommandEnvelope, ErrorResponse, EventMessage, InboundMessage, ProtocolViolation,
    SuccessResponse,
};
