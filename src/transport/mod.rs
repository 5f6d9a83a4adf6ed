//! WebSocket transport layer.
//!
//! One [`Transport`] owns one client WebSocket for the lifetime of a
//! session.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                      Transport                       │
//! │                                                      │
//! │  send_text ──► send mutex ──► WebSocket send half    │
//! │                                                      │
//! │  WebSocket receive half ──► reader task ──► inbound  │
//! │                                             channel  │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Transport::new` - allocate the inbound channel, no socket yet
//! 2. `start(url)` - connect with retry, spawn the reader
//! 3. `send_text` / inbound channel - traffic
//! 4. `stop()` - close handshake, cancel and join the reader

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket ownership, send mutex, and the inbound reader.
pub mod connection;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{SocketState, Transport};
