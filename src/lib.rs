//! WebDriver BiDi client core: command multiplexing and event routing
//! over a single WebSocket.
//!
//! This library implements the transport and dispatch core of the
//! [WebDriver BiDi protocol](https://w3c.github.io/webdriver-bidi/): a
//! bidirectional JSON control channel between a test harness (the local
//! end) and a browser (the remote end).
//!
//! # Architecture
//!
//! Four layers, leaves first:
//!
//! - **[`transport`]** owns the WebSocket: serialized outbound text
//!   frames under a send mutex, one inbound reader task reassembling
//!   frames into whole UTF-8 messages.
//! - **[`dispatch`]** owns the command-id counter and the
//!   pending-command table: correlates responses to commands by id,
//!   enforces per-command deadlines, fans events out to subscribers in
//!   wire order.
//! - **[`protocol`]** defines the wire envelopes and the codec seam
//!   typed wrappers plug into.
//! - **[`driver`]** is the public facade: `start` / `stop` / `execute` /
//!   `on`, guarded by the session state machine.
//!
//! # Quick Start
//!
//! ```no_run
//! use bidi_webdriver::{Driver, Result};
//! use bidi_webdriver::protocol::log::EntryAdded;
//! use bidi_webdriver::protocol::session::{Status, Subscribe};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let driver = Driver::builder().build();
//!     driver.start("ws://127.0.0.1:9222/session").await?;
//!
//!     // raw or typed commands over the same core
//!     let status = driver.send_command(&Status {}).await?;
//!     println!("remote ready: {}", status.ready);
//!
//!     // local handler + remote subscription
//!     driver.on_event::<EntryAdded, _>(|entry| {
//!         println!("[{:?}] {}", entry.level, entry.text.unwrap_or_default());
//!     });
//!     driver
//!         .send_command(&Subscribe::to_events(["log.entryAdded"]))
//!         .await?;
//!
//!     driver.stop().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Session timeouts and buffer sizing |
//! | [`dispatch`] | Command correlation and event fan-out |
//! | [`driver`] | Public facade and session state machine |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Wire envelopes and codec traits |
//! | [`transport`] | WebSocket transport layer |
//!
//! # Guarantees
//!
//! - Command ids are strictly increasing and never reused; responses are
//!   correlated by id, not arrival order.
//! - Every accepted `execute` resolves exactly once: result, remote
//!   error, timeout, or session-closed.
//! - Events for a method are delivered to its subscribers in wire order.
//! - A malformed inbound frame is logged and dropped; it never tears the
//!   session down.
//! - `stop` drains every in-flight command with a session-closed error
//!   before the socket goes away, and is idempotent.

// ============================================================================
// Modules
// ============================================================================

/// Session timeouts and buffer sizing.
pub mod config;

/// Command correlation and event fan-out.
pub mod dispatch;

/// Driver facade and configuration builder.
pub mod driver;

/// Error types and result aliases.
pub mod error;

/// Type-safe identifiers for protocol entities.
pub mod identifiers;

/// Wire protocol message types and codec traits.
pub mod protocol;

/// WebSocket transport layer.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Configuration
pub use config::DriverConfig;

// Dispatch types
pub use dispatch::{CommandSink, Dispatcher, EventHandler, EventRouter, HandlerResult, Subscription};

// Driver types
pub use driver::{Driver, DriverBuilder, SessionState};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{CommandId, SubscriptionId};

// Protocol types
pub use protocol::{BidiCommand, BidiEvent, CommandEnvelope, InboundMessage};

// Transport types
pub use transport::{SocketState, Transport};
