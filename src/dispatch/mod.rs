//! Command multiplexing and event fan-out.
//!
//! The dispatch layer sits between the transport and the driver facade:
//!
//! - [`Dispatcher`] owns the command-id counter and the pending-command
//!   table, correlates responses to commands, and routes events.
//! - [`EventRouter`] maps event method names to ordered subscriber lists.
//! - [`CommandSink`] is the narrow outbound capability the dispatcher
//!   needs from the transport.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `dispatcher` | Pending-command table and inbound routing |
//! | `router` | Subscriber registry and event delivery |

// ============================================================================
// Submodules
// ============================================================================

/// Pending-command table, id allocation, and inbound routing.
pub mod dispatcher;

/// Subscriber registry and event delivery.
pub mod router;

// ============================================================================
// Re-exports
// ============================================================================

pub use dispatcher::{CommandSink, Dispatcher};
pub use router::{EventHandler, EventRouter, HandlerResult, Subscription};
