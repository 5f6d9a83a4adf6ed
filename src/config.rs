//! Driver configuration.
//!
//! All tunables of the transport and dispatch core. There is no CLI,
//! environment variable, or on-disk state; configuration is set through
//! [`DriverBuilder`](crate::driver::DriverBuilder) and fixed for the
//! lifetime of the session.
//!
//! | Knob | Guards | Default |
//! |------|--------|---------|
//! | `startup_timeout` | total wall clock for `start`, across retries | 10 s |
//! | `shutdown_timeout` | close handshake on `stop` | 10 s |
//! | `data_timeout` | acquiring the outbound send mutex | 10 s |
//! | `command_timeout` | per-command deadline (overridable per call) | 5 s |
//! | `buffer_size` | inbound read buffer in bytes | 4096 |

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// Constants
// ============================================================================

/// Default wall-clock budget for `start`, including connect retries.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Default budget for the close handshake during `stop`.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Default budget for acquiring the outbound send mutex.
pub const DEFAULT_DATA_TIMEOUT: Duration = Duration::from_secs(10);

/// Default per-command deadline.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Default inbound read buffer size in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

// ============================================================================
// DriverConfig
// ============================================================================

/// Timeouts and buffer sizing for one driver session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    /// Total wall-clock budget for `start`, across all connect attempts.
    pub startup_timeout: Duration,

    /// Budget for the WebSocket close handshake during `stop`.
    pub shutdown_timeout: Duration,

    /// Budget for acquiring the outbound send mutex.
    pub data_timeout: Duration,

    /// Default per-command deadline; overridable per `execute` call.
    pub command_timeout: Duration,

    /// Inbound read buffer size in bytes.
    pub buffer_size: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            data_timeout: DEFAULT_DATA_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DriverConfig::default();
        assert_eq!(config.startup_timeout, Duration::from_secs(10));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(10));
        assert_eq!(config.data_timeout, Duration::from_secs(10));
        assert_eq!(config.command_timeout, Duration::from_secs(5));
        assert_eq!(config.buffer_size, 4096);
    }
}
