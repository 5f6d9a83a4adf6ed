//! Driver configuration builder.
//!
//! Use [`Driver::builder()`](crate::driver::Driver::builder) to tune the
//! session before constructing it:
//!
//! ```ignore
//! let driver = Driver::builder()
//!     .command_timeout(Duration::from_secs(30))
//!     .buffer_size(16 * 1024)
//!     .build();
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::config::DriverConfig;

use super::core::Driver;

// ============================================================================
// DriverBuilder
// ============================================================================

/// Configures and constructs a [`Driver`].
///
/// All knobs default to the values in [`DriverConfig::default`].
#[derive(Debug, Clone, Default)]
pub struct DriverBuilder {
    config: DriverConfig,
}

impl DriverBuilder {
    /// Creates a builder with default configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the total wall-clock budget for `start`, across all connect
    /// attempts.
    #[inline]
    #[must_use]
    pub fn startup_timeout(mut self, timeout: Duration) -> Self {
        self.config.startup_timeout = timeout;
        self
    }

    /// Sets the budget for the close handshake during `stop`.
    #[inline]
    #[must_use]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout = timeout;
        self
    }

    /// Sets the budget for acquiring the outbound send mutex.
    #[inline]
    #[must_use]
    pub fn data_timeout(mut self, timeout: Duration) -> Self {
        self.config.data_timeout = timeout;
        self
    }

    /// Sets the default per-command deadline.
    ///
    /// Individual `execute` calls may still override it.
    #[inline]
    #[must_use]
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.config.command_timeout = timeout;
        self
    }

    /// Sets the inbound read buffer size in bytes.
    #[inline]
    #[must_use]
    pub fn buffer_size(mut self, bytes: usize) -> Self {
        self.config.buffer_size = bytes;
        self
    }

    /// Constructs the driver.
    ///
    /// The driver starts in the `Unstarted` state; nothing connects until
    /// [`Driver::start`] is called.
    #[must_use]
    pub fn build(self) -> Driver {
        Driver::with_config(self.config)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::driver::SessionState;

    #[test]
    fn test_builder_applies_overrides() {
        let driver = DriverBuilder::new()
            .startup_timeout(Duration::from_secs(1))
            .shutdown_timeout(Duration::from_secs(2))
            .data_timeout(Duration::from_secs(3))
            .command_timeout(Duration::from_secs(4))
            .buffer_size(8192)
            .build();

        let config = driver.config();
        assert_eq!(config.startup_timeout, Duration::from_secs(1));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(2));
        assert_eq!(config.data_timeout, Duration::from_secs(3));
        assert_eq!(config.command_timeout, Duration::from_secs(4));
        assert_eq!(config.buffer_size, 8192);
    }

    #[test]
    fn test_built_driver_is_unstarted() {
        let driver = DriverBuilder::new().build();
        assert_eq!(driver.state(), SessionState::Unstarted);
    }
}
