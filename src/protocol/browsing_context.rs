//! Typed wrappers for the `browsingContext` module.
//!
//! Only the navigation command is wrapped here; the rest of the module
//! surface belongs to downstream crates built on [`BidiCommand`].

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use super::codec::BidiCommand;

// ============================================================================
// browsingContext.navigate
// ============================================================================

/// `browsingContext.navigate`: navigates a context to a URL.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Navigate {
    /// Target browsing context id.
    pub context: String,

    /// Destination URL.
    pub url: String,

    /// Readiness state to await before the command completes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait: Option<ReadinessState>,
}

impl Navigate {
    /// Creates a navigation that returns as soon as the remote end accepts
    /// it.
    #[must_use]
    pub fn new(context: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            url: url.into(),
            wait: None,
        }
    }

    /// Awaits the given readiness state before completing.
    #[must_use]
    pub fn wait_until(mut self, state: ReadinessState) -> Self {
        self.wait = Some(state);
        self
    }
}

/// Document readiness states a navigation can await.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessState {
    /// Do not wait for the document at all.
    None,
    /// Wait for `DOMContentLoaded`.
    Interactive,
    /// Wait for the load event.
    Complete,
}

/// Result of [`Navigate`].
#[derive(Debug, Clone, Deserialize)]
pub struct NavigateResult {
    /// Id of the navigation, when the remote end tracked one.
    #[serde(default)]
    pub navigation: Option<String>,

    /// URL the context ended up at.
    pub url: String,
}

impl BidiCommand for Navigate {
    const METHOD: &'static str = "browsingContext.navigate";
    type Output = NavigateResult;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_navigate_params() {
        let params = Navigate::new("ctx-7", "https://example.com")
            .wait_until(ReadinessState::Complete)
            .params()
            .expect("params");
        assert_eq!(
            params,
            json!({
                "context": "ctx-7",
                "url": "https://example.com",
                "wait": "complete"
            })
        );
    }

    #[test]
    fn test_navigate_omits_wait_by_default() {
        let params = Navigate::new("ctx-7", "https://example.com")
            .params()
            .expect("params");
        assert_eq!(
            params,
            json!({ "context": "ctx-7", "url": "https://example.com" })
        );
    }

    #[test]
    fn test_navigate_result_decodes() {
        let result: NavigateResult = serde_json::from_value(json!({
            "navigation": "nav-1",
            "url": "https://example.com/"
        }))
        .expect("decode");
        assert_eq!(result.navigation.as_deref(), Some("nav-1"));
        assert_eq!(result.url, "https://example.com/");
    }
}
