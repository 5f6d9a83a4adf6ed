//! Typed wrappers for the `session` module.
//!
//! Commands: `session.status`, `session.subscribe`, `session.unsubscribe`,
//! `session.end`.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use super::codec::{BidiCommand, EmptyResult};

// ============================================================================
// session.status
// ============================================================================

/// `session.status`: asks whether the remote end is ready for new sessions.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Status {}

/// Result of [`Status`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResult {
    /// Whether the remote end accepts new sessions.
    pub ready: bool,

    /// Implementation-defined status text.
    pub message: String,
}

impl BidiCommand for Status {
    const METHOD: &'static str = "session.status";
    type Output = StatusResult;
}

// ============================================================================
// session.subscribe
// ============================================================================

/// `session.subscribe`: asks the remote end to start emitting the named
/// events.
///
/// Remote subscription is distinct from local handler registration
/// ([`Driver::on`](crate::driver::Driver::on)): the remote end will not
/// emit an event nobody subscribed to, and the router will not deliver an
/// event nobody registered a handler for.
#[derive(Debug, Clone, Serialize)]
pub struct Subscribe {
    /// Event method names to subscribe to.
    pub events: Vec<String>,

    /// Browsing contexts to scope the subscription to; empty means global.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contexts: Vec<String>,
}

impl Subscribe {
    /// Creates a global subscription to the given events.
    #[must_use]
    pub fn to_events<I, S>(events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            events: events.into_iter().map(Into::into).collect(),
            contexts: Vec::new(),
        }
    }
}

impl BidiCommand for Subscribe {
    const METHOD: &'static str = "session.subscribe";
    type Output = EmptyResult;
}

// ============================================================================
// session.unsubscribe
// ============================================================================

/// `session.unsubscribe`: asks the remote end to stop emitting the named
/// events.
#[derive(Debug, Clone, Serialize)]
pub struct Unsubscribe {
    /// Event method names to unsubscribe from.
    pub events: Vec<String>,
}

impl BidiCommand for Unsubscribe {
    const METHOD: &'static str = "session.unsubscribe";
    type Output = EmptyResult;
}

// ============================================================================
// session.end
// ============================================================================

/// `session.end`: terminates the remote session.
///
/// The local session still has to be torn down with
/// [`Driver::stop`](crate::driver::Driver::stop) afterwards.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct End {}

impl BidiCommand for End {
    const METHOD: &'static str = "session.end";
    type Output = EmptyResult;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_params_is_empty_object() {
        let params = Status {}.params().expect("params");
        assert_eq!(params, json!({}));
    }

    #[test]
    fn test_status_result_decodes() {
        let result: StatusResult =
            serde_json::from_value(json!({ "ready": true, "message": "ok" })).expect("decode");
        assert!(result.ready);
        assert_eq!(result.message, "ok");
    }

    #[test]
    fn test_subscribe_omits_empty_contexts() {
        let params = Subscribe::to_events(["log.entryAdded"])
            .params()
            .expect("params");
        assert_eq!(params, json!({ "events": ["log.entryAdded"] }));
    }

    #[test]
    fn test_subscribe_with_contexts() {
        let command = Subscribe {
            events: vec!["log.entryAdded".to_owned()],
            contexts: vec!["ctx-1".to_owned()],
        };
        let params = command.params().expect("params");
        assert_eq!(
            params,
            json!({ "events": ["log.entryAdded"], "contexts": ["ctx-1"] })
        );
    }

    #[test]
    fn test_method_names() {
        assert_eq!(Status::METHOD, "session.status");
        assert_eq!(Subscribe::METHOD, "session.subscribe");
        assert_eq!(Unsubscribe::METHOD, "session.unsubscribe");
        assert_eq!(End::METHOD, "session.end");
    }
}
