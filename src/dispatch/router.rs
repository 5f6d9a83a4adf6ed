//! Event fan-out to registered subscribers.
//!
//! The router maps event method names (`"log.entryAdded"`) to ordered
//! subscriber lists and delivers each event to every subscriber in
//! insertion order. It replaces the source pattern of multicast-delegate
//! signals with an explicit registry and handle-based unsubscribe.
//!
//! Delivery runs on the dispatcher's inbound-processing context; handlers
//! must not block it for long. The registry lock is released before any
//! handler runs, so a handler may subscribe or unsubscribe re-entrantly;
//! the change takes effect on the next event.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::identifiers::SubscriptionId;

// ============================================================================
// Types
// ============================================================================

/// Outcome of one handler invocation.
///
/// A failing handler is logged and skipped; it never affects other
/// handlers or the session.
pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Event handler callback type.
///
/// Called with the event's method name and raw `params` object.
pub type EventHandler = Arc<dyn Fn(&str, &Value) -> HandlerResult + Send + Sync>;

// ============================================================================
// Subscription
// ============================================================================

/// Handle to a registered subscriber.
///
/// Pass it back to [`EventRouter::unsubscribe`] to deregister. Dropping
/// the handle does not unsubscribe.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: SubscriptionId,
    method: String,
}

impl Subscription {
    /// Returns the subscriber's id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns the event method this subscription is bound to.
    #[inline]
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }
}

// ============================================================================
// EventRouter
// ============================================================================

/// Registry mapping event method names to ordered subscriber lists.
///
/// Thread-safe; all operations take `&self`.
#[derive(Default)]
pub struct EventRouter {
    inner: Mutex<RouterInner>,
}

#[derive(Default)]
struct RouterInner {
    next_id: u64,
    subscribers: FxHashMap<String, Vec<RegisteredHandler>>,
}

struct RegisteredHandler {
    id: SubscriptionId,
    handler: EventHandler,
}

impl EventRouter {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for an event method.
    ///
    /// Handlers for the same method are invoked in registration order.
    pub fn subscribe(&self, method: &str, handler: EventHandler) -> Subscription {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = SubscriptionId::new(inner.next_id);
        inner
            .subscribers
            .entry(method.to_owned())
            .or_default()
            .push(RegisteredHandler { id, handler });

        debug!(subscription = %id, method, "subscriber registered");

        Subscription {
            id,
            method: method.to_owned(),
        }
    }

    /// Removes a subscriber.
    ///
    /// Idempotent: unknown or already-removed handles are no-ops.
    pub fn unsubscribe(&self, subscription: &Subscription) {
        let mut inner = self.inner.lock();
        let emptied = if let Some(handlers) = inner.subscribers.get_mut(subscription.method()) {
            handlers.retain(|registered| registered.id != subscription.id);
            handlers.is_empty()
        } else {
            false
        };
        if emptied {
            inner.subscribers.remove(subscription.method());
        }

        debug!(subscription = %subscription.id, method = subscription.method(), "subscriber removed");
    }

    /// Delivers one event to every subscriber of `method`, in insertion
    /// order.
    ///
    /// The subscriber list is snapshotted before invocation: re-entrant
    /// registry changes take effect on the next event. A failing handler
    /// is logged and does not stop the remaining handlers.
    pub fn deliver(&self, method: &str, params: &Value) {
        let handlers: Vec<(SubscriptionId, EventHandler)> = {
            let inner = self.inner.lock();
            inner
                .subscribers
                .get(method)
                .map(|list| {
                    list.iter()
                        .map(|registered| (registered.id, Arc::clone(&registered.handler)))
                        .collect()
                })
                .unwrap_or_default()
        };

        if handlers.is_empty() {
            trace!(method, "event with no subscribers");
            return;
        }

        for (id, handler) in handlers {
            if let Err(error) = handler(method, params) {
                warn!(subscription = %id, method, error = %error, "event handler failed");
            }
        }
    }

    /// Removes every subscriber. Called on session shutdown.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let count: usize = inner.subscribers.values().map(Vec::len).sum();
        inner.subscribers.clear();
        if count > 0 {
            debug!(count, "subscriber registry cleared");
        }
    }

    /// Returns the number of subscribers for a method.
    #[must_use]
    pub fn subscriber_count(&self, method: &str) -> usize {
        self.inner
            .lock()
            .subscribers
            .get(method)
            .map_or(0, Vec::len)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use parking_lot::Mutex as PlMutex;
    use serde_json::json;

    fn recording_handler(log: Arc<PlMutex<Vec<String>>>, tag: &str) -> EventHandler {
        let tag = tag.to_owned();
        Arc::new(move |_method, params| {
            log.lock().push(format!("{tag}:{params}"));
            Ok(())
        })
    }

    #[test]
    fn test_delivery_in_registration_order() {
        let router = EventRouter::new();
        let log = Arc::new(PlMutex::new(Vec::new()));

        router.subscribe("log.entryAdded", recording_handler(Arc::clone(&log), "a"));
        router.subscribe("log.entryAdded", recording_handler(Arc::clone(&log), "b"));

        router.deliver("log.entryAdded", &json!(1));
        router.deliver("log.entryAdded", &json!(2));

        assert_eq!(*log.lock(), vec!["a:1", "b:1", "a:2", "b:2"]);
    }

    #[test]
    fn test_delivery_is_scoped_to_method() {
        let router = EventRouter::new();
        let log = Arc::new(PlMutex::new(Vec::new()));

        router.subscribe("log.entryAdded", recording_handler(Arc::clone(&log), "a"));
        router.deliver("browsingContext.load", &json!({}));

        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let router = EventRouter::new();
        let log = Arc::new(PlMutex::new(Vec::new()));

        let subscription =
            router.subscribe("log.entryAdded", recording_handler(Arc::clone(&log), "a"));
        router.unsubscribe(&subscription);
        router.unsubscribe(&subscription);

        router.deliver("log.entryAdded", &json!(1));
        assert!(log.lock().is_empty());
        assert_eq!(router.subscriber_count("log.entryAdded"), 0);
    }

    #[test]
    fn test_failing_handler_does_not_stop_later_handlers() {
        let router = EventRouter::new();
        let log = Arc::new(PlMutex::new(Vec::new()));

        router.subscribe(
            "log.entryAdded",
            Arc::new(|_method, _params| Err("boom".into())),
        );
        router.subscribe("log.entryAdded", recording_handler(Arc::clone(&log), "b"));

        router.deliver("log.entryAdded", &json!(1));
        assert_eq!(*log.lock(), vec!["b:1"]);
    }

    #[test]
    fn test_reentrant_subscribe_takes_effect_next_event() {
        let router = Arc::new(EventRouter::new());
        let log = Arc::new(PlMutex::new(Vec::new()));

        let router_clone = Arc::clone(&router);
        let log_clone = Arc::clone(&log);
        router.subscribe(
            "log.entryAdded",
            Arc::new(move |_method, _params| {
                log_clone.lock().push("outer".to_owned());
                let inner_log = Arc::clone(&log_clone);
                router_clone.subscribe(
                    "log.entryAdded",
                    Arc::new(move |_m, _p| {
                        inner_log.lock().push("inner".to_owned());
                        Ok(())
                    }),
                );
                Ok(())
            }),
        );

        router.deliver("log.entryAdded", &json!(1));
        assert_eq!(*log.lock(), vec!["outer"]);

        log.lock().clear();
        router.deliver("log.entryAdded", &json!(2));
        // the handler registered during event 1 now fires, and the outer
        // handler registers yet another
        assert_eq!(log.lock().first().map(String::as_str), Some("outer"));
        assert!(log.lock().iter().any(|entry| entry == "inner"));
    }

    #[test]
    fn test_clear_removes_everything() {
        let router = EventRouter::new();
        let log = Arc::new(PlMutex::new(Vec::new()));

        router.subscribe("a.b", recording_handler(Arc::clone(&log), "a"));
        router.subscribe("c.d", recording_handler(Arc::clone(&log), "c"));
        router.clear();

        assert_eq!(router.subscriber_count("a.b"), 0);
        assert_eq!(router.subscriber_count("c.d"), 0);
    }
}
