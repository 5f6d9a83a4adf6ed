//! Command multiplexing over the transport.
//!
//! The dispatcher owns the command-id counter and the pending-command
//! table. Outbound, it serializes command envelopes and writes them
//! through the [`CommandSink`] capability; inbound, it classifies each
//! received text and routes it to the matching pending slot (responses)
//! or to the [`EventRouter`] (events).
//!
//! # Ordering
//!
//! Responses are correlated by id, never by arrival order: concurrent
//! `execute` calls are independent and their responses may interleave
//! arbitrarily. Events are delivered in wire order. Nothing is promised
//! between a command's response and events interleaved with it.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::CommandId;
use crate::protocol::{CommandEnvelope, InboundMessage};

use super::router::EventRouter;

// ============================================================================
// CommandSink
// ============================================================================

/// Narrow outbound capability the dispatcher needs from the transport.
///
/// Keeping this seam one method wide breaks the facade↔transport cycle
/// and lets tests drive the dispatcher without a socket.
#[async_trait]
pub trait CommandSink: Send + Sync {
    /// Sends one complete text message to the remote end.
    async fn send_text(&self, text: String) -> Result<()>;
}

// ============================================================================
// Types
// ============================================================================

/// One entry in the pending-command table.
struct PendingCommand {
    /// Originating method name, kept for error context.
    method: String,

    /// Single-shot completion channel back to the awaiting caller.
    complete: oneshot::Sender<CommandOutcome>,
}

/// How a pending command resolved.
#[derive(Debug)]
enum CommandOutcome {
    /// Matching success response: the raw `result` object.
    Success(Value),

    /// Matching error response.
    Failed {
        error: String,
        message: String,
        stacktrace: Option<String>,
    },

    /// The session shut down with the command still in flight.
    Closed,
}

impl CommandOutcome {
    fn into_result(self) -> Result<Value> {
        match self {
            Self::Success(result) => Ok(result),
            Self::Failed {
                error,
                message,
                stacktrace,
            } => Err(Error::command_failed(error, message, stacktrace)),
            Self::Closed => Err(Error::SessionClosed),
        }
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Multiplexes commands and events over one transport.
///
/// Thread-safe; shared behind an `Arc` by the facade and the inbound
/// dispatch loop.
pub struct Dispatcher {
    /// Outbound capability.
    sink: Arc<dyn CommandSink>,

    /// Event fan-out for inbound `type = "event"` messages.
    router: Arc<EventRouter>,

    /// Deadline applied when `execute` gets no per-call override.
    default_timeout: Duration,

    /// Last issued command id; `0` before the first command.
    last_id: Mutex<u64>,

    /// Pending-command table, keyed by issued id.
    pending: Mutex<FxHashMap<CommandId, PendingCommand>>,
}

impl Dispatcher {
    /// Creates a dispatcher over the given sink and router.
    #[must_use]
    pub fn new(sink: Arc<dyn CommandSink>, router: Arc<EventRouter>, default_timeout: Duration) -> Self {
        Self {
            sink,
            router,
            default_timeout,
            last_id: Mutex::new(0),
            pending: Mutex::new(FxHashMap::default()),
        }
    }

    /// Sends a command and awaits its outcome.
    ///
    /// Completes in exactly one of four ways:
    ///
    /// 1. Matching success response → the raw `result` object.
    /// 2. Matching error response → [`Error::CommandFailed`].
    /// 3. Deadline expiry → [`Error::CommandTimeout`]; the pending slot is
    ///    removed and a late response will be logged and dropped.
    /// 4. Session shutdown → [`Error::SessionClosed`].
    ///
    /// # Errors
    ///
    /// Besides the four outcomes above: [`Error::IdExhausted`] if the id
    /// counter reached its ceiling, serialization failures, and transport
    /// failures from the underlying send (the slot is removed before any
    /// of these propagate).
    pub async fn execute(
        &self,
        method: &str,
        params: Value,
        timeout_override: Option<Duration>,
    ) -> Result<Value> {
        let id = self.allocate_id()?;
        let (complete, mut response) = oneshot::channel();

        self.pending.lock().insert(
            id,
            PendingCommand {
                method: method.to_owned(),
                complete,
            },
        );
        trace!(%id, method, "command registered");

        let envelope = CommandEnvelope {
            id,
            method: method.to_owned(),
            params,
        };
        let text = match serde_json::to_string(&envelope) {
            Ok(text) => text,
            Err(error) => {
                self.pending.lock().remove(&id);
                return Err(error.into());
            }
        };

        if let Err(error) = self.sink.send_text(text).await {
            self.pending.lock().remove(&id);
            return Err(error);
        }

        let limit = timeout_override.unwrap_or(self.default_timeout);
        match timeout(limit, &mut response).await {
            Ok(Ok(outcome)) => outcome.into_result(),
            // completion sender dropped without a verdict: the dispatcher
            // itself went away
            Ok(Err(_)) => Err(Error::SessionClosed),
            Err(_) => {
                let slot = self.pending.lock().remove(&id);
                if slot.is_none()
                    && let Ok(outcome) = response.try_recv()
                {
                    // the response won the race against the deadline
                    return outcome.into_result();
                }
                debug!(%id, method, timeout_ms = limit.as_millis() as u64, "command deadline expired");
                Err(Error::command_timeout(method, limit))
            }
        }
    }

    /// Classifies and routes one inbound text message.
    ///
    /// Malformed JSON, unknown `type` values, and responses whose id has
    /// no pending slot are logged and dropped; one bad frame must not
    /// kill the session.
    pub fn dispatch_inbound(&self, text: &str) {
        match InboundMessage::classify(text) {
            Ok(InboundMessage::Success(response)) => {
                self.complete(response.id, CommandOutcome::Success(response.result));
            }
            Ok(InboundMessage::Error(response)) => match response.id {
                Some(id) => self.complete(
                    id,
                    CommandOutcome::Failed {
                        error: response.error,
                        message: response.message,
                        stacktrace: response.stacktrace,
                    },
                ),
                None => {
                    warn!(error = %response.error, message = %response.message, "error response without command id")
                }
            },
            Ok(InboundMessage::Event(event)) => {
                trace!(method = %event.method, "event received");
                self.router.deliver(&event.method, &event.params);
            }
            Err(violation) => warn!(%violation, "dropping inbound message"),
        }
    }

    /// Fails every pending command with [`Error::SessionClosed`].
    ///
    /// Called by the facade during shutdown, before transport teardown,
    /// so the pending table is empty by the time the session is stopped.
    pub fn drain(&self) {
        let drained: Vec<(CommandId, PendingCommand)> =
            self.pending.lock().drain().collect();
        let count = drained.len();

        for (id, slot) in drained {
            trace!(%id, method = %slot.method, "failing in-flight command on shutdown");
            let _ = slot.complete.send(CommandOutcome::Closed);
        }

        if count > 0 {
            debug!(count, "drained pending commands on shutdown");
        }
    }

    /// Returns the number of commands awaiting a response.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Allocates the next command id.
    ///
    /// Strictly increasing from 1. The critical section is a counter
    /// increment, nothing more.
    fn allocate_id(&self) -> Result<CommandId> {
        let mut last = self.last_id.lock();
        if *last == u64::MAX {
            return Err(Error::IdExhausted);
        }
        *last += 1;
        Ok(CommandId::new(*last))
    }

    /// Removes a pending slot and completes it with the given outcome.
    fn complete(&self, id: CommandId, outcome: CommandOutcome) {
        let slot = self.pending.lock().remove(&id);
        match slot {
            Some(slot) => {
                trace!(%id, method = %slot.method, "command completed");
                if slot.complete.send(outcome).is_err() {
                    // caller timed out or was cancelled between table
                    // removal and delivery
                    debug!(%id, "completion receiver already gone");
                }
            }
            None => warn!(%id, "response without pending command"),
        }
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

    /// In-memory sink recording everything the dispatcher sends.
    #[derive(Default)]
    struct RecordingSink {
        sent: PlMutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl CommandSink for RecordingSink {
        async fn send_text(&self, text: String) -> Result<()> {
            if self.fail {
                return Err(Error::NotStarted);
            }
            self.sent.lock().push(text);
            Ok(())
        }
    }

    fn dispatcher_with_sink(fail: bool) -> (Arc<Dispatcher>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink {
            sent: PlMutex::new(Vec::new()),
            fail,
        });
        let router = Arc::new(EventRouter::new());
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&sink) as Arc<dyn CommandSink>,
            router,
            Duration::from_secs(5),
        ));
        (dispatcher, sink)
    }

    fn sent_envelope(sink: &RecordingSink, index: usize) -> CommandEnvelope {
        let sent = sink.sent.lock();
        serde_json::from_str(&sent[index]).expect("sent envelope parses")
    }

    #[tokio::test]
    async fn test_round_trip_success() {
        let (dispatcher, sink) = dispatcher_with_sink(false);

        let pending = Arc::clone(&dispatcher);
        let call = tokio::spawn(async move {
            pending
                .execute("session.status", json!({}), None)
                .await
        });

        // wait for the command to hit the wire
        while sink.sent.lock().is_empty() {
            tokio::task::yield_now().await;
        }
        let envelope = sent_envelope(&sink, 0);
        assert_eq!(envelope.id, CommandId::new(1));
        assert_eq!(envelope.method, "session.status");

        dispatcher.dispatch_inbound(r#"{"type":"success","id":1,"result":{"ready":true}}"#);

        let result = call.await.expect("join").expect("command succeeds");
        assert_eq!(result, json!({ "ready": true }));
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_remote_error_surfaces_as_command_failed() {
        let (dispatcher, sink) = dispatcher_with_sink(false);

        let pending = Arc::clone(&dispatcher);
        let call = tokio::spawn(async move {
            pending
                .execute("browsingContext.navigate", json!({ "url": "::" }), None)
                .await
        });

        while sink.sent.lock().is_empty() {
            tokio::task::yield_now().await;
        }
        dispatcher.dispatch_inbound(
            r#"{"type":"error","id":1,"error":"invalid argument","message":"bad url"}"#,
        );

        let err = call.await.expect("join").expect_err("command fails");
        match err {
            Error::CommandFailed { error, message, stacktrace } => {
                assert_eq!(error, "invalid argument");
                assert_eq!(message, "bad url");
                assert_eq!(stacktrace, None);
            }
            other => panic!("expected CommandFailed, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_ids_are_strictly_monotonic() {
        let (dispatcher, sink) = dispatcher_with_sink(false);

        for expected in 1..=3u64 {
            let pending = Arc::clone(&dispatcher);
            let call = tokio::spawn(async move {
                pending.execute("session.status", json!({}), None).await
            });
            while sink.sent.lock().len() < expected as usize {
                tokio::task::yield_now().await;
            }
            dispatcher.dispatch_inbound(&format!(
                r#"{{"type":"success","id":{expected},"result":{{}}}}"#
            ));
            call.await.expect("join").expect("succeeds");

            let envelope = sent_envelope(&sink, expected as usize - 1);
            assert_eq!(envelope.id, CommandId::new(expected));
        }
    }

    #[tokio::test]
    async fn test_interleaved_responses_resolve_their_own_callers() {
        let (dispatcher, sink) = dispatcher_with_sink(false);

        let mut calls = Vec::new();
        for _ in 0..3 {
            let pending = Arc::clone(&dispatcher);
            calls.push(tokio::spawn(async move {
                pending.execute("session.status", json!({}), None).await
            }));
            // issue strictly in order so ids are 1, 2, 3
            while dispatcher.pending_count() < calls.len() {
                tokio::task::yield_now().await;
            }
        }
        assert_eq!(sink.sent.lock().len(), 3);

        // respond out of order: 3, 1, 2
        for id in [3, 1, 2] {
            dispatcher.dispatch_inbound(&format!(
                r#"{{"type":"success","id":{id},"result":{{"echo":{id}}}}}"#
            ));
        }

        for (index, call) in calls.into_iter().enumerate() {
            let result = call.await.expect("join").expect("succeeds");
            assert_eq!(result, json!({ "echo": index as u64 + 1 }));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_removes_slot_and_late_response_is_dropped() {
        let (dispatcher, sink) = dispatcher_with_sink(false);

        let pending = Arc::clone(&dispatcher);
        let call = tokio::spawn(async move {
            pending
                .execute(
                    "session.status",
                    json!({}),
                    Some(Duration::from_millis(100)),
                )
                .await
        });

        while sink.sent.lock().is_empty() {
            tokio::task::yield_now().await;
        }

        tokio::time::advance(Duration::from_millis(150)).await;
        let err = call.await.expect("join").expect_err("times out");
        match err {
            Error::CommandTimeout { method, timeout_ms } => {
                assert_eq!(method, "session.status");
                assert_eq!(timeout_ms, 100);
            }
            other => panic!("expected CommandTimeout, got {other}"),
        }
        assert_eq!(dispatcher.pending_count(), 0);

        // the late reply is logged and dropped; the session keeps working
        dispatcher.dispatch_inbound(r#"{"type":"success","id":1,"result":{}}"#);

        let pending = Arc::clone(&dispatcher);
        let call = tokio::spawn(async move {
            pending.execute("session.status", json!({}), None).await
        });
        while sink.sent.lock().len() < 2 {
            tokio::task::yield_now().await;
        }
        dispatcher.dispatch_inbound(r#"{"type":"success","id":2,"result":{"ok":true}}"#);
        let result = call.await.expect("join").expect("succeeds");
        assert_eq!(result, json!({ "ok": true }));
    }

    #[tokio::test]
    async fn test_send_failure_removes_slot() {
        let (dispatcher, _sink) = dispatcher_with_sink(true);

        let err = dispatcher
            .execute("session.status", json!({}), None)
            .await
            .expect_err("sink fails");
        assert!(matches!(err, Error::NotStarted));
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_and_unknown_messages_are_dropped() {
        let (dispatcher, sink) = dispatcher_with_sink(false);

        dispatcher.dispatch_inbound("{truncated");
        dispatcher.dispatch_inbound(r#"{"type":"banana"}"#);
        dispatcher.dispatch_inbound(r#"{"type":"success","id":999,"result":{}}"#);
        dispatcher.dispatch_inbound(r#"{"type":"error","id":null,"error":"x","message":"y"}"#);

        // valid traffic still flows afterwards
        let pending = Arc::clone(&dispatcher);
        let call = tokio::spawn(async move {
            pending.execute("session.status", json!({}), None).await
        });
        while sink.sent.lock().is_empty() {
            tokio::task::yield_now().await;
        }
        dispatcher.dispatch_inbound(r#"{"type":"success","id":1,"result":{}}"#);
        call.await.expect("join").expect("succeeds");
    }

    #[tokio::test]
    async fn test_events_fan_out_in_wire_order() {
        let sink = Arc::new(RecordingSink::default());
        let router = Arc::new(EventRouter::new());
        let dispatcher = Dispatcher::new(
            sink as Arc<dyn CommandSink>,
            Arc::clone(&router),
            Duration::from_secs(5),
        );

        let seen = Arc::new(PlMutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        router.subscribe(
            "log.entryAdded",
            Arc::new(move |_method, params| {
                seen_clone.lock().push(params.clone());
                Ok(())
            }),
        );

        for index in 0..3 {
            dispatcher.dispatch_inbound(&format!(
                r#"{{"type":"event","method":"log.entryAdded","params":{{"seq":{index}}}}}"#
            ));
        }

        let seen = seen.lock();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], json!({ "seq": 0 }));
        assert_eq!(seen[2], json!({ "seq": 2 }));
    }

    #[tokio::test]
    async fn test_drain_fails_in_flight_commands_with_session_closed() {
        let (dispatcher, sink) = dispatcher_with_sink(false);

        let pending = Arc::clone(&dispatcher);
        let call = tokio::spawn(async move {
            pending.execute("session.status", json!({}), None).await
        });
        while sink.sent.lock().is_empty() {
            tokio::task::yield_now().await;
        }

        dispatcher.drain();

        let err = call.await.expect("join").expect_err("fails closed");
        assert!(matches!(err, Error::SessionClosed));
        assert_eq!(dispatcher.pending_count(), 0);
    }
}
