//! Driver facade and session state machine.
//!
//! The [`Driver`] is the public entry point: it wires one [`Transport`],
//! one [`Dispatcher`], and one [`EventRouter`] together and guards them
//! with the session state machine.
//!
//! # Session States
//!
//! ```text
//! Unstarted ──start──► Running ──stop──► Stopped (terminal)
//! ```
//!
//! `execute` is rejected outside `Running`; `start` is rejected outside
//! `Unstarted`; `stop` is idempotent. On `stop`, the pending-command
//! table is drained with `SessionClosed` before the transport goes away.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::DriverConfig;
use crate::dispatch::{CommandSink, Dispatcher, EventRouter, HandlerResult, Subscription};
use crate::error::{Error, Result};
use crate::protocol::{BidiCommand, BidiEvent};
use crate::transport::Transport;

use super::builder::DriverBuilder;

// ============================================================================
// SessionState
// ============================================================================

/// Lifecycle state of one driver session.
///
/// Monotonic: `Stopped` is terminal. A stopped driver is not reusable;
/// construct a new one for a new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed, never started.
    Unstarted,
    /// Connected; commands and events flow.
    Running,
    /// Stopped; every operation except `stop` is rejected.
    Stopped,
}

// ============================================================================
// Types
// ============================================================================

/// Handle to the inbound dispatch loop.
#[derive(Default)]
struct DispatchLoop {
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

/// Internal shared state for the driver.
struct DriverInner {
    /// Session configuration.
    config: DriverConfig,

    /// Socket owner.
    transport: Arc<Transport>,

    /// Command multiplexer.
    dispatcher: Arc<Dispatcher>,

    /// Event fan-out registry.
    router: Arc<EventRouter>,

    /// Session state machine.
    state: Mutex<SessionState>,

    /// Consumer end of the transport's inbound channel; taken by `start`.
    incoming: Mutex<Option<mpsc::UnboundedReceiver<String>>>,

    /// The running dispatch loop, once started.
    dispatch_loop: Mutex<DispatchLoop>,
}

// ============================================================================
// Driver
// ============================================================================

/// WebDriver BiDi session driver.
///
/// Cheap to clone; all clones share one session.
///
/// # Example
///
/// ```no_run
/// use bidi_webdriver::{Driver, protocol::session::Status};
///
/// # async fn example() -> bidi_webdriver::Result<()> {
/// let driver = Driver::builder().build();
/// driver.start("ws://127.0.0.1:9222/session").await?;
///
/// let status = driver.send_command(&Status {}).await?;
/// println!("remote ready: {}", status.ready);
///
/// driver.stop().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Driver {
    inner: Arc<DriverInner>,
}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("state", &self.state())
            .field("url", &self.inner.transport.url())
            .field("pending", &self.inner.dispatcher.pending_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Driver - Construction
// ============================================================================

impl Driver {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> DriverBuilder {
        DriverBuilder::new()
    }

    /// Creates a driver with default configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(DriverConfig::default())
    }

    /// Creates a driver with the given configuration.
    #[must_use]
    pub(crate) fn with_config(config: DriverConfig) -> Self {
        let (transport, incoming) = Transport::new(config);
        let transport = Arc::new(transport);
        let router = Arc::new(EventRouter::new());
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&transport) as Arc<dyn CommandSink>,
            Arc::clone(&router),
            config.command_timeout,
        ));

        Self {
            inner: Arc::new(DriverInner {
                config,
                transport,
                dispatcher,
                router,
                state: Mutex::new(SessionState::Unstarted),
                incoming: Mutex::new(Some(incoming)),
                dispatch_loop: Mutex::new(DispatchLoop::default()),
            }),
        }
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Driver - Lifecycle
// ============================================================================

impl Driver {
    /// Connects to the remote end and starts the session.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyStarted`] if the session is running.
    /// - [`Error::SessionClosed`] if the session was stopped.
    /// - Any transport error from the connect attempt; the session stays
    ///   `Unstarted` and `start` may be retried.
    pub async fn start(&self, url: &str) -> Result<()> {
        {
            let state = self.inner.state.lock();
            match *state {
                SessionState::Unstarted => {}
                SessionState::Running => return Err(Error::AlreadyStarted),
                SessionState::Stopped => return Err(Error::SessionClosed),
            }
        }

        self.inner.transport.start(url).await?;

        let receiver = self.inner.incoming.lock().take();
        if let Some(receiver) = receiver {
            self.spawn_dispatch_loop(receiver);
        }

        *self.inner.state.lock() = SessionState::Running;
        info!(url, "session started");
        Ok(())
    }

    /// Stops the session.
    ///
    /// Every in-flight command fails with [`Error::SessionClosed`] before
    /// the transport is torn down, so the pending table is empty once the
    /// session reaches `Stopped`. Idempotent: a second call returns
    /// without error.
    ///
    /// # Errors
    ///
    /// Propagates transport teardown failures; the session is `Stopped`
    /// regardless.
    pub async fn stop(&self) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            if matches!(*state, SessionState::Stopped) {
                debug!("session already stopped");
                return Ok(());
            }
            *state = SessionState::Stopped;
        }

        // unresolved commands fail before the socket goes away
        self.inner.dispatcher.drain();

        let teardown = self.inner.transport.stop().await;

        let (cancel, task) = {
            let mut dispatch_loop = self.inner.dispatch_loop.lock();
            (dispatch_loop.cancel.take(), dispatch_loop.task.take())
        };
        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        if let Some(task) = task {
            let _ = task.await;
        }

        self.inner.router.clear();
        info!("session stopped");
        teardown
    }

    /// Returns the session state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.inner.state.lock()
    }

    /// Returns the session configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> DriverConfig {
        self.inner.config
    }

    /// Returns the number of commands awaiting a response.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.dispatcher.pending_count()
    }

    /// Spawns the loop that feeds inbound texts to the dispatcher, one at
    /// a time, preserving wire order.
    fn spawn_dispatch_loop(&self, mut receiver: mpsc::UnboundedReceiver<String>) {
        let dispatcher = Arc::clone(&self.inner.dispatcher);
        let cancel = CancellationToken::new();
        let child = cancel.clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = child.cancelled() => break,
                    message = receiver.recv() => match message {
                        Some(text) => dispatcher.dispatch_inbound(&text),
                        None => break,
                    }
                }
            }
            debug!("inbound dispatch loop ended");
        });

        *self.inner.dispatch_loop.lock() = DispatchLoop {
            cancel: Some(cancel),
            task: Some(task),
        };
    }
}

// ============================================================================
// Driver - Commands
// ============================================================================

impl Driver {
    /// Sends a raw `{method, params}` command and awaits its result.
    ///
    /// `timeout` overrides the configured per-command deadline for this
    /// call only.
    ///
    /// # Errors
    ///
    /// - [`Error::NotStarted`] before `start`, [`Error::SessionClosed`]
    ///   after `stop`.
    /// - [`Error::CommandFailed`] when the remote end answers with an
    ///   error response.
    /// - [`Error::CommandTimeout`] when the deadline expires first.
    /// - [`Error::SessionClosed`] when the session stops mid-flight.
    pub async fn execute(
        &self,
        method: &str,
        params: Value,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        {
            let state = self.inner.state.lock();
            match *state {
                SessionState::Running => {}
                SessionState::Unstarted => return Err(Error::NotStarted),
                SessionState::Stopped => return Err(Error::SessionClosed),
            }
        }

        self.inner.dispatcher.execute(method, params, timeout).await
    }

    /// Sends a typed command and decodes its typed result.
    ///
    /// # Errors
    ///
    /// Everything [`Driver::execute`] returns, plus [`Error::Json`] when
    /// the result object does not match the command's declared output.
    pub async fn send_command<C: BidiCommand>(&self, command: &C) -> Result<C::Output> {
        let result = self.execute(C::METHOD, command.params()?, None).await?;
        serde_json::from_value(result).map_err(Error::Json)
    }
}

// ============================================================================
// Driver - Events
// ============================================================================

impl Driver {
    /// Registers a handler for an event method.
    ///
    /// Handlers run on the inbound-processing context and must not block
    /// it for long. Registration is local: pair it with
    /// `session.subscribe` to make the remote end emit the events.
    pub fn on<F>(&self, method: &str, handler: F) -> Subscription
    where
        F: Fn(&str, &Value) -> HandlerResult + Send + Sync + 'static,
    {
        self.inner.router.subscribe(method, Arc::new(handler))
    }

    /// Registers a typed handler for a typed event.
    ///
    /// Payloads that fail to decode count as handler failures: logged,
    /// dropped, never propagated.
    pub fn on_event<E, F>(&self, handler: F) -> Subscription
    where
        E: BidiEvent,
        F: Fn(E::Params) + Send + Sync + 'static,
    {
        self.on(E::METHOD, move |_method, params| {
            let params: E::Params = serde_json::from_value(params.clone())?;
            handler(params);
            Ok(())
        })
    }

    /// Removes a previously registered handler. Idempotent.
    pub fn unsubscribe(&self, subscription: &Subscription) {
        self.inner.router.unsubscribe(subscription);
    }
}

// ============================================================================
// Tests
// ============================================================================
