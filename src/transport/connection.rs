//! WebSocket ownership and the inbound reader.
//!
//! The [`Transport`] owns exactly one client WebSocket. Outbound, it
//! serializes whole text frames under a send mutex with a bounded wait.
//! Inbound, it runs one dedicated reader task that turns the socket's
//! frames into complete UTF-8 text messages and forwards each on the
//! inbound channel handed out at construction time.
//!
//! # Socket States
//!
//! ```text
//! Idle → Connecting → Open → (CloseSent | CloseReceived) → Closed | Aborted
//! ```
//!
//! `Idle`, `Closed`, and `Aborted` are "not active"; all other states are
//! active. A socket observed in a terminal state is replaced wholesale by
//! the next `start`.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout};
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, WebSocketConfig};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async_with_config};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::DriverConfig;
use crate::dispatch::CommandSink;
use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Pause between connect attempts while the remote end is not ready.
const STARTUP_RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// Poll interval while waiting for the close handshake to finish.
const CLOSE_POLL_INTERVAL: Duration = Duration::from_millis(50);

// ============================================================================
// Types
// ============================================================================

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

// ============================================================================
// SocketState
// ============================================================================

/// Lifecycle state of the underlying socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    /// No socket yet, or the previous one was replaced.
    Idle,
    /// Handshake in progress.
    Connecting,
    /// Connected; traffic flows.
    Open,
    /// We sent the close frame and await the peer's echo.
    CloseSent,
    /// The peer sent a close frame first.
    CloseReceived,
    /// Close handshake finished.
    Closed,
    /// Connection ended without a close handshake.
    Aborted,
}

impl SocketState {
    /// Returns `true` while the socket can carry traffic or is being set
    /// up or torn down.
    #[inline]
    #[must_use]
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Idle | Self::Closed | Self::Aborted)
    }

    /// Returns `true` for states the next `start` replaces wholesale.
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Aborted)
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Owns one client WebSocket: connect-with-retry, serialized sends, one
/// inbound reader, graceful close.
///
/// Construction hands back the receiving end of the inbound channel;
/// every complete text message the reader assembles is forwarded there.
pub struct Transport {
    /// Session configuration (timeouts, buffer size).
    config: DriverConfig,

    /// Socket lifecycle state, shared with the reader task.
    state: Arc<Mutex<SocketState>>,

    /// Send half of the socket. The async mutex is the send mutex: at
    /// most one outbound frame is in flight at any instant.
    sink: Arc<AsyncMutex<Option<WsSink>>>,

    /// Inbound reader task, one per live socket.
    reader: Mutex<Option<JoinHandle<()>>>,

    /// Cancellation for the current reader; replaced on each `start`.
    cancel: Mutex<CancellationToken>,

    /// Producer side of the inbound channel.
    incoming: mpsc::UnboundedSender<String>,

    /// URL of the current connection; empty when stopped.
    url: Mutex<String>,
}

impl Transport {
    /// Creates an unconnected transport.
    ///
    /// Returns the transport and the consumer end of its inbound channel.
    #[must_use]
    pub fn new(config: DriverConfig) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (incoming, receiver) = mpsc::unbounded_channel();
        let transport = Self {
            config,
            state: Arc::new(Mutex::new(SocketState::Idle)),
            sink: Arc::new(AsyncMutex::new(None)),
            reader: Mutex::new(None),
            cancel: Mutex::new(CancellationToken::new()),
            incoming,
            url: Mutex::new(String::new()),
        };
        (transport, receiver)
    }

    /// Returns the current socket state.
    #[inline]
    #[must_use]
    pub fn socket_state(&self) -> SocketState {
        *self.state.lock()
    }

    /// Returns `true` while a socket is active.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.socket_state().is_active()
    }

    /// Returns the URL of the current connection, or an empty string.
    #[must_use]
    pub fn url(&self) -> String {
        self.url.lock().clone()
    }

    /// Opens the WebSocket and spawns the inbound reader.
    ///
    /// While the remote end is not ready (connection refused and
    /// friends), attempts are repeated every ~500 ms until the startup
    /// timeout elapses. A socket observed in a terminal state is replaced.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyStarted`] if a socket is already active.
    /// - [`Error::StartupTimeout`] if no attempt succeeded in time.
    /// - [`Error::WebSocket`] for non-retryable handshake failures.
    pub async fn start(&self, url: &str) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.is_active() {
                return Err(Error::AlreadyStarted);
            }
            // Closed/Aborted sockets are replaced wholesale
            *state = SocketState::Connecting;
        }

        // a reader from a previous connection has already observed the
        // terminal state; reap it
        let stale = self.reader.lock().take();
        if let Some(stale) = stale {
            let _ = stale.await;
        }
        self.sink.lock().await.take();

        let deadline = Instant::now() + self.config.startup_timeout;
        let stream = loop {
            match connect_async_with_config(url, Some(self.ws_config()), false).await {
                Ok((stream, _response)) => break stream,
                Err(error) if is_not_ready(&error) => {
                    if Instant::now() + STARTUP_RETRY_INTERVAL >= deadline {
                        *self.state.lock() = SocketState::Idle;
                        return Err(Error::startup_timeout(self.config.startup_timeout));
                    }
                    trace!(error = %error, "remote end not ready, retrying");
                    sleep(STARTUP_RETRY_INTERVAL).await;
                }
                Err(error) => {
                    *self.state.lock() = SocketState::Idle;
                    return Err(error.into());
                }
            }
        };

        let (sink, source) = stream.split();
        *self.sink.lock().await = Some(sink);
        *self.state.lock() = SocketState::Open;
        *self.url.lock() = url.to_owned();

        let cancel = CancellationToken::new();
        *self.cancel.lock() = cancel.clone();
        let handle = tokio::spawn(Self::read_loop(
            source,
            cancel,
            Arc::clone(&self.state),
            Arc::clone(&self.sink),
            self.incoming.clone(),
        ));
        *self.reader.lock() = Some(handle);

        debug!(url, "transport started");
        Ok(())
    }

    /// Sends one complete text message.
    ///
    /// Waits up to the data timeout for the send mutex; the mutex is
    /// released on every exit path, including send failure.
    ///
    /// # Errors
    ///
    /// - [`Error::NotStarted`] if no socket is live.
    /// - [`Error::ConnectionAborted`] if the socket died without a close
    ///   handshake.
    /// - [`Error::SendContention`] if the mutex was not acquired in time.
    /// - [`Error::WebSocket`] if the send itself failed.
    pub async fn send_text(&self, text: String) -> Result<()> {
        match self.socket_state() {
            SocketState::Aborted => {
                return Err(Error::connection_aborted(
                    "socket ended without a close handshake",
                ));
            }
            state if !state.is_active() => return Err(Error::NotStarted),
            _ => {}
        }

        let mut guard = timeout(self.config.data_timeout, self.sink.lock())
            .await
            .map_err(|_| Error::send_contention(self.config.data_timeout))?;
        let sink = guard.as_mut().ok_or(Error::NotStarted)?;

        trace!(bytes = text.len(), "sending text frame");
        sink.send(Message::Text(text.into())).await?;
        Ok(())
    }

    /// Closes the socket gracefully and joins the reader.
    ///
    /// Sends a normal-closure close frame, waits up to the shutdown
    /// timeout for the peer to finish the handshake, then cancels the
    /// reader and clears the connection URL. Idempotent: calling `stop`
    /// on an already-closed transport logs and returns.
    ///
    /// # Errors
    ///
    /// Currently infallible in practice; the signature leaves room for
    /// join failures to surface.
    pub async fn stop(&self) -> Result<()> {
        if self.is_active() {
            {
                let mut guard = self.sink.lock().await;
                if let Some(sink) = guard.as_mut() {
                    *self.state.lock() = SocketState::CloseSent;
                    let frame = CloseFrame {
                        code: CloseCode::Normal,
                        reason: "".into(),
                    };
                    if let Err(error) = sink.send(Message::Close(Some(frame))).await {
                        debug!(error = %error, "close frame not sent");
                    }
                }
            }

            let deadline = Instant::now() + self.config.shutdown_timeout;
            while Instant::now() < deadline {
                if self.socket_state().is_terminal() {
                    break;
                }
                sleep(CLOSE_POLL_INTERVAL).await;
            }
            if !self.socket_state().is_terminal() {
                warn!("close handshake did not finish within the shutdown timeout");
            }
        } else {
            debug!("transport already stopped");
        }

        self.cancel.lock().cancel();
        let reader = self.reader.lock().take();
        if let Some(reader) = reader {
            let _ = reader.await;
        }

        self.sink.lock().await.take();
        self.url.lock().clear();
        {
            let mut state = self.state.lock();
            if !matches!(*state, SocketState::Aborted) {
                *state = SocketState::Closed;
            }
        }

        debug!("transport stopped");
        Ok(())
    }

    /// Builds the socket configuration from the driver config.
    fn ws_config(&self) -> WebSocketConfig {
        WebSocketConfig::default().read_buffer_size(self.config.buffer_size)
    }

    /// Inbound reader: runs until cancellation or terminal socket state.
    ///
    /// Fragmented frames are reassembled into whole messages by the
    /// protocol layer, bounded by the configured read buffer; each
    /// complete non-empty UTF-8 text message is forwarded on the inbound
    /// channel. Server-initiated closes are acknowledged by the protocol
    /// layer and treated as clean termination. The socket handle is
    /// released on every exit path.
    async fn read_loop(
        mut source: WsSource,
        cancel: CancellationToken,
        state: Arc<Mutex<SocketState>>,
        sink: Arc<AsyncMutex<Option<WsSink>>>,
        incoming: mpsc::UnboundedSender<String>,
    ) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("inbound reader cancelled");
                    break;
                }
                message = source.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        if text.is_empty() {
                            trace!("empty message suppressed");
                            continue;
                        }
                        if incoming.send(text.as_str().to_owned()).is_err() {
                            debug!("inbound channel gone, reader exiting");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "close frame received");
                        let mut state = state.lock();
                        if !matches!(*state, SocketState::CloseSent) {
                            *state = SocketState::CloseReceived;
                        }
                        // the protocol layer echoes the close; keep reading
                        // until the stream reports the handshake finished
                    }
                    // binary, ping, and pong frames carry no messages
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        warn!(error = %error, "websocket read failed");
                        *state.lock() = SocketState::Aborted;
                        break;
                    }
                    None => {
                        debug!("websocket stream ended");
                        let mut state = state.lock();
                        *state = if matches!(*state, SocketState::CloseSent | SocketState::CloseReceived) {
                            SocketState::Closed
                        } else {
                            SocketState::Aborted
                        };
                        break;
                    }
                }
            }
        }

        // release the socket handle
        sink.lock().await.take();
    }
}

// ============================================================================
// CommandSink
// ============================================================================

#[async_trait]
impl CommandSink for Transport {
    async fn send_text(&self, text: String) -> Result<()> {
        Transport::send_text(self, text).await
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Returns `true` for handshake failures that mean "server not ready".
fn is_not_ready(error: &WsError) -> bool {
    use std::io::ErrorKind;

    match error {
        WsError::Io(io) => matches!(
            io.kind(),
            ErrorKind::ConnectionRefused
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::NotConnected
        ),
        _ => false,
    }
}

// ============================================================================
// Tests
// ============================================================================
