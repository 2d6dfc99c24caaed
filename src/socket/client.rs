use crate::auth::CredentialStore;
use crate::config::SocketConfig;
use crate::error::Error;
use crate::socket::wire::{self, Envelope};
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async_with_config;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Callback seam for socket consumers. All methods default to no-ops so
/// handlers implement only what they care about.
pub trait SocketHandler: Send + Sync {
    fn on_connected(&self) {}
    fn on_disconnected(&self) {}
    fn on_error(&self, _error: &str) {}
    fn on_message(&self, _envelope: Envelope) {}
}

struct DriverHandle {
    cancellation_token: CancellationToken,
    join_handle: JoinHandle<()>,
}

/// One logical real-time connection. Consumers treat it as
/// always-eventually-connected: on close or error the driver schedules a
/// single fixed-delay reconnect until `disconnect` tears it down.
pub struct SocketClient {
    config: SocketConfig,
    credentials: Arc<dyn CredentialStore>,
    handler: Arc<dyn SocketHandler>,
    state: Arc<RwLock<ConnectionState>>,
    outbound: Arc<Mutex<Option<UnboundedSender<Message>>>>,
    driver: Mutex<Option<DriverHandle>>,
}

impl SocketClient {
    pub fn new(
        config: SocketConfig,
        credentials: Arc<dyn CredentialStore>,
        handler: Arc<dyn SocketHandler>,
    ) -> Self {
        Self {
            config,
            credentials,
            handler,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            outbound: Arc::new(Mutex::new(None)),
            driver: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Spawns the driver task. No-op while a driver is already alive, so a
    /// client never owns more than one live transport.
    pub fn connect(&self) {
        let mut slot = self.driver.lock();
        if let Some(handle) = slot.as_ref() {
            if !handle.join_handle.is_finished() {
                return;
            }
        }

        let cancellation_token = CancellationToken::new();
        let join_handle = tokio::spawn(run_driver(
            self.config.clone(),
            Arc::clone(&self.credentials),
            Arc::clone(&self.handler),
            Arc::clone(&self.state),
            Arc::clone(&self.outbound),
            cancellation_token.clone(),
        ));

        *slot = Some(DriverHandle {
            cancellation_token,
            join_handle,
        });
    }

    /// Tears the connection down and cancels any pending reconnect timer.
    pub async fn disconnect(&self) {
        let handle = self.driver.lock().take();
        if let Some(handle) = handle {
            handle.cancellation_token.cancel();
            let _ = handle.join_handle.await;
        }
        *self.outbound.lock() = None;
        *self.state.write() = ConnectionState::Disconnected;
    }

    /// Fails when not connected; frames are never queued across sessions.
    pub fn send<T: Serialize>(&self, frame: &T) -> Result<(), Error> {
        if self.state() != ConnectionState::Connected {
            return Err(Error::NotConnected);
        }

        let payload = simd_json::serde::to_string(frame)?;
        let sender = self.outbound.lock();
        match sender.as_ref() {
            Some(sender) => sender
                .send(Message::Text(payload))
                .map_err(|_| Error::NotConnected),
            None => Err(Error::NotConnected),
        }
    }
}

impl Drop for SocketClient {
    fn drop(&mut self) {
        if let Some(handle) = self.driver.lock().take() {
            handle.cancellation_token.cancel();
        }
    }
}

enum SessionDirective {
    Continue,
    Closed,
}

async fn run_driver(
    config: SocketConfig,
    credentials: Arc<dyn CredentialStore>,
    handler: Arc<dyn SocketHandler>,
    state: Arc<RwLock<ConnectionState>>,
    outbound: Arc<Mutex<Option<UnboundedSender<Message>>>>,
    cancel_token: CancellationToken,
) {
    let ws_config = WebSocketConfig {
        max_message_size: Some(16 << 20),
        max_frame_size: Some(4 << 20),
        ..Default::default()
    };

    while !cancel_token.is_cancelled() {
        *state.write() = ConnectionState::Connecting;

        match connect_async_with_config(config.url.clone(), Some(ws_config), true).await {
            Ok((websocket_stream, _)) => {
                let (mut sink, mut stream) = websocket_stream.split();
                let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
                *outbound.lock() = Some(outbound_tx);
                *state.write() = ConnectionState::Connected;

                let mut session_ok = true;
                if let Some(token) = credentials.token().await {
                    match wire::auth_frame(&token) {
                        Ok(frame) => {
                            if let Err(error) = sink.send(Message::Text(frame)).await {
                                handler.on_error(&Error::from(error).to_string());
                                session_ok = false;
                            }
                        }
                        Err(error) => handler.on_error(&error.to_string()),
                    }
                }

                if session_ok {
                    handler.on_connected();

                    loop {
                        tokio::select! {
                            _ = cancel_token.cancelled() => break,
                            queued = outbound_rx.recv() => {
                                let Some(message) = queued else { break };
                                if let Err(error) = sink.send(message).await {
                                    handler.on_error(&Error::from(error).to_string());
                                    break;
                                }
                            }
                            frame = stream.next() => {
                                match frame {
                                    Some(Ok(message)) => match dispatch_frame(message, handler.as_ref()) {
                                        SessionDirective::Continue => {}
                                        SessionDirective::Closed => break,
                                    },
                                    Some(Err(error)) => {
                                        handler.on_error(&Error::from(error).to_string());
                                        break;
                                    }
                                    None => break,
                                }
                            }
                        }
                    }
                }
            }
            Err(error) => {
                handler.on_error(&Error::from(error).to_string());
            }
        }

        *outbound.lock() = None;
        *state.write() = ConnectionState::Disconnected;
        handler.on_disconnected();

        if !config.auto_reconnect || cancel_token.is_cancelled() {
            break;
        }

        // Error and close take the same path: exactly one reconnect is
        // scheduled, and teardown cancels it here.
        debug!(
            delay_ms = config.reconnect_delay_ms,
            "socket disconnected, scheduling reconnect"
        );
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            _ = tokio::time::sleep(Duration::from_millis(config.reconnect_delay_ms)) => {}
        }
    }

    *outbound.lock() = None;
    *state.write() = ConnectionState::Disconnected;
}

fn dispatch_frame(message: Message, handler: &dyn SocketHandler) -> SessionDirective {
    match message {
        Message::Text(text_payload) => {
            let mut owned_payload = text_payload.into_bytes();
            match wire::parse_envelope(owned_payload.as_mut_slice()) {
                Ok(envelope) => handler.on_message(envelope),
                Err(error) => warn!(%error, "dropping malformed socket frame"),
            }
            SessionDirective::Continue
        }
        Message::Binary(mut binary_payload) => {
            match wire::parse_envelope(binary_payload.as_mut_slice()) {
                Ok(envelope) => handler.on_message(envelope),
                Err(error) => warn!(%error, "dropping malformed binary socket frame"),
            }
            SessionDirective::Continue
        }
        Message::Close(_) => SessionDirective::Closed,
        _ => SessionDirective::Continue,
    }
}
