//! Realtime session server
//!
//! Each upgraded socket runs one session task through
//! `Connecting -> AuthPending -> Authenticated -> Closed`. A socket that does
//! not send a valid `auth` frame before the auth timeout is closed with the
//! configured close code and never registered. Authenticated sockets are
//! pinged on the heartbeat interval until the socket stops accepting writes.

use axum::{
    extract::{
        State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use roadside_common::{ClientMessage, Role, WsEvent};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
    time::Instant,
};
use tracing::{debug, error, info, warn};

use crate::{
    config::WebSocketConfig,
    metrics,
    registry::{ConnectionHandle, ConnectionId, ConnectionRegistry, Outbound},
};

/// Upper bound on flushing queued frames after a session ends
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Lifecycle of one realtime connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    AuthPending,
    Authenticated,
    Closed,
}

/// Identity a session authenticated as
#[derive(Debug, Clone, PartialEq, Eq)]
struct SessionIdentity {
    user_id: String,
    role: Role,
}

/// Accepts upgrades and runs sessions against a shared registry
pub struct SessionServer {
    registry: Arc<ConnectionRegistry>,
    config: WebSocketConfig,
}

impl SessionServer {
    #[must_use]
    pub const fn new(registry: Arc<ConnectionRegistry>, config: WebSocketConfig) -> Self {
        Self { registry, config }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Handle WebSocket upgrade request
    pub async fn handle_upgrade(
        State(server): State<Arc<Self>>,
        ws: WebSocketUpgrade,
    ) -> Response {
        debug!("WebSocket upgrade request");
        ws.on_upgrade(move |socket| server.run_session(socket))
    }

    /// Drive one socket from connect to close
    pub async fn run_session(self: Arc<Self>, socket: WebSocket) {
        let connection_id = self.registry.next_connection_id();
        let mut state = SessionState::Connecting;
        debug!(connection_id, ?state, "Socket connected");

        let (sink, mut stream) = socket.split();
        let (tx, rx) = mpsc::channel(self.config.outbound_queue_capacity.max(1));
        let mut writer = spawn_writer(connection_id, sink, rx);

        state = SessionState::AuthPending;
        let auth_deadline = tokio::time::sleep(self.config.auth_timeout());
        tokio::pin!(auth_deadline);

        let period = self.config.heartbeat_interval();
        let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
        let mut identity: Option<SessionIdentity> = None;

        loop {
            tokio::select! {
                () = &mut auth_deadline, if state == SessionState::AuthPending => {
                    warn!(connection_id, "Authentication timeout, closing socket");
                    metrics::record_auth_timeout();
                    let _ = tx.try_send(Outbound::Close {
                        code: self.config.auth_timeout_close_code,
                        reason: "Authentication timeout".to_string(),
                    });
                    break;
                }
                _ = heartbeat.tick(), if state == SessionState::Authenticated => {
                    match tx.try_send(Outbound::Ping) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            debug!(connection_id, "Outbound queue full, skipping ping");
                        }
                        Err(TrySendError::Closed(_)) => {
                            debug!(connection_id, "Socket no longer open, stopping heartbeat");
                            break;
                        }
                    }
                }
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if state == SessionState::AuthPending
                            && let Some(authenticated) = self.authenticate(connection_id, &text, &tx)
                        {
                            identity = Some(authenticated);
                            state = SessionState::Authenticated;
                            // First ping one full interval after auth
                            heartbeat.reset();
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(connection_id, "Socket closed by peer");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(connection_id, "Socket error: {}", e);
                        break;
                    }
                }
            }
        }

        state = SessionState::Closed;
        if let Some(identity) = &identity {
            self.registry.remove(&identity.user_id, connection_id);
            debug!(connection_id, role = %identity.role, "Deregistered on close");
        }
        drop(tx);
        if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await.is_err() {
            writer.abort();
        }
        debug!(connection_id, ?state, "Session finished");
    }

    /// Handle a text frame received while awaiting auth. Anything that is not a
    /// well-formed `auth` message is ignored and the socket stays open.
    fn authenticate(
        &self,
        connection_id: ConnectionId,
        text: &str,
        tx: &mpsc::Sender<Outbound>,
    ) -> Option<SessionIdentity> {
        let ClientMessage::Auth { user_id, role } = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(e) => {
                debug!(connection_id, "Ignoring malformed frame: {}", e);
                return None;
            }
        };
        if user_id.is_empty() {
            debug!(connection_id, "Ignoring auth frame without a user id");
            return None;
        }

        self.registry
            .add(&user_id, ConnectionHandle::new(connection_id, role, tx.clone()));

        match WsEvent::AuthSuccess.to_frame() {
            Ok(frame) => {
                let _ = tx.try_send(Outbound::Text(frame));
            }
            Err(e) => error!(connection_id, "Failed to encode auth ack: {}", e),
        }
        info!(connection_id, user_id = %user_id, role = %role, "Socket authenticated");
        Some(SessionIdentity { user_id, role })
    }
}

/// Forward queued frames to the socket until the queue closes or a write fails
fn spawn_writer(
    connection_id: ConnectionId,
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Outbound>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let (message, last) = match frame {
                Outbound::Text(text) => (Message::Text(text), false),
                Outbound::Ping => (Message::Ping(Vec::new()), false),
                Outbound::Close { code, reason } => (
                    Message::Close(Some(CloseFrame {
                        code,
                        reason: reason.into(),
                    })),
                    true,
                ),
            };

            if let Err(e) = sink.send(message).await {
                debug!(connection_id, "Socket write failed: {}", e);
                break;
            }
            if last {
                break;
            }
        }
        let _ = sink.close().await;
    })
}
