//! The reconnecting socket
//!
//! One driver task owns the transport. It connects, sends the auth frame,
//! pumps frames both ways, and after any close sleeps for the backoff delay
//! before trying again. The sleep is the only pending reconnect timer; a
//! shutdown signal cancels it together with any live socket.

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use roadside_common::{
    ClientMessage, RECONNECT_BASE_DELAY_MS, RECONNECT_MAX_DELAY_MS, Role, WsEvent,
};
use serde::Serialize;
use serde_json::Value;
use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};
use tokio::{
    net::TcpStream,
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::{backoff::capped_delay, error::ClientError};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound on waiting for the driver to finish during shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `ws://` or `wss://` URL of the session endpoint
    pub url: String,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            base_delay: Duration::from_millis(RECONNECT_BASE_DELAY_MS),
            max_delay: Duration::from_millis(RECONNECT_MAX_DELAY_MS),
        }
    }

    #[must_use]
    pub fn with_backoff(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    #[must_use]
    pub fn reconnect_delay(&self, retry: u32) -> Duration {
        capped_delay(retry, self.base_delay, self.max_delay)
    }
}

/// Who this client authenticates as on every open
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
}

/// How a single connection ended
enum Ended {
    Closed,
    Shutdown,
}

struct Shared {
    config: ClientConfig,
    identity: Identity,
    connected: watch::Sender<bool>,
    last_event: watch::Sender<Option<Value>>,
    /// Writer for the currently open socket, if any
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    retry_count: AtomicU32,
}

/// A realtime connection that survives server restarts and network drops
pub struct ReconnectingSocket {
    shared: Arc<Shared>,
    shutdown: watch::Sender<bool>,
    driver: Option<JoinHandle<()>>,
}

impl ReconnectingSocket {
    /// Start connecting in the background. Must be called inside a Tokio runtime.
    pub fn connect(config: ClientConfig, identity: Identity) -> Result<Self, ClientError> {
        if !(config.url.starts_with("ws://") || config.url.starts_with("wss://")) {
            return Err(ClientError::InvalidUrl(config.url));
        }

        let (connected, _) = watch::channel(false);
        let (last_event, _) = watch::channel(None);
        let (shutdown, shutdown_rx) = watch::channel(false);

        let shared = Arc::new(Shared {
            config,
            identity,
            connected,
            last_event,
            outbound: Mutex::new(None),
            retry_count: AtomicU32::new(0),
        });
        let driver = tokio::spawn(drive(Arc::clone(&shared), shutdown_rx));

        Ok(Self {
            shared,
            shutdown,
            driver: Some(driver),
        })
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        *self.shared.connected.borrow()
    }

    /// Watch connection state changes
    #[must_use]
    pub fn connection_state(&self) -> watch::Receiver<bool> {
        self.shared.connected.subscribe()
    }

    /// Most recent JSON frame received, if any
    #[must_use]
    pub fn last_event(&self) -> Option<Value> {
        self.shared.last_event.borrow().clone()
    }

    /// Most recent frame, if it is a known domain event
    #[must_use]
    pub fn last_ws_event(&self) -> Option<WsEvent> {
        self.shared
            .last_event
            .borrow()
            .as_ref()
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Watch the latest event as it changes
    #[must_use]
    pub fn subscribe_events(&self) -> watch::Receiver<Option<Value>> {
        self.shared.last_event.subscribe()
    }

    /// Retries since the last successful open
    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.shared.retry_count.load(Ordering::Relaxed)
    }

    /// Send a JSON frame if the socket is open. Returns whether it was handed
    /// to the socket; nothing is buffered while disconnected.
    pub fn send<T: Serialize>(&self, message: &T) -> Result<bool, ClientError> {
        let frame = serde_json::to_string(message)?;
        let outbound = self.shared.outbound.lock();
        Ok(match outbound.as_ref() {
            Some(tx) if self.is_connected() => tx.send(Message::Text(frame)).is_ok(),
            _ => {
                debug!("Dropping frame while disconnected");
                false
            }
        })
    }

    /// Cancel any pending reconnect and close the socket
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(mut driver) = self.driver.take()
            && tokio::time::timeout(SHUTDOWN_GRACE, &mut driver).await.is_err()
        {
            warn!("Realtime client did not stop in time, aborting");
            driver.abort();
        }
    }
}

impl Drop for ReconnectingSocket {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}

async fn drive(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    let mut retry: u32 = 0;

    loop {
        if *shutdown.borrow_and_update() {
            break;
        }

        let attempt = tokio::select! {
            _ = shutdown.changed() => break,
            attempt = connect_async(shared.config.url.as_str()) => attempt,
        };

        match attempt {
            Ok((socket, _)) => {
                retry = 0;
                shared.retry_count.store(0, Ordering::Relaxed);
                let ended = run_connection(&shared, socket, &mut shutdown).await;
                shared.outbound.lock().take();
                shared.connected.send_replace(false);
                if matches!(ended, Ended::Shutdown) {
                    break;
                }
                info!(user_id = %shared.identity.user_id, "Realtime connection closed");
            }
            Err(e) => warn!(url = %shared.config.url, "Realtime connect failed: {}", e),
        }

        let delay = shared.config.reconnect_delay(retry);
        retry = retry.saturating_add(1);
        shared.retry_count.store(retry, Ordering::Relaxed);
        debug!(retry, delay_ms = delay.as_millis(), "Scheduling reconnect");

        tokio::select! {
            _ = shutdown.changed() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    shared.connected.send_replace(false);
    debug!("Realtime client stopped");
}

async fn run_connection(
    shared: &Shared,
    socket: Socket,
    shutdown: &mut watch::Receiver<bool>,
) -> Ended {
    let (mut sink, mut stream) = socket.split();

    let auth = ClientMessage::auth(shared.identity.user_id.clone(), shared.identity.role);
    let auth_frame = match serde_json::to_string(&auth) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("Failed to encode auth frame: {}", e);
            return Ended::Closed;
        }
    };
    if let Err(e) = sink.send(Message::Text(auth_frame)).await {
        warn!("Failed to send auth frame: {}", e);
        return Ended::Closed;
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    *shared.outbound.lock() = Some(tx);
    shared.connected.send_replace(true);
    info!(user_id = %shared.identity.user_id, "Realtime connection open");

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                let _ = sink.send(Message::Close(None)).await;
                return Ended::Shutdown;
            }
            Some(frame) = rx.recv() => {
                if let Err(e) = sink.send(frame).await {
                    warn!("Realtime send failed, closing: {}", e);
                    let _ = sink.close().await;
                    return Ended::Closed;
                }
            }
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<Value>(&text) {
                    Ok(value) => {
                        shared.last_event.send_replace(Some(value));
                    }
                    Err(_) => debug!("Dropping non-JSON frame"),
                },
                Some(Ok(Message::Close(_))) | None => return Ended::Closed,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Realtime socket error, closing: {}", e);
                    let _ = sink.close().await;
                    return Ended::Closed;
                }
            },
        }
    }
}
