//! Live realtime connections keyed by user id
//!
//! The registry never owns a socket. Each session task owns its socket and
//! hands the registry a [`ConnectionHandle`]: a role tag plus the sending end
//! of the session's bounded outbound queue. When the session ends the queue
//! closes and sends to it are skipped. A full queue means the peer is not
//! reading; frames for it are dropped rather than buffered.

use dashmap::DashMap;
use roadside_common::{Role, WsEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, warn};

use crate::metrics;

pub type ConnectionId = u64;

/// Frames a session's writer forwards to its socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Ping,
    Close { code: u16, reason: String },
}

/// Non-owning reference to one live socket
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    role: Role,
    tx: mpsc::Sender<Outbound>,
}

impl ConnectionHandle {
    #[must_use]
    pub const fn new(id: ConnectionId, role: Role, tx: mpsc::Sender<Outbound>) -> Self {
        Self { id, role, tx }
    }

    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// False once the owning session has gone away
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Best-effort send; returns whether the frame was queued
    pub fn send(&self, frame: Outbound) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(connection_id = self.id, "Outbound queue full, dropping frame");
                metrics::record_frame_dropped();
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

/// Concurrent multi-map of user id to that user's live connections
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<String, Vec<ConnectionHandle>>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id for a new session
    pub fn next_connection_id(&self) -> ConnectionId {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Register a connection. Adding the same connection twice is a no-op.
    pub fn add(&self, user_id: &str, handle: ConnectionHandle) {
        let mut set = self.connections.entry(user_id.to_string()).or_default();
        if set.iter().any(|existing| existing.id == handle.id) {
            return;
        }
        info!(user_id, connection_id = handle.id, role = %handle.role, "Connection registered");
        set.push(handle);
        drop(set);
        metrics::set_ws_connections(self.connection_count());
    }

    /// Unregister one connection by identity. Drops the user's entry once empty.
    pub fn remove(&self, user_id: &str, connection_id: ConnectionId) -> bool {
        let removed = self
            .connections
            .get_mut(user_id)
            .is_some_and(|mut set| {
                let before = set.len();
                set.retain(|handle| handle.id != connection_id);
                set.len() != before
            });
        self.connections.remove_if(user_id, |_, set| set.is_empty());

        if removed {
            info!(user_id, connection_id, "Connection unregistered");
            metrics::set_ws_connections(self.connection_count());
        }
        removed
    }

    /// Whether a user currently has a registry entry
    #[must_use]
    pub fn contains_user(&self, user_id: &str) -> bool {
        self.connections.contains_key(user_id)
    }

    /// Live connections for one user
    #[must_use]
    pub fn user_connection_count(&self, user_id: &str) -> usize {
        self.connections.get(user_id).map_or(0, |set| set.len())
    }

    /// Total registered connections across all users
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.iter().map(|entry| entry.value().len()).sum()
    }

    /// Send to every connection of one user. Returns sockets reached.
    pub fn broadcast_to_user(&self, user_id: &str, event: &WsEvent) -> usize {
        let targets = self
            .connections
            .get(user_id)
            .map(|set| set.value().clone())
            .unwrap_or_default();
        Self::deliver(&targets, event)
    }

    /// Providers are users; their dashboards connect under their own id
    pub fn broadcast_to_provider(&self, provider_id: &str, event: &WsEvent) -> usize {
        self.broadcast_to_user(provider_id, event)
    }

    /// Send to every admin connection across all users
    pub fn broadcast_to_admins(&self, event: &WsEvent) -> usize {
        let targets: Vec<ConnectionHandle> = self
            .connections
            .iter()
            .flat_map(|entry| {
                entry
                    .value()
                    .iter()
                    .filter(|handle| handle.role == Role::Admin)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();
        Self::deliver(&targets, event)
    }

    fn deliver(targets: &[ConnectionHandle], event: &WsEvent) -> usize {
        if targets.is_empty() {
            return 0;
        }

        let frame = match event.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                error!(kind = event.kind(), "Failed to serialize event: {}", e);
                return 0;
            }
        };

        let reached = targets
            .iter()
            .filter(|handle| handle.send(Outbound::Text(frame.clone())))
            .count();
        debug!(kind = event.kind(), targets = targets.len(), reached, "Event delivered");
        reached
    }
}
