//! Routes domain events to the sockets that should see them

use roadside_common::WsEvent;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::metrics;
use crate::registry::ConnectionRegistry;

/// Who receives an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Audience {
    User(String),
    Provider(String),
    Admins,
}

/// Fan-out front for the connection registry. Delivery is best-effort:
/// nothing is queued for users who are offline.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    registry: Arc<ConnectionRegistry>,
}

impl EventDispatcher {
    #[must_use]
    pub const fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Deliver `event` to one audience. Returns sockets reached.
    pub fn dispatch(&self, audience: &Audience, event: &WsEvent) -> usize {
        let reached = match audience {
            Audience::User(user_id) => self.registry.broadcast_to_user(user_id, event),
            Audience::Provider(provider_id) => {
                self.registry.broadcast_to_provider(provider_id, event)
            }
            Audience::Admins => self.registry.broadcast_to_admins(event),
        };
        debug!(kind = event.kind(), ?audience, reached, "Dispatched event");
        metrics::record_event_dispatched(event.kind(), reached);
        reached
    }

    /// Deliver `event` to several audiences
    pub fn dispatch_all(&self, audiences: &[Audience], event: &WsEvent) -> usize {
        audiences
            .iter()
            .map(|audience| self.dispatch(audience, event))
            .sum()
    }
}
