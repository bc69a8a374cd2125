//! Seams to the systems of record
//!
//! The dispatch core reads services, time blocks, users and platform settings
//! and appends audit records, but owns none of them. Each concern is an async
//! trait; [`InMemoryStore`] implements all of them for tests and demo mode.

use async_trait::async_trait;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures reported by a collaborator store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for roadside_common::ServiceError {
    fn from(err: StoreError) -> Self {
        Self::InternalError(err.to_string())
    }
}

/// A bookable service. Read-only to this core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    pub name: String,
    /// Minor currency units
    pub base_price: i64,
    pub active: bool,
}

/// A surge window over local hours.
///
/// `end_hour` is exclusive. `end_hour < start_hour` wraps past midnight,
/// so `22..6` covers 22:00 through 05:59. Equal hours cover nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeBlockConfig {
    pub id: String,
    pub name: String,
    pub start_hour: u32,
    pub end_hour: u32,
    /// Basis points, 10000 = 1.0x
    pub multiplier: i64,
    pub is_active: bool,
    /// Higher wins when blocks overlap
    pub priority: i32,
}

/// The slice of a customer record this core needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub trust_tier: i64,
    pub clean_transaction_count: u32,
}

/// One append-only audit entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub action: String,
    pub user_id: String,
    pub resource_type: String,
    pub details: serde_json::Value,
    pub ip_address: String,
    pub user_agent: String,
}

#[async_trait]
pub trait ServiceRepository: Send + Sync {
    async fn find_service(&self, service_id: &str) -> Result<Option<Service>, StoreError>;
}

#[async_trait]
pub trait TimeBlockRepository: Send + Sync {
    /// All configured blocks in stable storage order
    async fn list_time_blocks(&self) -> Result<Vec<TimeBlockConfig>, StoreError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_user(&self, user_id: &str) -> Result<Option<User>, StoreError>;
}

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError>;
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn log_audit(&self, record: AuditRecord) -> Result<(), StoreError>;
}

/// Process-local store backing every collaborator trait
#[derive(Debug, Default)]
pub struct InMemoryStore {
    services: RwLock<FxHashMap<String, Service>>,
    time_blocks: RwLock<Vec<TimeBlockConfig>>,
    users: RwLock<FxHashMap<String, User>>,
    settings: RwLock<FxHashMap<String, String>>,
    audit_log: RwLock<Vec<AuditRecord>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_service(&self, service: Service) {
        self.services.write().insert(service.id.clone(), service);
    }

    /// Replaces a block with the same id in place, otherwise appends
    pub fn upsert_time_block(&self, block: TimeBlockConfig) {
        let mut blocks = self.time_blocks.write();
        match blocks.iter_mut().find(|existing| existing.id == block.id) {
            Some(existing) => *existing = block,
            None => blocks.push(block),
        }
    }

    pub fn insert_user(&self, user: User) {
        self.users.write().insert(user.id.clone(), user);
    }

    pub fn set_setting(&self, key: impl Into<String>, value: impl Into<String>) {
        self.settings.write().insert(key.into(), value.into());
    }

    /// Snapshot of everything audited so far
    #[must_use]
    pub fn audit_log(&self) -> Vec<AuditRecord> {
        self.audit_log.read().clone()
    }

    /// A small catalog for running the gateway without a backing database
    #[must_use]
    pub fn with_demo_data() -> Self {
        let store = Self::new();
        for (id, name, base_price) in [
            ("svc-jump-start", "Jump Start", 7500),
            ("svc-tire-change", "Tire Change", 8500),
            ("svc-lockout", "Lockout", 9000),
            ("svc-tow", "Tow (up to 10 mi)", 15000),
        ] {
            store.insert_service(Service {
                id: id.to_string(),
                name: name.to_string(),
                base_price,
                active: true,
            });
        }
        store.upsert_time_block(TimeBlockConfig {
            id: "tb-overnight".to_string(),
            name: "Overnight".to_string(),
            start_hour: 22,
            end_hour: 6,
            multiplier: 15_000,
            is_active: true,
            priority: 10,
        });
        store.upsert_time_block(TimeBlockConfig {
            id: "tb-rush".to_string(),
            name: "Evening Rush".to_string(),
            start_hour: 16,
            end_hour: 19,
            multiplier: 12_500,
            is_active: true,
            priority: 5,
        });
        store
    }
}

#[async_trait]
impl ServiceRepository for InMemoryStore {
    async fn find_service(&self, service_id: &str) -> Result<Option<Service>, StoreError> {
        Ok(self.services.read().get(service_id).cloned())
    }
}

#[async_trait]
impl TimeBlockRepository for InMemoryStore {
    async fn list_time_blocks(&self) -> Result<Vec<TimeBlockConfig>, StoreError> {
        Ok(self.time_blocks.read().clone())
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().get(user_id).cloned())
    }
}

#[async_trait]
impl SettingsRepository for InMemoryStore {
    async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.settings.read().get(key).cloned())
    }
}

#[async_trait]
impl AuditSink for InMemoryStore {
    async fn log_audit(&self, record: AuditRecord) -> Result<(), StoreError> {
        self.audit_log.write().push(record);
        Ok(())
    }
}
