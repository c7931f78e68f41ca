// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer: a namespaced key-value store and its typed facade.

pub mod firestore;
pub mod memory;
pub mod store;

pub use firestore::FirestoreDatastore;
pub use memory::MemoryDatastore;
pub use store::Store;

use async_trait::async_trait;
use serde_json::Value;

/// Record kinds as constants.
pub mod kinds {
    pub const STEPS_CHALLENGE: &str = "StepsChallenge";
    pub const CLIENT_ACCESS: &str = "ClientAccess";
    pub const FITBIT_API_ACCESS: &str = "FitbitApiAccess";
    pub const BOT_INFO: &str = "BotInfo";
    pub const TEAM_TOKEN: &str = "TeamToken";
}

/// Namespace holding records that are not scoped to a tenant.
pub const GLOBAL_NAMESPACE: &str = "global";

/// Errors from the persistent store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid record shape: {0}")]
    InvalidShape(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Missing records and malformed keys or records are permanent.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Address of a single record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    pub namespace: String,
    pub kind: &'static str,
    pub name: String,
}

impl Key {
    pub fn new(namespace: impl Into<String>, kind: &'static str, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            kind,
            name: name.into(),
        }
    }

    /// Reject keys the backends can't address.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.namespace.is_empty() || self.name.is_empty() {
            return Err(StoreError::InvalidKey(format!(
                "{}/{}/{}",
                self.namespace, self.kind, self.name
            )));
        }
        if self.name.contains('/') || self.namespace.contains('/') {
            return Err(StoreError::InvalidKey(format!(
                "'/' not allowed in {}/{}",
                self.namespace, self.name
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.kind, self.name)
    }
}

/// Namespaced key-value store backend.
#[async_trait]
pub trait Datastorer: Send + Sync {
    /// Re-establish the underlying client after a transient failure.
    async fn connect(&self) -> Result<(), StoreError>;

    async fn get(&self, key: &Key) -> Result<Value, StoreError>;

    async fn put(&self, key: &Key, value: &Value) -> Result<(), StoreError>;

    async fn delete(&self, key: &Key) -> Result<(), StoreError>;

    /// All records of `kind` within `namespace`, as `(name, value)` pairs.
    async fn query(
        &self,
        namespace: &str,
        kind: &'static str,
    ) -> Result<Vec<(String, Value)>, StoreError>;
}
