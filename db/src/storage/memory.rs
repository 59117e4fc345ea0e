use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tollgate_common::{Identity, json_path};
use tracing::{debug, instrument};

use crate::storage::{
    Condition, IdentityResolver, IdentityStore, MatchMode, SessionStore, Storage, StoreError,
};

/// Process-local storage for identities and sessions.
///
/// Backs the demo server and the test suites. Records are held in insertion
/// order and lookups scan them linearly.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    identities: RwLock<Vec<Identity>>,
    sessions: RwLock<HashMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identities(identities: impl IntoIterator<Item = Identity>) -> Self {
        Self {
            identities: RwLock::new(identities.into_iter().collect()),
            sessions: RwLock::default(),
        }
    }

    pub async fn insert_identity(&self, identity: Identity) {
        self.identities.write().await.push(identity);
    }

    pub async fn put_session(&self, session_id: impl Into<String>, data: Value) {
        self.sessions.write().await.insert(session_id.into(), data);
    }
}

#[async_trait]
impl IdentityResolver for MemoryStorage {
    #[instrument(skip(self))]
    async fn find(
        &self,
        conditions: &[Condition],
        mode: MatchMode,
    ) -> Result<Option<Identity>, StoreError> {
        if conditions.is_empty() {
            return Ok(None);
        }

        let identities = self.identities.read().await;
        let found = identities
            .iter()
            .find(|identity| mode.matches(conditions, identity))
            .cloned();

        debug!(found = found.is_some(), "Identity lookup finished");
        Ok(found)
    }
}

#[async_trait]
impl IdentityStore for MemoryStorage {
    #[instrument(skip(self, value))]
    async fn update_identity(
        &self,
        conditions: &[Condition],
        mode: MatchMode,
        field: &str,
        value: Value,
    ) -> Result<bool, StoreError> {
        if conditions.is_empty() {
            return Ok(false);
        }

        let mut identities = self.identities.write().await;
        let Some(identity) = identities
            .iter_mut()
            .find(|identity| mode.matches(conditions, identity))
        else {
            return Ok(false);
        };

        identity.insert(field, value);
        Ok(true)
    }
}

#[async_trait]
impl SessionStore for MemoryStorage {
    async fn read_session(&self, session_id: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    #[instrument(skip(self, value))]
    async fn write_session_value(
        &self,
        session_id: &str,
        path: &str,
        value: Value,
    ) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))?;
        json_path::insert(session, path, value);
        Ok(())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
