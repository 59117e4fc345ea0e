use std::fmt::Debug;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tollgate_common::Identity;

pub mod memory;

pub use memory::MemoryStorage;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Internal(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// A single `field = value` match condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub field: String,
    pub value: String,
}

impl Condition {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether `identity` satisfies this condition. Strings compare
    /// verbatim; numbers and booleans compare by their string form.
    pub fn matches(&self, identity: &Identity) -> bool {
        match identity.get(&self.field) {
            Some(Value::String(s)) => *s == self.value,
            Some(Value::Number(n)) => n.to_string() == self.value,
            Some(Value::Bool(b)) => b.to_string() == self.value,
            _ => false,
        }
    }
}

/// How a list of conditions is combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Any condition may match (OR).
    Any,
    /// Every condition must match (AND).
    All,
}

impl MatchMode {
    pub fn matches(&self, conditions: &[Condition], identity: &Identity) -> bool {
        match self {
            Self::Any => conditions.iter().any(|c| c.matches(identity)),
            Self::All => conditions.iter().all(|c| c.matches(identity)),
        }
    }
}

/// Looks up identity records for identifiers.
#[async_trait]
pub trait IdentityResolver: Send + Sync + 'static {
    /// Return the first record matching `conditions`, or `None`.
    ///
    /// An empty condition list never matches.
    async fn find(
        &self,
        conditions: &[Condition],
        mode: MatchMode,
    ) -> Result<Option<Identity>, StoreError>;
}

/// Identity records that can be changed after lookup.
#[async_trait]
pub trait IdentityStore: IdentityResolver {
    /// Set `field` to `value` on the first record matching `conditions`.
    ///
    /// Returns whether a record was updated.
    async fn update_identity(
        &self,
        conditions: &[Condition],
        mode: MatchMode,
        field: &str,
        value: Value,
    ) -> Result<bool, StoreError>;
}

/// Request-scoped session storage, keyed by session id.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Read the whole session document.
    async fn read_session(&self, session_id: &str) -> Result<Option<Value>, StoreError>;

    /// Write `value` at the dot path `path` inside an existing session.
    async fn write_session_value(
        &self,
        session_id: &str,
        path: &str,
        value: Value,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait Storage: IdentityStore + SessionStore + Debug {
    async fn ping(&self) -> Result<(), StoreError>;
}
