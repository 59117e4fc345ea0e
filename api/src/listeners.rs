//! Reactions to a successful second factor.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tollgate_common::credentials::{PASSWORD, USER_SESSION_ID};
use tollgate_db::{Condition, IdentityStore, MatchMode, PasswordHasher, SessionStore};
use tracing::{debug, info, warn};

use crate::auth::gate::{AfterIdentify, IdentifyListener};

/// Records a completed second factor in the session.
///
/// The identity matched by the form authenticator is written at the
/// completion key, where the session authenticator finds it on later
/// requests and the access gate sees the flag set.
pub struct SessionCompletion {
    store: Arc<dyn SessionStore>,
    completion_key: String,
}

impl SessionCompletion {
    pub fn new(store: Arc<dyn SessionStore>, completion_key: impl Into<String>) -> Self {
        Self {
            store,
            completion_key: completion_key.into(),
        }
    }
}

#[async_trait]
impl IdentifyListener for SessionCompletion {
    async fn after_identify(&self, event: &AfterIdentify<'_>) {
        let outcome = event.context.outcome();

        let Some(session_id) = event.context.session_id() else {
            debug!("No session to record the second factor in");
            return;
        };
        let Some(identity) = outcome.result.identity() else {
            return;
        };

        match self
            .store
            .write_session_value(session_id, &self.completion_key, identity.clone().into_value())
            .await
        {
            Ok(()) => info!(authenticator = %event.authenticator, "Second factor recorded"),
            Err(e) => warn!(error = %e, "Failed to record the second factor"),
        }
    }
}

/// Replaces a stored password hash made with outdated parameters.
///
/// The plaintext comes from the form's `password` field, and the record is
/// found by its `user_session_id` and updated in its `password` field. Stored hashes converge on the hasher's
/// current cost this way.
pub struct PasswordRehash {
    store: Arc<dyn IdentityStore>,
    hasher: Arc<dyn PasswordHasher>,
}

impl PasswordRehash {
    pub fn new(store: Arc<dyn IdentityStore>, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { store, hasher }
    }
}

#[async_trait]
impl IdentifyListener for PasswordRehash {
    async fn after_identify(&self, event: &AfterIdentify<'_>) {
        let context = event.context;
        let outcome = context.outcome();
        if !outcome.needs_rehash {
            return;
        }

        let password = context
            .request()
            .body()
            .and_then(|body| body.get(PASSWORD))
            .and_then(Value::as_str);
        let login = outcome
            .result
            .identity()
            .and_then(|identity| identity.get_str(USER_SESSION_ID));
        let (Some(password), Some(login)) = (password, login) else {
            debug!("Nothing to rehash the stored password with");
            return;
        };

        let hasher = Arc::clone(&self.hasher);
        let password = password.to_string();
        let hash = match tokio::task::spawn_blocking(move || hasher.hash(&password)).await {
            Ok(Ok(hash)) => hash,
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to rehash password");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Password rehash task failed");
                return;
            }
        };

        let conditions = [Condition::new(USER_SESSION_ID, login)];
        match self
            .store
            .update_identity(&conditions, MatchMode::Any, PASSWORD, Value::String(hash))
            .await
        {
            Ok(true) => info!(identifier = ?outcome.identifier, "Stored password hash upgraded"),
            Ok(false) => debug!("Identity disappeared before its hash could be upgraded"),
            Err(e) => warn!(error = %e, "Failed to store upgraded password hash"),
        }
    }
}
