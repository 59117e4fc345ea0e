//! Session-based authentication.
//!
//! Succeeds when the session already records a completed second factor. The
//! value found at `sessionKey` becomes the identity, optionally re-checked
//! against the identifier chain.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tollgate_common::{AuthResult, Credentials, Identity, credentials::USER_SESSION_ID, json_path};
use tracing::{debug, instrument};

use super::Authenticator;
use crate::auth::{
    error::ConfigError, identifiers::IdentifierChain, options::parse_options,
    outcome::AuthOutcome, request::AuthRequest,
};

pub const DEFAULT_SESSION_KEY: &str = "Auth.session.is_mfa_completed";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SessionConfig {
    #[serde(default = "default_session_key")]
    pub session_key: String,

    /// Re-run the identifier chain with credentials projected from the
    /// session value.
    #[serde(default)]
    pub identify: bool,

    #[serde(default = "default_session_fields")]
    pub fields: BTreeMap<String, String>,
}

fn default_session_key() -> String {
    DEFAULT_SESSION_KEY.to_string()
}

fn default_session_fields() -> BTreeMap<String, String> {
    BTreeMap::from([(USER_SESSION_ID.to_string(), USER_SESSION_ID.to_string())])
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_key: default_session_key(),
            identify: false,
            fields: default_session_fields(),
        }
    }
}

pub struct SessionAuthenticator {
    identifiers: Arc<IdentifierChain>,
    config: SessionConfig,
}

impl SessionAuthenticator {
    pub const KIND: &'static str = "session";

    pub fn new(identifiers: Arc<IdentifierChain>, config: SessionConfig) -> Self {
        Self {
            identifiers,
            config,
        }
    }

    pub fn from_options(
        name: &str,
        options: &Map<String, Value>,
        identifiers: Arc<IdentifierChain>,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(identifiers, parse_options(name, options)?))
    }

    /// Project the configured fields of the session value into credentials.
    /// Missing fields and values without a string form are skipped.
    fn credentials(&self, value: &Value) -> Credentials {
        self.config
            .fields
            .iter()
            .filter_map(|(key, field)| {
                let field_value = match value {
                    Value::Object(map) => map.get(field)?,
                    _ => return None,
                };
                json_path::scalar_to_string(field_value).map(|s| (key.clone(), s))
            })
            .collect()
    }
}

#[async_trait]
impl Authenticator for SessionAuthenticator {
    #[instrument(skip_all, fields(kind = "session"))]
    async fn authenticate(&self, request: &AuthRequest) -> AuthOutcome {
        let Some(value) = request
            .session_value(&self.config.session_key)
            .filter(|v| json_path::is_truthy(v))
        else {
            debug!(session_key = %self.config.session_key, "No completed factor in session");
            return AuthResult::identity_not_found(Vec::new()).into();
        };

        if !self.config.identify {
            return AuthResult::success(Identity::from_value(value.clone())).into();
        }

        let identification = self.identifiers.identify(&self.credentials(value)).await;
        match identification.identified {
            Some(identified) => AuthOutcome::new(AuthResult::success(identified.identity))
                .identified_by(identification.identifier, identified.needs_rehash),
            None => {
                debug!("Session identity no longer identifies");
                AuthResult::credentials_invalid(Vec::new()).into()
            }
        }
    }

    fn kind(&self) -> &'static str {
        Self::KIND
    }
}
