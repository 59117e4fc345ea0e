//! Password identifier.
//!
//! Looks up the identity named by the `user_session_id` credential and, when
//! a `password` credential is supplied, verifies it against the stored hash.
//!
//! # Existence hiding
//!
//! An unknown identity, an identity without a stored hash, and a wrong
//! password all produce the same [`IdentifyFailure`]. When there is no
//! stored hash to check, the password is verified against a dummy hash so
//! the response time does not reveal whether the identity exists either.
//!
//! The dummy hash uses the hasher's cost unless `dummyCost` says otherwise.
//! While stored hashes still use other costs, set `dummyCost` to the highest
//! of them; records converge on the hasher's cost as they are rehashed after
//! successful logins.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tollgate_common::{
    Credentials, Identity,
    credentials::{PASSWORD, USER_SESSION_ID},
};
use tollgate_db::{Condition, HashError, IdentityResolver, MatchMode, PasswordHasher};
use tracing::{instrument, warn};

use super::{Identification, Identified, Identifier, IdentifyFailure};
use crate::auth::{
    error::ConfigError,
    options::{OneOrMany, parse_options},
    registry::{DEFAULT_COMPONENT, Registry},
};

const NOT_MATCHED: &str = "Credentials did not match any identity";
const DUMMY_PASSWORD: &str = "tollgate-dummy-password";

/// Maps logical credential keys onto identity record fields.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PasswordFields {
    /// Record field(s) compared against the `user_session_id` credential.
    /// Several fields are OR-combined.
    #[serde(default = "default_user_session_id_field")]
    pub user_session_id: OneOrMany,

    /// Record field holding the password hash.
    #[serde(default = "default_password_field")]
    pub password: String,
}

fn default_user_session_id_field() -> OneOrMany {
    OneOrMany::from(USER_SESSION_ID)
}

fn default_password_field() -> String {
    PASSWORD.to_string()
}

impl Default for PasswordFields {
    fn default() -> Self {
        Self {
            user_session_id: default_user_session_id_field(),
            password: default_password_field(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct PasswordIdentifierConfig {
    #[serde(default)]
    fields: PasswordFields,

    #[serde(default = "default_component")]
    resolver: String,

    #[serde(default = "default_component")]
    password_hasher: String,

    /// Work factor of the dummy hash checked when there is no stored hash.
    #[serde(default)]
    dummy_cost: Option<u32>,
}

fn default_component() -> String {
    DEFAULT_COMPONENT.to_string()
}

pub struct PasswordIdentifier {
    fields: PasswordFields,
    resolver: Arc<dyn IdentityResolver>,
    hasher: Arc<dyn PasswordHasher>,
    dummy_hash: String,
}

impl PasswordIdentifier {
    pub const KIND: &'static str = "password";

    pub fn new(
        fields: PasswordFields,
        resolver: Arc<dyn IdentityResolver>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Result<Self, HashError> {
        let dummy_hash = hasher.hash(DUMMY_PASSWORD)?;
        Ok(Self {
            fields,
            resolver,
            hasher,
            dummy_hash,
        })
    }

    /// Check missing identities against a dummy hash of the given cost.
    pub fn with_dummy_cost(mut self, cost: u32) -> Result<Self, HashError> {
        self.dummy_hash = self.hasher.hash_with_cost(DUMMY_PASSWORD, cost)?;
        Ok(self)
    }

    /// Build from component options, resolving the `resolver` and
    /// `passwordHasher` names through `registry`.
    pub fn from_options(
        name: &str,
        options: &Map<String, Value>,
        registry: &Registry,
    ) -> Result<Self, ConfigError> {
        let config: PasswordIdentifierConfig = parse_options(name, options)?;
        let resolver = registry.resolver(&config.resolver)?;
        let hasher = registry.hasher(&config.password_hasher)?;

        let identifier = Self::new(config.fields, resolver, hasher);
        let identifier = match config.dummy_cost {
            Some(cost) => identifier.and_then(|i| i.with_dummy_cost(cost)),
            None => identifier,
        };

        identifier.map_err(|source| ConfigError::Hasher {
            component: name.to_string(),
            source,
        })
    }

    async fn find_identity(&self, user_session_id: &str) -> Option<Identity> {
        let conditions: Vec<Condition> = self
            .fields
            .user_session_id
            .iter()
            .map(|field| Condition::new(field, user_session_id))
            .collect();

        match self.resolver.find(&conditions, MatchMode::Any).await {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "Identity lookup failed");
                None
            }
        }
    }

    async fn verify(&self, password: &str, hash: &str) -> bool {
        let hasher = Arc::clone(&self.hasher);
        let (password, hash) = (password.to_string(), hash.to_string());

        tokio::task::spawn_blocking(move || hasher.check(&password, &hash))
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Password verification task failed");
                false
            })
    }

    fn not_matched() -> IdentifyFailure {
        IdentifyFailure::with_error(NOT_MATCHED)
    }
}

#[async_trait]
impl Identifier for PasswordIdentifier {
    #[instrument(skip(self, credentials), fields(kind = "password"))]
    async fn identify(&self, credentials: &Credentials) -> Identification {
        let Some(user_session_id) = credentials.get(USER_SESSION_ID) else {
            return Err(IdentifyFailure::with_error(format!(
                "Missing `{USER_SESSION_ID}` credential"
            )));
        };

        let identity = self.find_identity(user_session_id).await;

        let Some(password) = credentials.get(PASSWORD) else {
            return identity
                .map(|mut identity| {
                    identity.remove(&self.fields.password);
                    Identified::new(identity)
                })
                .ok_or_else(Self::not_matched);
        };

        let stored = identity
            .as_ref()
            .and_then(|i| i.get_str(&self.fields.password))
            .map(str::to_string);

        let Some((mut identity, stored)) = identity.zip(stored) else {
            // Burn the same amount of work as a real check.
            self.verify(password, &self.dummy_hash).await;
            return Err(Self::not_matched());
        };

        if !self.verify(password, &stored).await {
            return Err(Self::not_matched());
        }

        identity.remove(&self.fields.password);
        Ok(Identified {
            identity,
            needs_rehash: self.hasher.needs_rehash(&stored),
        })
    }

    fn kind(&self) -> &'static str {
        Self::KIND
    }
}
