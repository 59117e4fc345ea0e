use std::fmt::Display;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::identity::Identity;

/// Outcome class of an authentication attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthStatus {
    Success,
    FailureCredentialsMissing,
    FailureCredentialsInvalid,
    FailureIdentityNotFound,
    FailureOther,
}

impl AuthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::FailureCredentialsMissing => "FAILURE_CREDENTIALS_MISSING",
            Self::FailureCredentialsInvalid => "FAILURE_CREDENTIALS_INVALID",
            Self::FailureIdentityNotFound => "FAILURE_IDENTITY_NOT_FOUND",
            Self::FailureOther => "FAILURE_OTHER",
        }
    }
}

impl Display for AuthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable result of an authentication attempt.
///
/// An identity is present if and only if the status is
/// [`AuthStatus::Success`]. The constructors are the only way to build a
/// result, so the invariant cannot be broken from outside.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthResult {
    status: AuthStatus,
    identity: Option<Identity>,
    errors: Vec<String>,
}

impl AuthResult {
    pub fn success(identity: Identity) -> Self {
        Self {
            status: AuthStatus::Success,
            identity: Some(identity),
            errors: Vec::new(),
        }
    }

    pub fn credentials_missing(errors: Vec<String>) -> Self {
        Self::failure(AuthStatus::FailureCredentialsMissing, errors)
    }

    pub fn credentials_invalid(errors: Vec<String>) -> Self {
        Self::failure(AuthStatus::FailureCredentialsInvalid, errors)
    }

    pub fn identity_not_found(errors: Vec<String>) -> Self {
        Self::failure(AuthStatus::FailureIdentityNotFound, errors)
    }

    pub fn other(errors: Vec<String>) -> Self {
        Self::failure(AuthStatus::FailureOther, errors)
    }

    fn failure(status: AuthStatus, errors: Vec<String>) -> Self {
        Self {
            status,
            identity: None,
            errors,
        }
    }

    pub fn status(&self) -> AuthStatus {
        self.status
    }

    pub fn is_valid(&self) -> bool {
        self.status == AuthStatus::Success
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn into_identity(self) -> Option<Identity> {
        self.identity
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}
