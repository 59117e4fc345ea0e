use axum::http::StatusCode;
use thiserror::Error;
use tollgate_db::HashError;

/// Fatal problems with the MFA configuration. Raised when chains are built,
/// never recovered locally.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No authenticators loaded. You need to load at least one authenticator.")]
    NoAuthenticators,

    #[error("Identifier `{0}` was not found.")]
    UnknownIdentifier(String),

    #[error("Authenticator `{0}` was not found.")]
    UnknownAuthenticator(String),

    #[error("Identity resolver `{0}` was not found.")]
    UnknownResolver(String),

    #[error("Password hasher `{0}` was not found.")]
    UnknownHasher(String),

    #[error("`{0}` is configured more than once in the same chain.")]
    DuplicateComponent(String),

    #[error("Invalid options for `{component}`: {source}")]
    InvalidOptions {
        component: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Password hasher for `{component}` failed: {source}")]
    Hasher {
        component: String,
        #[source]
        source: HashError,
    },
}

const DEFAULT_UNAUTHENTICATED_MESSAGE: &str = "Authentication is required to continue";

/// Raised by the access gate when the second factor has not been completed.
///
/// Travels as an error out of the gate and as a response extension out of the
/// handler stack, where the entry middleware can turn it into a redirect.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct Unauthenticated {
    message: String,
}

impl Unauthenticated {
    /// Build the signal with `message`, falling back to a generic message
    /// when none (or an empty one) is configured.
    pub fn new(message: Option<&str>) -> Self {
        let message = message
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_UNAUTHENTICATED_MESSAGE);
        Self {
            message: message.to_string(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }
}

impl Default for Unauthenticated {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthenticated_defaults_its_message() {
        assert_eq!(
            Unauthenticated::new(None).message(),
            "Authentication is required to continue"
        );
        assert_eq!(
            Unauthenticated::new(Some("")).message(),
            "Authentication is required to continue"
        );
        assert_eq!(
            Unauthenticated::new(Some("Finish MFA first")).to_string(),
            "Finish MFA first"
        );
        assert_eq!(Unauthenticated::default().status_code(), StatusCode::UNAUTHORIZED);
    }
}
