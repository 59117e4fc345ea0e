//! Authenticators extract credentials from a request and drive the
//! identifier chain with them.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tollgate_common::credentials::{PASSWORD, USER_SESSION_ID};

use super::{outcome::AuthOutcome, request::AuthRequest};

pub mod chain;
pub mod form;
pub mod session;

pub use chain::AuthenticatorChain;
pub use form::FormAuthenticator;
pub use session::SessionAuthenticator;

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Attempt to authenticate `request`.
    ///
    /// Authentication failures are part of the returned outcome, never
    /// errors. The `authenticator` field of the outcome is filled in by the
    /// chain, not by the authenticator itself.
    async fn authenticate(&self, request: &AuthRequest) -> AuthOutcome;

    /// Name of this authentication scheme (for debugging/logging)
    fn kind(&self) -> &'static str;
}

/// Default logical-key → source-field mapping used by form authentication.
pub(crate) fn default_form_fields() -> BTreeMap<String, String> {
    BTreeMap::from([
        (USER_SESSION_ID.to_string(), USER_SESSION_ID.to_string()),
        (PASSWORD.to_string(), PASSWORD.to_string()),
    ])
}
