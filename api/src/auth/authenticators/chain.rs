use tracing::{debug, instrument, trace};

use super::Authenticator;
use crate::auth::{
    error::ConfigError,
    outcome::{AuthOutcome, ComponentRef},
    request::AuthRequest,
};

/// Coordinates multiple authenticators in priority order.
///
/// # Flow
///
/// 1. Request comes in with some credentials (form body, session flag)
/// 2. The chain asks each authenticator in configured order
/// 3. The first `SUCCESS` is returned, tagged with the authenticator that
///    produced it; later authenticators never run
/// 4. If nothing succeeds, the last authenticator's outcome is returned
///
/// # Examples
///
/// ```rust,ignore
/// let chain = AuthenticatorChain::new(vec![
///     ("Session".into(), Box::new(session) as Box<dyn Authenticator>),
///     ("Form".into(), Box::new(form)),
/// ])?;
///
/// let outcome = chain.authenticate(&request).await;
/// ```
pub struct AuthenticatorChain {
    authenticators: Vec<(String, Box<dyn Authenticator>)>,
}

impl std::fmt::Debug for AuthenticatorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl AuthenticatorChain {
    /// Build a chain. At least one authenticator is required.
    pub fn new(authenticators: Vec<(String, Box<dyn Authenticator>)>) -> Result<Self, ConfigError> {
        if authenticators.is_empty() {
            return Err(ConfigError::NoAuthenticators);
        }
        Ok(Self { authenticators })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.authenticators.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.authenticators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.authenticators.is_empty()
    }

    /// Try each authenticator in order until one succeeds
    #[instrument(skip_all, fields(path = %request.path()))]
    pub async fn authenticate(&self, request: &AuthRequest) -> AuthOutcome {
        let mut last = None;

        for (name, authenticator) in &self.authenticators {
            trace!(authenticator = %name, kind = authenticator.kind(), "Trying authenticator");

            let mut outcome = authenticator.authenticate(request).await;
            if outcome.is_valid() {
                debug!(authenticator = %name, "Authentication succeeded");
                outcome.authenticator = Some(ComponentRef::new(name, authenticator.kind()));
                return outcome;
            }

            trace!(authenticator = %name, status = %outcome.status(), "Authentication failed");
            last = Some(outcome);
        }

        // `new` rejects empty chains, so `last` is always set here.
        last.unwrap_or_else(|| {
            AuthOutcome::new(tollgate_common::AuthResult::other(vec![
                ConfigError::NoAuthenticators.to_string(),
            ]))
        })
    }
}
