use tollgate_common::Credentials;
use tracing::{debug, instrument, trace};

use super::{Identified, Identifier};
use crate::auth::outcome::ComponentRef;

/// Ordered, first-match-wins composition of named identifiers.
///
/// The chain itself is immutable once built. The outcome of each call,
/// including which identifier matched and what the others reported, comes
/// back in a [`ChainIdentification`]; nothing is remembered between calls.
#[derive(Default)]
pub struct IdentifierChain {
    identifiers: Vec<(String, Box<dyn Identifier>)>,
}

/// Result of running credentials through an [`IdentifierChain`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainIdentification {
    pub identified: Option<Identified>,

    /// The identifier that matched.
    pub identifier: Option<ComponentRef>,

    /// Errors of every identifier that ran and failed, in chain order.
    pub errors: Vec<(String, Vec<String>)>,
}

impl ChainIdentification {
    pub fn is_found(&self) -> bool {
        self.identified.is_some()
    }

    /// Errors as `<identifier>: <error>` lines.
    pub fn flattened_errors(&self) -> Vec<String> {
        self.errors
            .iter()
            .flat_map(|(name, errors)| errors.iter().map(move |e| format!("{name}: {e}")))
            .collect()
    }
}

impl std::fmt::Debug for IdentifierChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl IdentifierChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identifier<I: Identifier + 'static>(
        mut self,
        name: impl Into<String>,
        identifier: I,
    ) -> Self {
        self.push(name, Box::new(identifier));
        self
    }

    pub(crate) fn push(&mut self, name: impl Into<String>, identifier: Box<dyn Identifier>) {
        self.identifiers.push((name.into(), identifier));
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.identifiers.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    /// Try each identifier in order until one matches.
    #[instrument(skip(self))]
    pub async fn identify(&self, credentials: &Credentials) -> ChainIdentification {
        let mut errors = Vec::new();

        for (name, identifier) in &self.identifiers {
            trace!(identifier = %name, "Trying identifier");

            match identifier.identify(credentials).await {
                Ok(identified) => {
                    debug!(identifier = %name, "Identity matched");
                    return ChainIdentification {
                        identified: Some(identified),
                        identifier: Some(ComponentRef::new(name, identifier.kind())),
                        errors,
                    };
                }
                Err(failure) => {
                    trace!(identifier = %name, errors = ?failure.errors, "No match");
                    errors.push((name.clone(), failure.errors));
                }
            }
        }

        debug!("No identifier matched");
        ChainIdentification {
            identified: None,
            identifier: None,
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use serde_json::json;
    use tollgate_common::credentials::USER_SESSION_ID;

    use super::*;
    use crate::auth::testing::StubIdentifier;

    fn credentials() -> Credentials {
        Credentials::new().with(USER_SESSION_ID, "bob")
    }

    #[tokio::test]
    async fn first_match_wins_and_earlier_errors_are_kept() {
        let a = StubIdentifier::failing(&["A rejected"]);
        let b = StubIdentifier::matching(json!({ "id": "from-b" }));
        let c = StubIdentifier::matching(json!({ "id": "from-c" }));
        let (a_calls, b_calls, c_calls) = (a.calls(), b.calls(), c.calls());

        let chain = IdentifierChain::new()
            .with_identifier("A", a)
            .with_identifier("B", b)
            .with_identifier("C", c);

        let outcome = chain.identify(&credentials()).await;

        let identified = outcome.identified.as_ref().unwrap();
        assert_eq!(identified.identity.get_str("id"), Some("from-b"));
        assert_eq!(outcome.identifier.as_ref().unwrap().name, "B");
        assert_eq!(outcome.errors, vec![("A".to_string(), vec!["A rejected".to_string()])]);

        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
        assert_eq!(c_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn all_failing_reports_every_error() {
        let chain = IdentifierChain::new()
            .with_identifier("A", StubIdentifier::failing(&["a1", "a2"]))
            .with_identifier("B", StubIdentifier::failing(&[]));

        let outcome = chain.identify(&credentials()).await;

        assert!(!outcome.is_found());
        assert!(outcome.identifier.is_none());
        assert_eq!(outcome.errors.len(), 2);
        assert_eq!(outcome.errors[1], ("B".to_string(), vec![]));
        assert_eq!(outcome.flattened_errors(), vec!["A: a1", "A: a2"]);
    }

    #[tokio::test]
    async fn empty_chain_finds_nothing() {
        let outcome = IdentifierChain::new().identify(&credentials()).await;
        assert_eq!(outcome, ChainIdentification::default());
    }

    #[tokio::test]
    async fn bookkeeping_reflects_only_the_latest_call() {
        let chain = IdentifierChain::new()
            .with_identifier("A", StubIdentifier::failing(&["nope"]))
            .with_identifier("B", StubIdentifier::matching_user("bob"));

        let first = chain.identify(&credentials()).await;
        assert_eq!(first.identifier.unwrap().name, "B");

        // A second call on the same chain starts from a clean slate: the
        // earlier success does not linger.
        let second = chain
            .identify(&Credentials::new().with(USER_SESSION_ID, "ghost"))
            .await;
        assert!(second.identifier.is_none());
        assert_eq!(second.errors.len(), 2);
    }
}
