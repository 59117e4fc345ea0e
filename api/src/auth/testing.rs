//! Stub components and fixtures shared by the auth test suites.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use serde_json::{Value, json};
use tollgate_common::{AuthResult, Credentials, Identity, credentials::USER_SESSION_ID};
use tollgate_db::{BcryptHasher, HashError, PasswordHasher};

use super::{
    authenticators::Authenticator,
    identifiers::{Identification, Identified, Identifier, IdentifyFailure},
    outcome::AuthOutcome,
    request::AuthRequest,
};

/// Lowest bcrypt cost, keeps hashing fast in tests.
pub const TEST_COST: u32 = 4;

pub fn hashed(password: &str) -> String {
    BcryptHasher::new(TEST_COST)
        .unwrap()
        .hash(password)
        .unwrap()
}

/// bcrypt hasher that records every hash it is asked to check.
pub struct CountingHasher {
    inner: BcryptHasher,
    checked: Mutex<Vec<String>>,
}

impl CountingHasher {
    pub fn new(cost: u32) -> Self {
        Self {
            inner: BcryptHasher::new(cost).unwrap(),
            checked: Mutex::default(),
        }
    }

    pub fn checks(&self) -> usize {
        self.checked.lock().unwrap().len()
    }

    pub fn checked_hashes(&self) -> Vec<String> {
        self.checked.lock().unwrap().clone()
    }
}

impl PasswordHasher for CountingHasher {
    fn hash(&self, plaintext: &str) -> Result<String, HashError> {
        self.inner.hash(plaintext)
    }

    fn hash_with_cost(&self, plaintext: &str, cost: u32) -> Result<String, HashError> {
        self.inner.hash_with_cost(plaintext, cost)
    }

    fn check(&self, plaintext: &str, hash: &str) -> bool {
        self.checked.lock().unwrap().push(hash.to_string());
        self.inner.check(plaintext, hash)
    }

    fn needs_rehash(&self, hash: &str) -> bool {
        self.inner.needs_rehash(hash)
    }
}

enum Behavior {
    Fail(Vec<String>),
    Always(Value),
    User(String),
}

pub struct StubIdentifier {
    behavior: Behavior,
    calls: Arc<AtomicUsize>,
}

impl StubIdentifier {
    fn with(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: Arc::default(),
        }
    }

    pub fn failing(errors: &[&str]) -> Self {
        Self::with(Behavior::Fail(errors.iter().map(|e| e.to_string()).collect()))
    }

    /// Matches any credentials.
    pub fn matching(identity: Value) -> Self {
        Self::with(Behavior::Always(identity))
    }

    /// Matches only when `user_session_id` equals `user`.
    pub fn matching_user(user: &str) -> Self {
        Self::with(Behavior::User(user.to_string()))
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Identifier for StubIdentifier {
    async fn identify(&self, credentials: &Credentials) -> Identification {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match &self.behavior {
            Behavior::Fail(errors) => Err(IdentifyFailure::new(errors.clone())),
            Behavior::Always(identity) => Ok(Identified::new(Identity::from_value(identity.clone()))),
            Behavior::User(user) if credentials.get(USER_SESSION_ID) == Some(user.as_str()) => Ok(
                Identified::new(Identity::from_value(json!({ USER_SESSION_ID: user }))),
            ),
            Behavior::User(_) => Err(IdentifyFailure::with_error("unknown user")),
        }
    }

    fn kind(&self) -> &'static str {
        "stub"
    }
}

pub struct StubAuthenticator {
    result: AuthResult,
    calls: Arc<AtomicUsize>,
}

impl StubAuthenticator {
    pub fn returning(result: AuthResult) -> Self {
        Self {
            result,
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Authenticator for StubAuthenticator {
    async fn authenticate(&self, _request: &AuthRequest) -> AuthOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        AuthOutcome::new(self.result.clone())
    }

    fn kind(&self) -> &'static str {
        "stub"
    }
}
