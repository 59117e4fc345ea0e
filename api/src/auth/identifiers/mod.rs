//! Identifiers resolve a credential map to an identity record.

use async_trait::async_trait;
use tollgate_common::{Credentials, Identity};

pub mod chain;
pub mod password;

pub use chain::{ChainIdentification, IdentifierChain};
pub use password::PasswordIdentifier;

/// A successful identification.
#[derive(Debug, Clone, PartialEq)]
pub struct Identified {
    pub identity: Identity,

    /// The stored secret verified, but was hashed with outdated parameters
    /// and should be re-hashed by the caller.
    pub needs_rehash: bool,
}

impl Identified {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            needs_rehash: false,
        }
    }
}

/// Why an identifier did not produce an identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifyFailure {
    pub errors: Vec<String>,
}

impl IdentifyFailure {
    pub fn new(errors: Vec<String>) -> Self {
        Self { errors }
    }

    pub fn with_error(error: impl Into<String>) -> Self {
        Self {
            errors: vec![error.into()],
        }
    }
}

pub type Identification = Result<Identified, IdentifyFailure>;

#[async_trait]
pub trait Identifier: Send + Sync {
    /// Match `credentials` against an identity source.
    async fn identify(&self, credentials: &Credentials) -> Identification;

    /// Short name of this identifier type (for debugging/logging).
    fn kind(&self) -> &'static str;
}
