use std::fmt::Display;

use tollgate_common::{AuthResult, AuthStatus};

/// Names a component instance inside a chain: the name it was configured
/// under plus the kind of component it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentRef {
    pub name: String,
    pub kind: &'static str,
}

impl ComponentRef {
    pub fn new(name: impl Into<String>, kind: &'static str) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

impl Display for ComponentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.kind)
    }
}

/// An [`AuthResult`] plus the bookkeeping of the attempt that produced it.
///
/// Everything that describes a single attempt lives here and is handed back
/// to the caller, so a service shared between concurrent requests never
/// holds per-request state.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthOutcome {
    pub result: AuthResult,

    /// Authenticator that accepted the request; `None` unless successful.
    pub authenticator: Option<ComponentRef>,

    /// Identifier that matched the credentials, if identification ran and
    /// succeeded.
    pub identifier: Option<ComponentRef>,

    /// The matched identity's stored secret should be re-hashed.
    pub needs_rehash: bool,
}

impl AuthOutcome {
    pub fn new(result: AuthResult) -> Self {
        Self {
            result,
            authenticator: None,
            identifier: None,
            needs_rehash: false,
        }
    }

    pub fn identified_by(mut self, identifier: Option<ComponentRef>, needs_rehash: bool) -> Self {
        self.identifier = identifier;
        self.needs_rehash = needs_rehash;
        self
    }

    pub fn status(&self) -> AuthStatus {
        self.result.status()
    }

    pub fn is_valid(&self) -> bool {
        self.result.is_valid()
    }
}

impl From<AuthResult> for AuthOutcome {
    fn from(result: AuthResult) -> Self {
        Self::new(result)
    }
}
