//! Multi-factor authentication core.
//!
//! Identifiers resolve credentials to identities and are composed into an
//! [`IdentifierChain`]. Authenticators pull credentials out of a request and
//! drive that chain; they are composed into an [`AuthenticatorChain`]. The
//! [`MfaService`] builds both chains from configuration through a
//! [`Registry`], and the HTTP side consists of the [`MfaLayer`] entry
//! middleware and the [`AccessGate`].

pub mod authenticators;
pub mod error;
pub mod extractor;
pub mod gate;
pub mod identifiers;
pub mod middleware;
pub mod options;
pub mod outcome;
pub mod redirect;
pub mod registry;
pub mod request;
pub mod service;
pub mod sessions;

#[cfg(test)]
pub(crate) mod testing;

pub use authenticators::{Authenticator, AuthenticatorChain};
pub use error::{ConfigError, Unauthenticated};
pub use extractor::Mfa;
pub use gate::{AccessGate, GateConfig, IdentifyListener};
pub use identifiers::{Identifier, IdentifierChain};
pub use middleware::{MfaContext, MfaLayer, MfaServiceProvider};
pub use outcome::{AuthOutcome, ComponentRef};
pub use registry::{ComponentSpec, Registry};
pub use request::AuthRequest;
pub use service::{MfaConfig, MfaService};
pub use sessions::SessionLoader;
