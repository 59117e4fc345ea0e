//! The MFA service: configuration, lazily built chains and redirect helpers
//! behind one shared object.

use std::sync::{Arc, OnceLock};

use serde::Deserialize;
use tracing::{debug, info, instrument};

use super::{
    authenticators::AuthenticatorChain,
    error::ConfigError,
    identifiers::IdentifierChain,
    outcome::AuthOutcome,
    redirect,
    registry::{ComponentSpec, Registry},
    request::AuthRequest,
};

pub const DEFAULT_IDENTITY_ATTRIBUTE: &str = "identity";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MfaConfig {
    #[serde(default)]
    pub identifiers: Vec<ComponentSpec>,

    #[serde(default)]
    pub authenticators: Vec<ComponentSpec>,

    /// Request attribute holding the first-factor identity.
    #[serde(default = "default_identity_attribute")]
    pub identity_attribute: String,

    /// Query parameter carrying the original location across the MFA step.
    #[serde(default)]
    pub query_param: Option<String>,

    /// Where blocked requests are sent.
    #[serde(default)]
    pub unauthenticated_redirect: Option<String>,
}

fn default_identity_attribute() -> String {
    DEFAULT_IDENTITY_ATTRIBUTE.to_string()
}

impl Default for MfaConfig {
    fn default() -> Self {
        Self {
            identifiers: Vec::new(),
            authenticators: Vec::new(),
            identity_attribute: default_identity_attribute(),
            query_param: None,
            unauthenticated_redirect: None,
        }
    }
}

/// Shared MFA façade.
///
/// Both chains are built from the configuration on first use and reused
/// afterwards. The service holds no per-request state: everything about an
/// attempt comes back in the [`AuthOutcome`].
#[derive(Debug)]
pub struct MfaService {
    config: MfaConfig,
    registry: Registry,
    identifiers: OnceLock<Arc<IdentifierChain>>,
    authenticators: OnceLock<AuthenticatorChain>,
}

impl MfaService {
    pub fn new(config: MfaConfig, registry: Registry) -> Self {
        Self {
            config,
            registry,
            identifiers: OnceLock::new(),
            authenticators: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &MfaConfig {
        &self.config
    }

    /// The identifier chain, built on first access.
    pub fn identifiers(&self) -> Result<&Arc<IdentifierChain>, ConfigError> {
        if let Some(chain) = self.identifiers.get() {
            return Ok(chain);
        }

        let chain = Arc::new(self.registry.build_identifiers(&self.config.identifiers)?);
        debug!(identifiers = chain.len(), "Identifier chain built");
        Ok(self.identifiers.get_or_init(|| chain))
    }

    /// The authenticator chain, built on first access after the identifier
    /// chain it shares.
    pub fn authenticators(&self) -> Result<&AuthenticatorChain, ConfigError> {
        if let Some(chain) = self.authenticators.get() {
            return Ok(chain);
        }

        let identifiers = Arc::clone(self.identifiers()?);
        let chain = AuthenticatorChain::new(
            self.registry
                .build_authenticators(&self.config.authenticators, identifiers)?,
        )?;
        info!(authenticators = ?chain, "Authenticator chain built");
        Ok(self.authenticators.get_or_init(|| chain))
    }

    /// Run `request` through the authenticator chain.
    ///
    /// Authentication failures are reported in the outcome. Only a broken
    /// configuration is an error.
    #[instrument(skip_all, fields(path = %request.path()))]
    pub async fn authenticate(&self, request: &AuthRequest) -> Result<AuthOutcome, ConfigError> {
        let outcome = self.authenticators()?.authenticate(request).await;
        debug!(status = %outcome.status(), "MFA authentication finished");
        Ok(outcome)
    }

    pub fn identity_attribute(&self) -> &str {
        &self.config.identity_attribute
    }

    /// Where to send `request` when it is blocked, if anywhere.
    pub fn unauthenticated_redirect_url(&self, request: &AuthRequest) -> Option<String> {
        let target = self.config.unauthenticated_redirect.as_deref()?;
        Some(redirect::unauthenticated_redirect_url(
            target,
            self.config.query_param.as_deref(),
            request,
        ))
    }

    /// Where to continue after a successful second factor, if the request
    /// carries a safe local target.
    pub fn mfa_redirect(&self, request: &AuthRequest) -> Option<String> {
        redirect::mfa_redirect(self.config.query_param.as_deref(), request)
    }
}

#[cfg(test)]
mod tests {
    use std::ptr;

    use axum::http::Method;
    use serde_json::json;
    use tollgate_common::{AuthStatus, Identity};
    use tollgate_db::{BcryptHasher, MemoryStorage};

    use super::*;
    use crate::auth::{
        outcome::ComponentRef,
        registry::DEFAULT_COMPONENT,
        testing::{TEST_COST, hashed},
    };

    fn registry() -> Registry {
        let storage = MemoryStorage::with_identities([Identity::from_value(json!({
            "user_session_id": "bob",
            "password": hashed("correct"),
        }))]);
        Registry::with_defaults(Arc::new(storage))
            .with_hasher(DEFAULT_COMPONENT, Arc::new(BcryptHasher::new(TEST_COST).unwrap()))
    }

    fn config() -> MfaConfig {
        MfaConfig {
            identifiers: vec![ComponentSpec::new("Password")],
            authenticators: vec![
                ComponentSpec::new("Session"),
                ComponentSpec::new("Form").with_option("loginUrl", "/v1/mfa/verify"),
            ],
            query_param: Some("redirect".into()),
            unauthenticated_redirect: Some("/v1/mfa?x=1".into()),
            ..MfaConfig::default()
        }
    }

    fn form_post(body: serde_json::Value) -> AuthRequest {
        let serde_json::Value::Object(body) = body else {
            panic!("body must be an object");
        };
        AuthRequest::new(Method::POST, "/v1/mfa/verify".parse().unwrap()).with_body(body)
    }

    #[test]
    fn chains_are_built_once() {
        let service = MfaService::new(config(), registry());

        let first = service.identifiers().unwrap();
        let second = service.identifiers().unwrap();
        assert!(Arc::ptr_eq(first, second));

        let first = service.authenticators().unwrap();
        let second = service.authenticators().unwrap();
        assert!(ptr::eq(first, second));
        assert_eq!(first.names().collect::<Vec<_>>(), vec!["Session", "Form"]);
    }

    #[test]
    fn configuration_errors_surface_on_first_use() {
        let service = MfaService::new(MfaConfig::default(), registry());
        assert!(matches!(
            service.authenticators().err().unwrap(),
            ConfigError::NoAuthenticators
        ));

        let service = MfaService::new(
            MfaConfig {
                authenticators: vec![ComponentSpec::new("Token")],
                ..MfaConfig::default()
            },
            registry(),
        );
        assert!(matches!(
            service.authenticators().err().unwrap(),
            ConfigError::UnknownAuthenticator(_)
        ));
    }

    #[tokio::test]
    async fn authenticate_reports_the_successful_components() {
        let service = MfaService::new(config(), registry());

        let outcome = service
            .authenticate(&form_post(
                json!({ "user_session_id": "bob", "password": "correct" }),
            ))
            .await
            .unwrap();

        assert_eq!(outcome.status(), AuthStatus::Success);
        assert_eq!(outcome.authenticator, Some(ComponentRef::new("Form", "form")));
        assert_eq!(outcome.identifier, Some(ComponentRef::new("Password", "password")));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_look_the_same() {
        let service = MfaService::new(config(), registry());

        let wrong = service
            .authenticate(&form_post(json!({ "user_session_id": "bob", "password": "wrong" })))
            .await
            .unwrap();
        let ghost = service
            .authenticate(&form_post(
                json!({ "user_session_id": "ghost", "password": "anything" }),
            ))
            .await
            .unwrap();

        assert_eq!(wrong.status(), AuthStatus::FailureIdentityNotFound);
        assert_eq!(wrong, ghost);
    }

    #[test]
    fn redirects_follow_configuration() {
        let service = MfaService::new(config(), registry());
        let request = AuthRequest::new(Method::GET, "/v1/protected?y=2".parse().unwrap());
        assert_eq!(
            service.unauthenticated_redirect_url(&request).as_deref(),
            Some("/v1/mfa?x=1&redirect=%2Fv1%2Fprotected%3Fy%3D2")
        );

        let request = AuthRequest::new(Method::GET, "/v1/mfa?redirect=%2Fv1%2Fprotected".parse().unwrap());
        assert_eq!(service.mfa_redirect(&request).as_deref(), Some("/v1/protected"));

        let bare = MfaService::new(MfaConfig::default(), registry());
        assert_eq!(bare.unauthenticated_redirect_url(&request), None);
        assert_eq!(bare.mfa_redirect(&request), None);
        assert_eq!(bare.identity_attribute(), "identity");
    }

    #[test]
    fn config_reads_from_toml() {
        let config: MfaConfig = toml::from_str(
            r#"
            identityAttribute = "user"
            queryParam = "redirect"

            [[identifiers]]
            name = "Password"
            fields = { user_session_id = ["username", "email"] }

            [[authenticators]]
            name = "Form"
            loginUrl = "/v1/mfa/verify"
            "#,
        )
        .unwrap();

        assert_eq!(config.identity_attribute, "user");
        assert_eq!(config.identifiers[0].name, "Password");
        assert_eq!(
            config.authenticators[0].options.get("loginUrl"),
            Some(&json!("/v1/mfa/verify"))
        );
        assert_eq!(config.unauthenticated_redirect, None);
    }
}
