//! Form authentication.
//!
//! Reads the second-factor credentials from the parsed request body
//! (urlencoded form or JSON object) and hands them to the identifier chain.
//! Optionally restricted to one or more login URLs.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tollgate_common::{AuthResult, Credentials};
use tracing::{debug, instrument};

use super::{Authenticator, default_form_fields};
use crate::auth::{
    error::ConfigError,
    identifiers::IdentifierChain,
    options::{OneOrMany, parse_options},
    outcome::AuthOutcome,
    request::AuthRequest,
};

const CREDENTIALS_NOT_FOUND: &str = "Multi-Factor Authentication credentials not found";

/// How the request URL is compared against `loginUrl`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UrlChecker {
    /// Compare the request path only.
    #[default]
    Path,
    /// Compare `scheme://host/path`, query excluded.
    FullUrl,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FormConfig {
    /// Logical credential key → body field.
    #[serde(default = "default_form_fields")]
    pub fields: BTreeMap<String, String>,

    #[serde(default)]
    pub login_url: Option<OneOrMany>,

    #[serde(default)]
    pub url_checker: UrlChecker,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            fields: default_form_fields(),
            login_url: None,
            url_checker: UrlChecker::default(),
        }
    }
}

pub struct FormAuthenticator {
    identifiers: Arc<IdentifierChain>,
    config: FormConfig,
}

impl FormAuthenticator {
    pub const KIND: &'static str = "form";

    pub fn new(identifiers: Arc<IdentifierChain>, config: FormConfig) -> Self {
        Self {
            identifiers,
            config,
        }
    }

    pub fn from_options(
        name: &str,
        options: &Map<String, Value>,
        identifiers: Arc<IdentifierChain>,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(identifiers, parse_options(name, options)?))
    }

    fn request_url(&self, request: &AuthRequest) -> String {
        match self.config.url_checker {
            UrlChecker::Path => request.path().to_string(),
            UrlChecker::FullUrl => request.full_url(),
        }
    }

    /// `None` when the URL is acceptable, otherwise the mismatch error.
    fn check_url(&self, request: &AuthRequest) -> Option<String> {
        let login_urls = self.config.login_url.as_ref().filter(|urls| !urls.is_empty())?;
        let url = self.request_url(request);

        if login_urls.iter().any(|login_url| login_url == url) {
            return None;
        }

        let expected = login_urls.iter().collect::<Vec<_>>().join("` or `");
        Some(format!(
            "Multi-Factor Authentication URL `{url}` did not match `{expected}`."
        ))
    }

    /// Every configured field must be present as a non-empty string.
    fn credentials(&self, request: &AuthRequest) -> Option<Credentials> {
        let body = request.body()?;

        self.config
            .fields
            .iter()
            .map(|(key, field)| match body.get(field) {
                Some(Value::String(value)) if !value.is_empty() => {
                    Some((key.clone(), value.clone()))
                }
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Authenticator for FormAuthenticator {
    #[instrument(skip_all, fields(kind = "form"))]
    async fn authenticate(&self, request: &AuthRequest) -> AuthOutcome {
        if let Some(error) = self.check_url(request) {
            debug!(%error, "Login URL mismatch");
            return AuthResult::other(vec![error]).into();
        }

        let Some(credentials) = self.credentials(request) else {
            debug!("Form credentials missing");
            return AuthResult::credentials_missing(vec![CREDENTIALS_NOT_FOUND.to_string()])
                .into();
        };

        let identification = self.identifiers.identify(&credentials).await;
        let errors = identification.flattened_errors();

        match identification.identified {
            Some(identified) => AuthOutcome::new(AuthResult::success(identified.identity))
                .identified_by(identification.identifier, identified.needs_rehash),
            None => AuthResult::identity_not_found(errors).into(),
        }
    }

    fn kind(&self) -> &'static str {
        Self::KIND
    }
}
