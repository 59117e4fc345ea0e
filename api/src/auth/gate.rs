//! Access gate.
//!
//! Guards protected routes: a request may only reach its handler once the
//! first-factor identity records a completed second factor in its session.
//!
//! # Flow
//!
//! 1. The entry middleware has attached an [`MfaContext`] to the request
//! 2. [`AccessGate::before_filter`] notifies [`IdentifyListener`]s when a
//!    form authenticator accepted the request
//! 3. The identity check runs at the lifecycle point picked by
//!    `identityCheckEvent` (`initialize` = before-filter, `startup` = just
//!    before the handler)
//! 4. A blocked request fails with [`Unauthenticated`], which the entry
//!    middleware may turn into a redirect

use std::{collections::HashMap, future::Future, sync::Arc};

use async_trait::async_trait;
use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tollgate_common::Identity;
use tracing::{debug, instrument, trace};

use super::{
    authenticators::FormAuthenticator, error::Unauthenticated, middleware::MfaContext,
    outcome::ComponentRef, service::DEFAULT_IDENTITY_ATTRIBUTE,
};
use crate::error::ApiError;

pub const DEFAULT_GATE_SESSION_KEY: &str = "session.is_mfa_completed";

/// Lifecycle point at which the identity check runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityCheckEvent {
    Initialize,
    #[default]
    Startup,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GateConfig {
    #[serde(default = "default_true")]
    pub require_identity: bool,

    #[serde(default = "default_identity_attribute")]
    pub identity_attribute: String,

    /// Dot path of the completion flag inside the first-factor identity.
    #[serde(default = "default_session_key")]
    pub session_key: String,

    #[serde(default)]
    pub identity_check_event: IdentityCheckEvent,

    #[serde(default)]
    pub unauthenticated_message: Option<String>,

    /// Actions (route paths) that skip the check.
    #[serde(default)]
    pub allow_unauthenticated: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_identity_attribute() -> String {
    DEFAULT_IDENTITY_ATTRIBUTE.to_string()
}

fn default_session_key() -> String {
    DEFAULT_GATE_SESSION_KEY.to_string()
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            require_identity: true,
            identity_attribute: default_identity_attribute(),
            session_key: default_session_key(),
            identity_check_event: IdentityCheckEvent::default(),
            unauthenticated_message: None,
            allow_unauthenticated: Vec::new(),
        }
    }
}

/// First-factor identities attached to a request, keyed by attribute name.
#[derive(Debug, Clone, Default)]
pub struct RequestIdentities(HashMap<String, Identity>);

impl RequestIdentities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, attribute: impl Into<String>, identity: Identity) -> Self {
        self.0.insert(attribute.into(), identity);
        self
    }

    pub fn get(&self, attribute: &str) -> Option<&Identity> {
        self.0.get(attribute)
    }
}

/// Actions the first-factor layer lets through without an identity.
#[derive(Debug, Clone, Default)]
pub struct UnauthenticatedActions(pub Vec<String>);

/// Passed to [`IdentifyListener`]s after a form authenticator accepted the
/// request.
#[derive(Debug)]
pub struct AfterIdentify<'a> {
    pub authenticator: &'a ComponentRef,
    /// The first-factor identity, if one is attached to the request.
    pub identity: Option<&'a Identity>,
    pub context: &'a MfaContext,
}

#[async_trait]
pub trait IdentifyListener: Send + Sync {
    async fn after_identify(&self, event: &AfterIdentify<'_>);
}

/// What the gate looks at for one request.
#[derive(Debug, Clone, Copy)]
pub struct GateRequest<'a> {
    pub action: &'a str,
    pub context: &'a MfaContext,
    pub identities: Option<&'a RequestIdentities>,
    pub first_factor_exempt: &'a [String],
}

impl GateRequest<'_> {
    fn identity(&self, attribute: &str) -> Option<&Identity> {
        self.identities.and_then(|ids| ids.get(attribute))
    }
}

pub struct AccessGate {
    config: GateConfig,
    unauthenticated_actions: Vec<String>,
    listeners: Vec<Arc<dyn IdentifyListener>>,
}

impl AccessGate {
    pub fn new(config: GateConfig) -> Self {
        let mut gate = Self {
            unauthenticated_actions: Vec::new(),
            listeners: Vec::new(),
            config,
        };
        let actions = gate.config.allow_unauthenticated.clone();
        gate.add_unauthenticated_actions(actions);
        gate
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn with_listener(mut self, listener: Arc<dyn IdentifyListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Replace the list of actions that skip the check.
    pub fn allow_unauthenticated<I, A>(&mut self, actions: I) -> &mut Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.unauthenticated_actions.clear();
        self.add_unauthenticated_actions(actions)
    }

    /// Merge `actions` into the exempt list, keeping it free of duplicates.
    pub fn add_unauthenticated_actions<I, A>(&mut self, actions: I) -> &mut Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        for action in actions {
            let action = action.into();
            if !self.unauthenticated_actions.contains(&action) {
                self.unauthenticated_actions.push(action);
            }
        }
        self
    }

    pub fn unauthenticated_actions(&self) -> &[String] {
        &self.unauthenticated_actions
    }

    /// Notify listeners of a form-based identification, then run the check if
    /// it is bound to this point.
    #[instrument(skip_all, fields(action = request.action))]
    pub async fn before_filter(&self, request: &GateRequest<'_>) -> Result<(), Unauthenticated> {
        let outcome = request.context.outcome();
        if let Some(authenticator) = outcome
            .authenticator
            .as_ref()
            .filter(|a| a.kind == FormAuthenticator::KIND)
        {
            let event = AfterIdentify {
                authenticator,
                identity: request.identity(&self.config.identity_attribute),
                context: request.context,
            };
            for listener in &self.listeners {
                listener.after_identify(&event).await;
            }
        }

        if self.config.identity_check_event == IdentityCheckEvent::Initialize {
            self.check_identity(request)?;
        }
        Ok(())
    }

    /// Run the check if it is bound to the startup point.
    pub fn startup(&self, request: &GateRequest<'_>) -> Result<(), Unauthenticated> {
        if self.config.identity_check_event == IdentityCheckEvent::Startup {
            self.check_identity(request)?;
        }
        Ok(())
    }

    fn check_identity(&self, request: &GateRequest<'_>) -> Result<(), Unauthenticated> {
        if !self.config.require_identity {
            return Ok(());
        }

        let action = request.action.to_string();
        if self.unauthenticated_actions.contains(&action)
            || request.first_factor_exempt.contains(&action)
        {
            trace!("Action is exempt from the MFA check");
            return Ok(());
        }

        let completed = request
            .identity(&self.config.identity_attribute)
            .is_some_and(|identity| identity.flag(&self.config.session_key));

        if completed {
            return Ok(());
        }

        debug!(session_key = %self.config.session_key, "Second factor not completed");
        Err(Unauthenticated::new(
            self.config.unauthenticated_message.as_deref(),
        ))
    }
}

/// axum middleware running the gate for a route.
///
/// Install with `route_layer` so the matched route path is available as the
/// action name.
pub async fn enforce(State(gate): State<Arc<AccessGate>>, request: Request, next: Next) -> Response {
    match check(&gate, &request).await {
        Ok(()) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}

fn check<'a>(
    gate: &'a AccessGate,
    request: &Request,
) -> impl Future<Output = Result<(), ApiError>> + Send + 'a {
    // Request bodies are not `Sync`, so everything the gate needs is taken
    // out of the request before the first await.
    let extensions = request.extensions();
    let context = extensions.get::<MfaContext>().cloned();
    let action = extensions
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let first_factor_exempt = extensions
        .get::<UnauthenticatedActions>()
        .cloned()
        .unwrap_or_default();
    let identities = extensions.get::<RequestIdentities>().cloned();

    async move {
        let context = context.ok_or(ApiError::MissingMfaContext)?;
        let gate_request = GateRequest {
            action: &action,
            context: &context,
            identities: identities.as_ref(),
            first_factor_exempt: &first_factor_exempt.0,
        };

        gate.before_filter(&gate_request).await?;
        gate.startup(&gate_request)?;
        Ok(())
    }
}
