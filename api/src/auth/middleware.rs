//! Entry middleware.
//!
//! Runs the MFA service for every request before the router sees it, attaches
//! the service and the outcome to the request as an [`MfaContext`], and turns
//! an [`Unauthenticated`] signal coming back from the handlers into a
//! redirect.
//!
//! ```rust,ignore
//! let router = router.layer(MfaLayer::new(Arc::new(service), sessions));
//! ```

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::{
    body::{self, Body},
    extract::Request,
    http::{StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use tower::{Layer, Service};
use tracing::{debug, warn};

use super::{
    error::{ConfigError, Unauthenticated},
    outcome::AuthOutcome,
    request::AuthRequest,
    service::MfaService,
    sessions::SessionLoader,
};
use crate::error::ApiError;

/// Request bodies are buffered so authenticators can read them. Larger
/// bodies are rejected.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Resolves the MFA service to use for a request.
pub trait MfaServiceProvider: Send + Sync + 'static {
    fn mfa_service(&self, parts: &Parts) -> Result<Arc<MfaService>, ConfigError>;
}

impl MfaServiceProvider for Arc<MfaService> {
    fn mfa_service(&self, _parts: &Parts) -> Result<Arc<MfaService>, ConfigError> {
        Ok(Arc::clone(self))
    }
}

/// What the entry middleware learned about a request.
#[derive(Debug, Clone)]
pub struct MfaContext {
    service: Arc<MfaService>,
    outcome: Arc<AuthOutcome>,
    request: Arc<AuthRequest>,
    session_id: Option<String>,
}

impl MfaContext {
    pub fn new(
        service: Arc<MfaService>,
        outcome: AuthOutcome,
        request: AuthRequest,
        session_id: Option<String>,
    ) -> Self {
        Self {
            service,
            outcome: Arc::new(outcome),
            request: Arc::new(request),
            session_id,
        }
    }

    pub fn service(&self) -> &Arc<MfaService> {
        &self.service
    }

    pub fn outcome(&self) -> &AuthOutcome {
        &self.outcome
    }

    pub fn request(&self) -> &AuthRequest {
        &self.request
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }
}

struct MfaState<P> {
    provider: P,
    sessions: SessionLoader,
}

pub struct MfaLayer<P> {
    state: Arc<MfaState<P>>,
}

impl<P> Clone for MfaLayer<P> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<P: MfaServiceProvider> MfaLayer<P> {
    pub fn new(provider: P, sessions: SessionLoader) -> Self {
        Self {
            state: Arc::new(MfaState { provider, sessions }),
        }
    }
}

impl<S, P> Layer<S> for MfaLayer<P> {
    type Service = MfaMiddleware<S, P>;

    fn layer(&self, inner: S) -> Self::Service {
        MfaMiddleware {
            inner,
            state: Arc::clone(&self.state),
        }
    }
}

pub struct MfaMiddleware<S, P> {
    inner: S,
    state: Arc<MfaState<P>>,
}

impl<S: Clone, P> Clone for MfaMiddleware<S, P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl<S, P> Service<Request> for MfaMiddleware<S, P>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
    P: MfaServiceProvider,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let state = Arc::clone(&self.state);
        let not_ready_inner = self.inner.clone();
        let mut ready_inner = std::mem::replace(&mut self.inner, not_ready_inner);

        Box::pin(async move {
            let (request, context) = match prepare(&state, request).await {
                Ok(prepared) => prepared,
                Err(e) => return Ok(e.into_response()),
            };

            let response = ready_inner.call(request).await?;

            let Some(signal) = response.extensions().get::<Unauthenticated>() else {
                return Ok(response);
            };

            match context.service().unauthenticated_redirect_url(context.request()) {
                Some(url) => {
                    debug!(%url, reason = signal.message(), "Redirecting unauthenticated request");
                    Ok(redirect(url))
                }
                None => Ok(response),
            }
        })
    }
}

/// Buffer the body, load the session, authenticate, and attach the context.
async fn prepare<P: MfaServiceProvider>(
    state: &MfaState<P>,
    request: Request,
) -> Result<(Request, MfaContext), ApiError> {
    let (mut parts, body) = request.into_parts();

    let service = state.provider.mfa_service(&parts)?;

    let bytes = body::to_bytes(body, MAX_BODY_BYTES).await.map_err(|e| {
        warn!(error = %e, "Failed to read request body");
        ApiError::BadRequest("The request body could not be read.".into())
    })?;

    let session_id = state.sessions.session_id(&parts.headers);
    let session = state.sessions.load(session_id.as_deref()).await?;

    let content_type = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let auth_request = AuthRequest::from_parts(&parts)
        .with_raw_body(content_type, &bytes)
        .with_session(session);

    let outcome = service.authenticate(&auth_request).await?;
    let context = MfaContext::new(service, outcome, auth_request, session_id);

    parts.extensions.insert(context.clone());
    Ok((Request::from_parts(parts, Body::from(bytes)), context))
}

fn redirect(url: String) -> Response {
    match header::HeaderValue::try_from(url) {
        Ok(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
        Err(e) => ApiError::InternalAnyhow(anyhow::anyhow!("invalid redirect URL: {e}"))
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        http::Request,
        routing::{get, post},
    };
    use serde_json::json;
    use tollgate_common::{AuthStatus, Identity};
    use tollgate_db::{BcryptHasher, MemoryStorage};
    use tower::ServiceExt;

    use super::*;
    use crate::auth::{
        registry::{ComponentSpec, DEFAULT_COMPONENT, Registry},
        service::MfaConfig,
        sessions::DEFAULT_SESSION_COOKIE,
        testing::{TEST_COST, hashed},
    };

    fn layer(redirect: Option<&str>) -> MfaLayer<Arc<MfaService>> {
        let storage = Arc::new(MemoryStorage::with_identities([Identity::from_value(json!({
            "user_session_id": "bob",
            "password": hashed("correct"),
        }))]));
        let registry = Registry::with_defaults(storage.clone())
            .with_hasher(DEFAULT_COMPONENT, Arc::new(BcryptHasher::new(TEST_COST).unwrap()));
        let config = MfaConfig {
            identifiers: vec![ComponentSpec::new("Password")],
            authenticators: vec![ComponentSpec::new("Session"), ComponentSpec::new("Form")],
            query_param: Some("redirect".into()),
            unauthenticated_redirect: redirect.map(str::to_string),
            ..MfaConfig::default()
        };

        MfaLayer::new(
            Arc::new(MfaService::new(config, registry)),
            SessionLoader::new(storage, DEFAULT_SESSION_COOKIE),
        )
    }

    async fn status_of(axum::extract::Extension(context): axum::extract::Extension<MfaContext>) -> String {
        context.outcome().status().to_string()
    }

    async fn blocked() -> ApiError {
        ApiError::Unauthenticated(Unauthenticated::default())
    }

    fn app(redirect: Option<&str>) -> Router {
        Router::new()
            .route("/verify", post(status_of))
            .route("/blocked", get(blocked))
            .layer(layer(redirect))
    }

    #[tokio::test]
    async fn outcome_is_attached_to_the_request() {
        let response = app(None)
            .oneshot(
                Request::post("/verify")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("user_session_id=bob&password=correct"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], AuthStatus::Success.as_str().as_bytes());
    }

    #[tokio::test]
    async fn unauthenticated_signal_becomes_a_redirect() {
        let response = app(Some("/login"))
            .oneshot(Request::get("/blocked?y=2").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/login?redirect=%2Fblocked%3Fy%3D2"
        );
    }

    #[tokio::test]
    async fn unauthenticated_signal_passes_through_without_target() {
        let response = app(None)
            .oneshot(Request::get("/blocked").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn oversized_bodies_are_rejected() {
        let response = app(None)
            .oneshot(
                Request::post("/verify")
                    .body(Body::from(vec![b'a'; MAX_BODY_BYTES + 1]))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn broken_configuration_is_a_server_error() {
        let storage = Arc::new(MemoryStorage::new());
        let service = MfaService::new(MfaConfig::default(), Registry::with_defaults(storage.clone()));
        let app = Router::new()
            .route("/verify", post(status_of))
            .layer(MfaLayer::new(
                Arc::new(service),
                SessionLoader::new(storage, DEFAULT_SESSION_COOKIE),
            ));

        let response = app
            .oneshot(Request::post("/verify").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
