use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    extract::{MatchedPath, Request, State},
    http::{HeaderName, HeaderValue},
    middleware::{self, Next},
    response::Response,
};
use tollgate_common::{Identity, views::ApiErrorResponse};
use tollgate_db::MemoryStorage;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use utoipa::{
    ToSchema,
    openapi::{Info, License, OpenApi, RefOr, path::Operation},
};
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::{
    auth::{
        AccessGate, MfaContext, MfaLayer, MfaService, Registry, SessionLoader,
        gate::{self, RequestIdentities, UnauthenticatedActions},
        registry::DEFAULT_COMPONENT,
    },
    config::{Settings, TollgateApiConfig},
    context::ApiContext,
    handlers,
    listeners::{PasswordRehash, SessionCompletion},
};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Build the router and its OpenAPI document.
///
/// Layers, outermost first: request id + tracing + CORS, the MFA entry
/// middleware, the first-factor bridge, and the access gate on each route.
///
/// Fails when the MFA chains can't be built from the settings.
pub async fn make(cfg: &TollgateApiConfig, settings: Settings) -> anyhow::Result<(Router, OpenApi)> {
    let settings = Arc::new(settings);
    let storage = Arc::new(load_fixtures(&settings).await);

    let registry = Registry::with_defaults(storage.clone());
    let rehash = PasswordRehash::new(storage.clone(), registry.hasher(DEFAULT_COMPONENT)?);

    let mfa = Arc::new(MfaService::new(settings.mfa.clone(), registry));
    mfa.authenticators().context("invalid MFA configuration")?;

    let sessions = SessionLoader::new(storage.clone(), settings.session_cookie.clone());
    let gate = Arc::new(
        AccessGate::new(settings.gate.clone())
            .with_listener(Arc::new(SessionCompletion::new(
                storage.clone(),
                settings.completion_key(),
            )))
            .with_listener(Arc::new(rehash)),
    );

    let context = ApiContext {
        settings: Arc::clone(&settings),
        db: storage,
        mfa: Arc::clone(&mfa),
    };

    let x_request_id = HeaderName::from_static(REQUEST_ID_HEADER);
    let allow_origin = cfg
        .public_url
        .parse::<HeaderValue>()
        .context("public URL is not a valid origin")?;
    let http = ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
        .layer(TraceLayer::new_for_http().make_span_with(make_span))
        .layer(
            CorsLayer::new()
                .allow_credentials(true)
                .allow_origin(allow_origin),
        )
        .layer(PropagateRequestIdLayer::new(x_request_id));

    let openapi = OpenApi::builder()
        .info(
            Info::builder()
                .title("Tollgate API Reference")
                .version(env!("CARGO_PKG_VERSION"))
                .license(Some(
                    License::builder()
                        .name("Apache 2.0 License")
                        .identifier(Some(env!("CARGO_PKG_LICENSE")))
                        .build(),
                )),
        )
        .build();

    let (router, mut api) = OpenApiRouter::with_openapi(openapi)
        .routes(routes!(handlers::health_check))
        .routes(routes!(handlers::mfa::mfa_verify))
        .routes(routes!(handlers::mfa::mfa_status))
        .routes(routes!(handlers::mfa::protected))
        .split_for_parts();

    let router = router
        .route_layer(middleware::from_fn_with_state(gate, gate::enforce))
        .layer(middleware::from_fn_with_state(context.clone(), first_factor))
        .layer(MfaLayer::new(mfa, sessions))
        .layer(http)
        .with_state(context);

    api.paths.paths.iter_mut().for_each(|(_path, item)| {
        apply_default_errors(&mut item.get);
        apply_default_errors(&mut item.post);
        apply_default_errors(&mut item.patch);
        apply_default_errors(&mut item.put);
        apply_default_errors(&mut item.delete);
    });

    Ok((router, api))
}

fn make_span(req: &Request) -> Span {
    let span = info_span!(
        "http_request",
        method = req.method().to_string(),
        request_id = Option::<&str>::None,
        path = Option::<&str>::None,
    );

    if let Some(request_id) = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        span.record("request_id", request_id);
    }

    if let Some(path) = req.extensions().get::<MatchedPath>() {
        span.record("path", path.as_str());
    } else {
        span.record("path", req.uri().path());
    }

    span
}

async fn load_fixtures(settings: &Settings) -> MemoryStorage {
    let fixtures = &settings.fixtures;
    let storage = MemoryStorage::with_identities(
        fixtures.identities.iter().cloned().map(Identity::from_value),
    );
    for (session_id, data) in &fixtures.sessions {
        storage.put_session(session_id.clone(), data.clone()).await;
    }

    info!(
        identities = fixtures.identities.len(),
        sessions = fixtures.sessions.len(),
        "Fixtures loaded"
    );
    storage
}

/// Bridges the first factor into the MFA layer: exposes the identity the
/// first factor stored in the session, and the actions it exempts.
async fn first_factor(State(ctx): State<ApiContext>, mut request: Request, next: Next) -> Response {
    let identity = request
        .extensions()
        .get::<MfaContext>()
        .and_then(|mfa| mfa.request().session_value(&ctx.settings.first_factor.session_key))
        .filter(|value| value.is_object())
        .cloned()
        .map(Identity::from_value);

    if let Some(identity) = identity {
        request
            .extensions_mut()
            .insert(RequestIdentities::new().with(ctx.mfa.identity_attribute(), identity));
    }
    request.extensions_mut().insert(UnauthenticatedActions(
        ctx.settings.first_factor.allow_unauthenticated.clone(),
    ));

    next.run(request).await
}

fn apply_default_errors(item: &mut Option<Operation>) {
    if let Some(item) = item {
        for (status, summary) in [
            ("400", "Bad request"),
            ("401", "Unauthorized"),
            ("500", "Internal server error"),
        ] {
            item.responses.responses.insert(
                status.into(),
                RefOr::Ref(
                    utoipa::openapi::Ref::builder()
                        .summary(summary)
                        .ref_location_from_schema_name(ApiErrorResponse::name())
                        .build(),
                ),
            );
        }
    }
}
