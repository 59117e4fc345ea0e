use axum::Json;
use tollgate_common::{
    params::MfaVerifyParams,
    views::{MfaStatus, MfaVerifyResponse, ProtectedResource},
};
use tracing::info;

use crate::{auth::Mfa, error::ApiError};


#[utoipa::path(
    post,
    path = "/v1/mfa/verify",
    tags = ["mfa"],
    params(("redirect" = Option<String>, Query, description = "Local path to continue to")),
    request_body(
        content = MfaVerifyParams,
        content_type = "application/x-www-form-urlencoded",
        description = "Field names follow the form authenticator's `fields` mapping"
    ),
    responses((status = 200, description = "Second factor accepted", body = MfaVerifyResponse))
)]
pub async fn mfa_verify(Mfa(context): Mfa) -> Result<Json<MfaVerifyResponse>, ApiError> {
    let outcome = context.outcome();
    if !outcome.is_valid() {
        return Err(ApiError::MfaFailed(outcome.result.clone()));
    }

    info!(authenticator = ?outcome.authenticator, "Second factor verified");
    let redirect = context
        .service()
        .mfa_redirect(context.request())
        .unwrap_or_else(|| "/".to_string());

    Ok(Json(MfaVerifyResponse { redirect }))
}

#[utoipa::path(
    get,
    path = "/v1/mfa/status",
    tags = ["mfa"],
    responses((status = 200, description = "MFA state of the current request", body = MfaStatus))
)]
pub async fn mfa_status(Mfa(context): Mfa) -> Json<MfaStatus> {
    let outcome = context.outcome();

    Json(MfaStatus {
        status: outcome.status(),
        authenticator: outcome.authenticator.as_ref().map(|a| a.name.clone()),
        identifier: outcome.identifier.as_ref().map(|i| i.name.clone()),
        errors: outcome.result.errors().to_vec(),
    })
}

#[utoipa::path(
    get,
    path = "/v1/protected",
    tags = ["mfa"],
    responses((status = 200, description = "Reached only with a completed second factor", body = ProtectedResource))
)]
pub async fn protected(Mfa(context): Mfa) -> Json<ProtectedResource> {
    Json(ProtectedResource {
        message: "Second factor verified".into(),
        authenticator: context
            .outcome()
            .authenticator
            .as_ref()
            .map(|a| a.name.clone()),
    })
}
