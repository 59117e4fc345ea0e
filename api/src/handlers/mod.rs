use axum::extract::State;

use crate::{context::ApiContext, error::ApiError};

pub mod mfa;

#[utoipa::path(
    get,
    path = "/healthz",
    tags = ["health"],
    responses((status = 200, description = "Service is healthy", body = String))
)]
pub async fn health_check(State(ctx): State<ApiContext>) -> Result<&'static str, ApiError> {
    ctx.db.ping().await?;
    Ok("Healthy")
}
