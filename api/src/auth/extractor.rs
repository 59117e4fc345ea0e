use axum::{extract::FromRequestParts, http::request::Parts};

use super::middleware::MfaContext;
use crate::error::ApiError;

/// Extractor for the [`MfaContext`] attached by the entry middleware.
///
/// Fails with a 500 when the middleware is not installed on the route.
///
/// # Examples
///
/// ```rust,ignore
/// use tollgate_api::auth::extractor::Mfa;
///
/// pub async fn mfa_status(Mfa(context): Mfa) -> Json<MfaStatus> {
///     let outcome = context.outcome();
///     // ...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Mfa(pub MfaContext);

impl<S> FromRequestParts<S> for Mfa
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<MfaContext>()
            .cloned()
            .map(Mfa)
            .ok_or(ApiError::MissingMfaContext)
    }
}
