use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tollgate_common::{AuthResult, views::ApiErrorResponse};
use tollgate_db::StoreError;

use crate::auth::error::{ConfigError, Unauthenticated};

const INTERNAL_MESSAGE: &str = "Something went wrong on our end. Please try again later.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Unauthenticated(#[from] Unauthenticated),

    #[error("Multi-factor authentication failed: {}", .0.status())]
    MfaFailed(AuthResult),

    #[error("The MFA middleware has not run for this request")]
    MissingMfaContext,

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    InternalAnyhow(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Storage(StoreError::SessionNotFound(_)) => StatusCode::NOT_FOUND,
            Self::Storage(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Config(_) | Self::MissingMfaContext | Self::InternalAnyhow(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Unauthenticated(e) => e.status_code(),
            Self::MfaFailed(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<ApiError> for ApiErrorResponse {
    fn from(err: ApiError) -> Self {
        let (code, message, errors) = match &err {
            ApiError::Storage(StoreError::SessionNotFound(_)) => {
                ("NotFound", "The session was not found.".to_string(), Vec::new())
            }
            ApiError::Storage(StoreError::Unavailable(_)) => (
                "Unavailable",
                "A backing service is unavailable. Please try again later.".to_string(),
                Vec::new(),
            ),
            ApiError::Unauthenticated(e) => ("Unauthorized", e.message().to_string(), Vec::new()),
            ApiError::MfaFailed(result) => (
                "MfaFailed",
                "The second authentication factor was not accepted.".to_string(),
                result.errors().to_vec(),
            ),
            ApiError::BadRequest(message) => ("BadRequest", message.clone(), Vec::new()),
            ApiError::Storage(_)
            | ApiError::Config(_)
            | ApiError::MissingMfaContext
            | ApiError::InternalAnyhow(_) => {
                ("InternalError", INTERNAL_MESSAGE.to_string(), Vec::new())
            }
        };

        ApiErrorResponse {
            code: Some(code.into()),
            message,
            errors,

            #[cfg(debug_assertions)]
            details: Some(err.to_string()),

            #[cfg(not(debug_assertions))]
            details: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        if status_code.is_server_error() {
            tracing::error!("Error returned by handler: {self}");
        } else {
            tracing::debug!("Request rejected: {self}");
        }

        // Kept on the response so the MFA middleware can turn it into a
        // redirect.
        let signal = match &self {
            Self::Unauthenticated(e) => Some(e.clone()),
            _ => None,
        };

        let mut response =
            (status_code, Json(Into::<ApiErrorResponse>::into(self))).into_response();
        if let Some(signal) = signal {
            response.extensions_mut().insert(signal);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthenticated_responses_carry_the_signal() {
        let response =
            ApiError::Unauthenticated(Unauthenticated::new(Some("Finish MFA first"))).into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.extensions().get::<Unauthenticated>().map(|e| e.message()),
            Some("Finish MFA first")
        );
    }

    #[test]
    fn failed_mfa_lists_authenticator_errors() {
        let err = ApiError::MfaFailed(AuthResult::identity_not_found(vec![
            "Password: Credentials did not match any identity".into(),
        ]));
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let body = ApiErrorResponse::from(err);
        assert_eq!(body.code.as_deref(), Some("MfaFailed"));
        assert_eq!(body.errors.len(), 1);
    }

    #[test]
    fn configuration_errors_are_internal() {
        let err = ApiError::from(ConfigError::NoAuthenticators);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ApiErrorResponse::from(err).message, INTERNAL_MESSAGE);
    }
}
