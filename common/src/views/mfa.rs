use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::result::AuthStatus;

/// State of multi-factor authentication for the current request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MfaStatus {
    /// Status of the authentication attempt made for this request.
    pub status: AuthStatus,

    /// Name of the authenticator that accepted the request, if any.
    pub authenticator: Option<String>,

    /// Name of the identifier that matched the credentials, if any.
    pub identifier: Option<String>,

    /// Errors collected while authenticating.
    pub errors: Vec<String>,
}

/// Response for a successful second-factor verification.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MfaVerifyResponse {
    /// Where the client should continue. This is the same-origin target the
    /// client was sent away from, or `/` when there is none.
    pub redirect: String,
}

/// Returned by routes behind the access gate.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProtectedResource {
    pub message: String,

    /// Authenticator that satisfied the second factor for this request.
    pub authenticator: Option<String>,
}
