//! Input parameters accepted by the Tollgate HTTP surface.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of the second-factor verification form.
///
/// The form authenticator reads the body generically through its configured
/// field mapping; this type documents the default mapping.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct MfaVerifyParams {
    /// Identifier established by the first factor (user or session id).
    pub user_session_id: String,

    /// The second-factor secret.
    pub password: String,
}
