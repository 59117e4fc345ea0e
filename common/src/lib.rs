//! Types shared by the Tollgate crates: identities, credentials,
//! authentication results, and the HTTP params/views.

pub mod credentials;
pub mod identity;
pub mod json_path;
pub mod params;
pub mod result;
pub mod views;

pub use credentials::Credentials;
pub use identity::Identity;
pub use result::{AuthResult, AuthStatus};
