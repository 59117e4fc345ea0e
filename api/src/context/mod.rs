use std::sync::Arc;

use tollgate_db::Storage;

use crate::{auth::MfaService, config::Settings};

/// Shared state handed to handlers and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub settings: Arc<Settings>,
    pub db: Arc<dyn Storage>,
    pub mfa: Arc<MfaService>,
}
