//! Session lookup for incoming requests.
//!
//! The session id travels in a cookie. The session document is read from the
//! configured [`SessionStore`] and handed to authenticators as a JSON value.

use std::sync::Arc;

use axum::http::{HeaderMap, header};
use serde_json::Value;
use tollgate_db::{SessionStore, StoreError};
use tracing::{debug, instrument};

pub const DEFAULT_SESSION_COOKIE: &str = "tollgate_session";

#[derive(Clone)]
pub struct SessionLoader {
    store: Arc<dyn SessionStore>,
    cookie_name: String,
}

impl SessionLoader {
    pub fn new(store: Arc<dyn SessionStore>, cookie_name: impl Into<String>) -> Self {
        Self {
            store,
            cookie_name: cookie_name.into(),
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Session id carried by the request, if any.
    pub fn session_id(&self, headers: &HeaderMap) -> Option<String> {
        extract_cookie(headers, &self.cookie_name).filter(|id| !id.is_empty())
    }

    /// Load the session named by the request cookie. Requests without a
    /// cookie, or naming an unknown session, have no session.
    #[instrument(skip(self))]
    pub async fn load(&self, session_id: Option<&str>) -> Result<Option<Value>, StoreError> {
        let Some(session_id) = session_id else {
            return Ok(None);
        };

        let session = self.store.read_session(session_id).await?;
        if session.is_none() {
            debug!("Session cookie names an unknown session");
        }
        Ok(session)
    }
}

/// Extract cookie value from Cookie header
fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .map(str::trim)
        .find_map(|cookie| cookie.strip_prefix(&prefix))
        .map(str::to_string)
}
