//! The request view authenticators work against.
//!
//! Authenticators never touch the live HTTP request. The entry middleware
//! snapshots what they need (method, URI, parsed body, session document)
//! into an [`AuthRequest`], which keeps them independent of the body stream
//! and easy to drive from tests.

use axum::http::{HeaderMap, Method, Uri, header, request::Parts};
use serde_json::{Map, Value};
use tollgate_common::json_path;

const FORWARDED_PROTO: &str = "x-forwarded-proto";

#[derive(Debug, Clone)]
pub struct AuthRequest {
    method: Method,
    uri: Uri,
    scheme: String,
    host: Option<String>,
    query: Vec<(String, String)>,
    body: Option<Map<String, Value>>,
    session: Option<Value>,
}

impl AuthRequest {
    pub fn new(method: Method, uri: Uri) -> Self {
        let query = uri
            .query()
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default();

        Self {
            scheme: uri.scheme_str().unwrap_or("http").to_string(),
            host: uri.authority().map(|a| a.to_string()),
            method,
            uri,
            query,
            body: None,
            session: None,
        }
    }

    /// Snapshot the method, URI, host and scheme of an incoming request.
    pub fn from_parts(parts: &Parts) -> Self {
        let mut request = Self::new(parts.method.clone(), parts.uri.clone());

        if request.host.is_none() {
            request.host = header_str(&parts.headers, header::HOST.as_str()).map(str::to_string);
        }
        if parts.uri.scheme().is_none() {
            if let Some(proto) = header_str(&parts.headers, FORWARDED_PROTO) {
                request.scheme = proto.to_ascii_lowercase();
            }
        }

        request
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn with_body(mut self, body: Map<String, Value>) -> Self {
        self.body = Some(body);
        self
    }

    /// Parse a raw body according to its content type. Urlencoded forms and
    /// JSON objects are understood; anything else leaves the body unset.
    pub fn with_raw_body(mut self, content_type: Option<&str>, bytes: &[u8]) -> Self {
        self.body = parse_body(content_type, bytes);
        self
    }

    pub fn with_session(mut self, session: Option<Value>) -> Self {
        self.session = session;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// The path plus `?query` when the query is non-empty.
    pub fn path_and_query(&self) -> String {
        match self.uri.query() {
            Some(query) if !query.is_empty() => format!("{}?{}", self.uri.path(), query),
            _ => self.uri.path().to_string(),
        }
    }

    /// The absolute URL without its query string, e.g.
    /// `https://example.com/v1/mfa/verify`. Falls back to the path when the
    /// host is unknown.
    pub fn full_url(&self) -> String {
        match &self.host {
            Some(host) => format!("{}://{}{}", self.scheme, host, self.uri.path()),
            None => self.uri.path().to_string(),
        }
    }

    /// Decoded value of a query parameter. When repeated, the last one wins.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn body(&self) -> Option<&Map<String, Value>> {
        self.body.as_ref()
    }

    pub fn session(&self) -> Option<&Value> {
        self.session.as_ref()
    }

    /// Read a dot path from the session document.
    pub fn session_value(&self, path: &str) -> Option<&Value> {
        self.session
            .as_ref()
            .and_then(|session| json_path::lookup(session, path))
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn parse_body(content_type: Option<&str>, bytes: &[u8]) -> Option<Map<String, Value>> {
    if bytes.is_empty() {
        return None;
    }

    let essence = content_type?
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "application/x-www-form-urlencoded" => Some(
            url::form_urlencoded::parse(bytes)
                .into_owned()
                .map(|(k, v)| (k, Value::String(v)))
                .collect(),
        ),
        "application/json" => match serde_json::from_slice(bytes) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        },
        _ => None,
    }
}
