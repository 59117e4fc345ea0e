use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::json_path;

/// Key used when a non-object value is normalized into an [`Identity`].
pub const SCALAR_IDENTITY_KEY: &str = "value";

/// An authenticated principal plus whatever metadata the identity source
/// attached to it.
///
/// Identities are opaque key-value records. The MFA layer only ever reads
/// them by key or dot path, for example the `session.is_mfa_completed` flag
/// the access gate inspects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(Map<String, Value>);

impl Identity {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Normalize an arbitrary JSON value into an identity. Objects are taken
    /// as-is, anything else is wrapped under [`SCALAR_IDENTITY_KEY`].
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            other => {
                let mut map = Map::new();
                map.insert(SCALAR_IDENTITY_KEY.to_string(), other);
                Self(map)
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Look up a dot-separated path, e.g. `session.is_mfa_completed`.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        json_path::lookup_in(&self.0, path)
    }

    /// Whether the value at `path` is present and truthy.
    pub fn flag(&self, path: &str) -> bool {
        self.get_path(path).is_some_and(json_path::is_truthy)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Identity {
    fn from(value: Map<String, Value>) -> Self {
        Self(value)
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<&str> = self.0.keys().map(String::as_str).collect();
        write!(f, "Identity {{ fields: {:?} }}", keys)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn objects_are_kept_verbatim() {
        let identity = Identity::from_value(json!({ "id": 7, "user_session_id": "bob" }));
        assert_eq!(identity.get_str("user_session_id"), Some("bob"));
        assert_eq!(identity.get("id"), Some(&json!(7)));
    }

    #[test]
    fn scalars_are_wrapped() {
        let identity = Identity::from_value(json!(true));
        assert_eq!(identity.get(SCALAR_IDENTITY_KEY), Some(&json!(true)));
        assert_eq!(identity.as_map().len(), 1);
    }

    #[test]
    fn flag_reads_nested_paths() {
        let identity = Identity::from_value(json!({
            "session": { "is_mfa_completed": true },
            "other": { "is_mfa_completed": 0 }
        }));
        assert!(identity.flag("session.is_mfa_completed"));
        assert!(!identity.flag("other.is_mfa_completed"));
        assert!(!identity.flag("missing.path"));
    }

    #[test]
    fn display_lists_field_names_only() {
        let identity = Identity::from_value(json!({ "password": "$2b$04$secret" }));
        let shown = identity.to_string();
        assert!(shown.contains("password"));
        assert!(!shown.contains("secret"));
    }
}
