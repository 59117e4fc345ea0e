//! Helpers for component options.
//!
//! Component options arrive as loosely-typed JSON maps (from TOML settings or
//! built in code) and are deserialized into each component's typed config.

use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use super::error::ConfigError;

/// Deserialize `options` into `T`, attributing failures to `component`.
pub fn parse_options<T: DeserializeOwned>(
    component: &str,
    options: &Map<String, Value>,
) -> Result<T, ConfigError> {
    serde_json::from_value(Value::Object(options.clone())).map_err(|source| {
        ConfigError::InvalidOptions {
            component: component.to_string(),
            source,
        }
    })
}

/// An option that accepts either a single string or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let items: &[String] = match self {
            Self::One(one) => std::slice::from_ref(one),
            Self::Many(many) => many,
        };
        items.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

impl From<&str> for OneOrMany {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Sample {
        urls: OneOrMany,
    }

    #[test]
    fn one_or_many_accepts_both_shapes() {
        let one: Sample = serde_json::from_value(json!({ "urls": "/a" })).unwrap();
        let many: Sample = serde_json::from_value(json!({ "urls": ["/a", "/b"] })).unwrap();

        assert_eq!(one.urls.iter().collect::<Vec<_>>(), vec!["/a"]);
        assert_eq!(many.urls.iter().collect::<Vec<_>>(), vec!["/a", "/b"]);
        assert!(OneOrMany::Many(vec![]).is_empty());
    }

    #[test]
    fn parse_options_names_the_component() {
        let options = json!({ "bogus": true });
        let err = parse_options::<Sample>("Form", options.as_object().unwrap()).unwrap_err();

        assert!(matches!(&err, ConfigError::InvalidOptions { component, .. } if component == "Form"));
        assert!(err.to_string().starts_with("Invalid options for `Form`"));
    }
}
