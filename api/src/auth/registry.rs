//! Name → factory registry for MFA components.
//!
//! Configuration names identifiers and authenticators by string. The registry
//! maps those names onto factories, and also holds the named identity
//! resolvers and password hashers that identifiers refer to in their options.

use std::{collections::HashMap, fmt, sync::Arc};

use serde::Deserialize;
use serde_json::{Map, Value};
use tollgate_db::{BcryptHasher, IdentityResolver, PasswordHasher};
use tracing::debug;

use super::{
    authenticators::{Authenticator, FormAuthenticator, SessionAuthenticator},
    error::ConfigError,
    identifiers::{Identifier, IdentifierChain, PasswordIdentifier},
};

/// Name of the resolver and hasher used when a component does not pick one.
pub const DEFAULT_COMPONENT: &str = "default";

pub type IdentifierFactory = Arc<
    dyn Fn(&str, &Map<String, Value>, &Registry) -> Result<Box<dyn Identifier>, ConfigError>
        + Send
        + Sync,
>;

pub type AuthenticatorFactory = Arc<
    dyn Fn(
            &str,
            &Map<String, Value>,
            Arc<IdentifierChain>,
        ) -> Result<Box<dyn Authenticator>, ConfigError>
        + Send
        + Sync,
>;

/// One entry of a configured chain.
///
/// `name` selects the registered factory. `alias` names the entry inside the
/// chain when the same component is wanted twice with different options.
/// Every other key is passed to the factory as options.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ComponentSpec {
    pub name: String,

    #[serde(default)]
    pub alias: Option<String>,

    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl ComponentSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            options: Map::new(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Name of this entry inside its chain.
    pub fn chain_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Clone, Default)]
pub struct Registry {
    identifiers: HashMap<String, IdentifierFactory>,
    authenticators: HashMap<String, AuthenticatorFactory>,
    resolvers: HashMap<String, Arc<dyn IdentityResolver>>,
    hashers: HashMap<String, Arc<dyn PasswordHasher>>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("identifiers", &sorted_keys(&self.identifiers))
            .field("authenticators", &sorted_keys(&self.authenticators))
            .field("resolvers", &sorted_keys(&self.resolvers))
            .field("hashers", &sorted_keys(&self.hashers))
            .finish()
    }
}

fn sorted_keys<V>(map: &HashMap<String, V>) -> Vec<&str> {
    let mut keys: Vec<_> = map.keys().map(String::as_str).collect();
    keys.sort_unstable();
    keys
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in components: the `Password` identifier,
    /// the `Form` and `Session` authenticators, `resolver` as the default
    /// resolver and a bcrypt hasher as the default hasher.
    pub fn with_defaults(resolver: Arc<dyn IdentityResolver>) -> Self {
        Self::new()
            .with_identifier("Password", |name, options, registry| {
                Ok(Box::new(PasswordIdentifier::from_options(name, options, registry)?))
            })
            .with_authenticator("Form", |name, options, identifiers| {
                Ok(Box::new(FormAuthenticator::from_options(name, options, identifiers)?))
            })
            .with_authenticator("Session", |name, options, identifiers| {
                Ok(Box::new(SessionAuthenticator::from_options(
                    name,
                    options,
                    identifiers,
                )?))
            })
            .with_resolver(DEFAULT_COMPONENT, resolver)
            .with_hasher(DEFAULT_COMPONENT, Arc::new(BcryptHasher::default()))
    }

    pub fn with_identifier<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&str, &Map<String, Value>, &Registry) -> Result<Box<dyn Identifier>, ConfigError>
            + Send
            + Sync
            + 'static,
    {
        self.identifiers.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn with_authenticator<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(
                &str,
                &Map<String, Value>,
                Arc<IdentifierChain>,
            ) -> Result<Box<dyn Authenticator>, ConfigError>
            + Send
            + Sync
            + 'static,
    {
        self.authenticators.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn with_resolver(
        mut self,
        name: impl Into<String>,
        resolver: Arc<dyn IdentityResolver>,
    ) -> Self {
        self.resolvers.insert(name.into(), resolver);
        self
    }

    pub fn with_hasher(mut self, name: impl Into<String>, hasher: Arc<dyn PasswordHasher>) -> Self {
        self.hashers.insert(name.into(), hasher);
        self
    }

    pub fn resolver(&self, name: &str) -> Result<Arc<dyn IdentityResolver>, ConfigError> {
        self.resolvers
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownResolver(name.to_string()))
    }

    pub fn hasher(&self, name: &str) -> Result<Arc<dyn PasswordHasher>, ConfigError> {
        self.hashers
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownHasher(name.to_string()))
    }

    /// Build an identifier chain from `specs`, in order.
    pub fn build_identifiers(&self, specs: &[ComponentSpec]) -> Result<IdentifierChain, ConfigError> {
        let mut chain = IdentifierChain::new();
        let mut seen = Vec::with_capacity(specs.len());

        for spec in specs {
            let chain_name = unique_name(&mut seen, spec)?;
            let factory = self
                .identifiers
                .get(&spec.name)
                .ok_or_else(|| ConfigError::UnknownIdentifier(spec.name.clone()))?;

            debug!(identifier = %chain_name, component = %spec.name, "Building identifier");
            chain.push(chain_name, factory(chain_name, &spec.options, self)?);
        }

        Ok(chain)
    }

    /// Build the authenticators of `specs`, in order, each sharing
    /// `identifiers`.
    pub fn build_authenticators(
        &self,
        specs: &[ComponentSpec],
        identifiers: Arc<IdentifierChain>,
    ) -> Result<Vec<(String, Box<dyn Authenticator>)>, ConfigError> {
        let mut seen = Vec::with_capacity(specs.len());

        specs
            .iter()
            .map(|spec| {
                let chain_name = unique_name(&mut seen, spec)?;
                let factory = self
                    .authenticators
                    .get(&spec.name)
                    .ok_or_else(|| ConfigError::UnknownAuthenticator(spec.name.clone()))?;

                debug!(authenticator = %chain_name, component = %spec.name, "Building authenticator");
                let authenticator = factory(chain_name, &spec.options, Arc::clone(&identifiers))?;
                Ok((chain_name.to_string(), authenticator))
            })
            .collect()
    }
}

fn unique_name<'a>(
    seen: &mut Vec<&'a str>,
    spec: &'a ComponentSpec,
) -> Result<&'a str, ConfigError> {
    let name = spec.chain_name();
    if seen.contains(&name) {
        return Err(ConfigError::DuplicateComponent(name.to_string()));
    }
    seen.push(name);
    Ok(name)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tollgate_db::MemoryStorage;

    use super::*;
    use crate::auth::testing::{StubAuthenticator, StubIdentifier, TEST_COST};

    fn registry() -> Registry {
        Registry::with_defaults(Arc::new(MemoryStorage::new()))
            .with_hasher(DEFAULT_COMPONENT, Arc::new(BcryptHasher::new(TEST_COST).unwrap()))
    }

    #[test]
    fn component_spec_reads_flattened_options() {
        let spec: ComponentSpec = toml::from_str(
            r#"
            name = "Form"
            alias = "MfaForm"
            loginUrl = ["/a", "/b"]
            "#,
        )
        .unwrap();

        assert_eq!(spec.chain_name(), "MfaForm");
        assert_eq!(spec.options.get("loginUrl"), Some(&json!(["/a", "/b"])));
        assert!(!spec.options.contains_key("name"));
    }

    #[test]
    fn builds_chains_in_configured_order() {
        let registry = registry().with_identifier("Stub", |_, _, _| {
            Ok(Box::new(StubIdentifier::failing(&[])))
        });

        let identifiers = registry
            .build_identifiers(&[
                ComponentSpec::new("Stub"),
                ComponentSpec::new("Password").with_option("resolver", "default"),
            ])
            .unwrap();
        assert_eq!(identifiers.names().collect::<Vec<_>>(), vec!["Stub", "Password"]);

        let authenticators = registry
            .build_authenticators(
                &[ComponentSpec::new("Session"), ComponentSpec::new("Form")],
                Arc::new(identifiers),
            )
            .unwrap();
        let names: Vec<_> = authenticators.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["Session", "Form"]);
        assert_eq!(authenticators[1].1.kind(), "form");
    }

    #[test]
    fn unknown_components_are_configuration_errors() {
        let registry = registry();

        let err = registry
            .build_identifiers(&[ComponentSpec::new("Ldap")])
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::UnknownIdentifier(name) if name == "Ldap"));

        // Registered, but as an identifier rather than an authenticator.
        let err = registry
            .build_authenticators(&[ComponentSpec::new("Password")], Arc::default())
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::UnknownAuthenticator(name) if name == "Password"));

        assert!(matches!(
            registry.hasher("argon2").err().unwrap(),
            ConfigError::UnknownHasher(_)
        ));
    }

    #[test]
    fn duplicate_chain_names_are_rejected_unless_aliased() {
        let registry = registry()
            .with_authenticator("Stub", |_, _, _| {
                Ok(Box::new(StubAuthenticator::returning(
                    tollgate_common::AuthResult::other(vec![]),
                )))
            });

        let err = registry
            .build_authenticators(
                &[ComponentSpec::new("Stub"), ComponentSpec::new("Stub")],
                Arc::default(),
            )
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::DuplicateComponent(name) if name == "Stub"));

        let built = registry
            .build_authenticators(
                &[
                    ComponentSpec::new("Stub"),
                    ComponentSpec::new("Stub").with_alias("Backup"),
                ],
                Arc::default(),
            )
            .unwrap();
        assert_eq!(built.len(), 2);
    }

    #[test]
    fn invalid_options_name_the_component() {
        let err = registry()
            .build_authenticators(
                &[ComponentSpec::new("Form").with_option("urlChecker", "regex")],
                Arc::default(),
            )
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::InvalidOptions { component, .. } if component == "Form"));
    }
}
