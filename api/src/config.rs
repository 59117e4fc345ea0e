use std::{collections::BTreeMap, net::SocketAddr, path::PathBuf};

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use serde_json::Value;

use crate::auth::{
    gate::GateConfig, registry::ComponentSpec, service::MfaConfig,
    sessions::DEFAULT_SESSION_COOKIE,
};

#[derive(Clone, Debug, Parser)]
pub struct TollgateApiConfig {
    #[clap(
        short,
        long,
        env = "TOLLGATE_API_BIND_ADDR",
        default_value = "0.0.0.0:4000"
    )]
    pub bind_addr: SocketAddr,

    #[clap(
        long,
        env = "TOLLGATE_API_PUBLIC_URL",
        default_value = "http://localhost:4000"
    )]
    pub public_url: String,

    #[clap(long, default_value_t = false)]
    pub dump_openapi: bool,

    /// Path to the TOML settings file (MFA chains, access gate, fixtures).
    ///
    /// Without a settings file the server runs with [`Settings::default`]:
    /// session and form authentication backed by an empty identity store.
    #[clap(short, long, env = "TOLLGATE_API_SETTINGS")]
    pub settings: Option<PathBuf>,
}

impl TollgateApiConfig {
    /// Load the settings file, or the defaults when none is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the file can't be read or isn't valid settings.
    pub fn load_settings(&self) -> anyhow::Result<Settings> {
        match &self.settings {
            Some(path) => Settings::from_file(path),
            None => Ok(Settings::default()),
        }
    }
}

/// Contents of the settings file.
///
/// ```toml
/// sessionCookie = "tollgate_session"
///
/// [mfa]
/// queryParam = "redirect"
/// unauthenticatedRedirect = "/login"
///
/// [[mfa.identifiers]]
/// name = "Password"
///
/// [[mfa.authenticators]]
/// name = "Form"
/// loginUrl = "/v1/mfa/verify"
///
/// [gate]
/// allowUnauthenticated = ["/v1/mfa/verify"]
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Settings {
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,

    #[serde(default)]
    pub first_factor: FirstFactorSettings,

    #[serde(default = "default_mfa")]
    pub mfa: MfaConfig,

    #[serde(default = "default_gate")]
    pub gate: GateConfig,

    #[serde(default)]
    pub fixtures: Fixtures,
}

/// Where the first factor left its identity, and which actions it lets
/// through without one.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FirstFactorSettings {
    /// Session key holding the first-factor identity.
    #[serde(default = "default_first_factor_session_key")]
    pub session_key: String,

    #[serde(default)]
    pub allow_unauthenticated: Vec<String>,
}

impl Default for FirstFactorSettings {
    fn default() -> Self {
        Self {
            session_key: default_first_factor_session_key(),
            allow_unauthenticated: Vec::new(),
        }
    }
}

/// Records loaded into the in-memory store at startup.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Fixtures {
    #[serde(default)]
    pub identities: Vec<Value>,

    /// Session documents by session id.
    #[serde(default)]
    pub sessions: BTreeMap<String, Value>,
}

fn default_session_cookie() -> String {
    DEFAULT_SESSION_COOKIE.to_string()
}

fn default_first_factor_session_key() -> String {
    "Auth".to_string()
}

fn default_mfa() -> MfaConfig {
    MfaConfig {
        identifiers: vec![ComponentSpec::new("Password")],
        authenticators: vec![
            ComponentSpec::new("Session"),
            ComponentSpec::new("Form").with_option("loginUrl", "/v1/mfa/verify"),
        ],
        query_param: Some("redirect".into()),
        ..MfaConfig::default()
    }
}

fn default_gate() -> GateConfig {
    GateConfig {
        allow_unauthenticated: vec![
            "/healthz".into(),
            "/v1/mfa/verify".into(),
            "/v1/mfa/status".into(),
        ],
        ..GateConfig::default()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            session_cookie: default_session_cookie(),
            first_factor: FirstFactorSettings::default(),
            mfa: default_mfa(),
            gate: default_gate(),
            fixtures: Fixtures::default(),
        }
    }
}

impl Settings {
    pub fn from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("invalid settings file {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Session path at which a completed second factor is recorded: the
    /// gate's flag inside the first-factor identity.
    pub fn completion_key(&self) -> String {
        format!("{}.{}", self.first_factor.session_key, self.gate.session_key)
    }
}
