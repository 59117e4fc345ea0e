//! Tollgate API service.
//!
//! Puts a pluggable second authentication factor in front of an axum
//! application: a configurable chain of authenticators runs on every request,
//! and an access gate keeps routes closed until the second factor is done.
//!
//! # Configuration
//!
//! Process options come from the command line or environment, see
//! [`config::TollgateApiConfig`]. The MFA chains, the gate and startup
//! fixtures are read from a TOML file, see [`config::Settings`].
//!
//! # Authentication
//!
//! See [`auth`] for the identifiers, authenticators and middleware.

pub mod auth;
pub mod config;
pub mod error;
pub mod listeners;
pub mod server;

pub(crate) mod context;
pub(crate) mod handlers;
