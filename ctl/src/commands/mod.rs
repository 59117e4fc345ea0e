use std::{path::Path, sync::Arc};

use tollgate_api::{
    auth::{MfaService, Registry},
    config::Settings,
};
use tollgate_common::Identity;
use tollgate_db::MemoryStorage;

mod check_config;
mod hash_password;
mod identify;

pub use check_config::check_config;
pub use hash_password::{HashPasswordParams, hash_password};
pub use identify::{IdentifyParams, identify};

pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    match path {
        Some(path) => Settings::from_file(path),
        None => Ok(Settings::default()),
    }
}

/// The service the API server would build, backed by the identity fixtures.
fn service(settings: &Settings) -> MfaService {
    let storage = MemoryStorage::with_identities(
        settings
            .fixtures
            .identities
            .iter()
            .cloned()
            .map(Identity::from_value),
    );

    MfaService::new(
        settings.mfa.clone(),
        Registry::with_defaults(Arc::new(storage)),
    )
}
