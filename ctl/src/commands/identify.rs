use clap::Parser;
use tollgate_api::config::Settings;
use tollgate_common::{
    Credentials,
    credentials::{PASSWORD, USER_SESSION_ID},
};

#[derive(Clone, Parser)]
pub struct IdentifyParams {
    #[clap(short, long)]
    pub user: String,

    #[clap(short, long)]
    pub password: String,
}

pub async fn identify(
    settings: &Settings,
    IdentifyParams { user, password }: IdentifyParams,
) -> anyhow::Result<()> {
    let service = super::service(settings);
    let credentials = Credentials::new()
        .with(USER_SESSION_ID, user)
        .with(PASSWORD, password);

    let identification = service.identifiers()?.identify(&credentials).await;

    match (&identification.identified, &identification.identifier) {
        (Some(identified), Some(identifier)) => {
            println!("Identified by {identifier}");
            println!(
                "{}",
                serde_json::to_string_pretty(&identified.identity)?
            );
            if identified.needs_rehash {
                println!("Stored hash should be upgraded");
            }
        }
        _ => {
            for error in identification.flattened_errors() {
                println!("{error}");
            }
            anyhow::bail!("no identity matched");
        }
    }

    Ok(())
}
