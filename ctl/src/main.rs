use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::{HashPasswordParams, IdentifyParams};

mod commands;

#[derive(Parser)]
pub struct Args {
    #[clap(subcommand)]
    command: Command,

    /// Settings file of the API server.
    #[clap(short = 'S', long, env = "TOLLGATE_API_SETTINGS")]
    settings: Option<PathBuf>,
}

#[derive(Clone, Subcommand)]
pub enum Command {
    /// Hash a password for an identity fixture.
    #[command(name = "hash-password")]
    HashPassword(HashPasswordParams),

    /// Build the MFA chains from the settings and list them.
    #[command(name = "check-config")]
    CheckConfig,

    /// Run credentials through the identifier chain against the fixtures.
    #[command(name = "identify")]
    Identify(IdentifyParams),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.command {
        Command::HashPassword(params) => commands::hash_password(params)?,
        Command::CheckConfig => {
            let settings = commands::load_settings(args.settings.as_deref())?;
            commands::check_config(&settings)?;
        }
        Command::Identify(params) => {
            let settings = commands::load_settings(args.settings.as_deref())?;
            commands::identify(&settings, params).await?;
        }
    }

    Ok(())
}
