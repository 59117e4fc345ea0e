use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tollgate_api::{config::TollgateApiConfig, server};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = TollgateApiConfig::parse();

    if !config.dump_openapi {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or("tollgate_api=info,tollgate_common=info,tollgate_db=info".into()),
            )
            .pretty()
            .init();
    }

    let settings = config.load_settings()?;
    let (router, api) = server::make(&config, settings).await?;

    if config.dump_openapi {
        print!("{}", api.to_pretty_json()?);
        return Ok(());
    }

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .context("Failed to bind to address")?;

    info!("Listening on http://{:?}", config.bind_addr);

    axum::serve(listener, router)
        .await
        .context("Failed to start server")?;

    Ok(())
}
