use std::sync::Arc;

use anyhow::Context;

use pentrack_api::app::{build_app, services::AppServices};
use pentrack_api::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pentrack_observability::init();

    let config = ApiConfig::from_env().context("invalid configuration")?;
    let services = AppServices::from_config(&config)
        .await
        .context("failed to initialise document store")?;

    if let Some(email) = &config.bootstrap_owner_email {
        services
            .bootstrap_owner(email)
            .await
            .context("failed to bootstrap owner account")?;
    }

    let app = build_app(&config, Arc::new(services));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
