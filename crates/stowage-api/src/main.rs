use std::sync::Arc;
use stowage_api::{routes, server, state::AppState, telemetry};
use stowage_core::Config;
use stowage_storage::LocalStorage;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration
    let config = Config::from_env()?;
    telemetry::init_tracing();
    config.validate()?;

    let storage = LocalStorage::new(
        config.local_storage_path.clone(),
        config.local_storage_base_url.clone(),
    )
    .await?;

    tracing::info!(
        root = %storage.base_path().display(),
        mode = %config.deployment_mode(),
        production = config.is_production(),
        "Local storage ready"
    );

    let state = Arc::new(AppState::new(Arc::new(storage)));
    let app = routes::setup_routes(state);

    server::start_server(&config, app).await?;

    Ok(())
}
