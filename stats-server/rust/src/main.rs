use std::path::Path;

use anyhow::Result;
use axum::Router;
use tracing::info;
mod assets;
mod error;
mod infra;
mod stats;

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv_loaded = dotenv::dotenv().is_ok();
    infra::telemetry::init()?;
    info!(dotenv_loaded, "starting stats server");
    let config = infra::config::get();

    let repo = stats::Repository::new(config.get_data_path());
    let store = repo.load().await;

    info!(path = %repo.path().display(), "loaded snapshot");

    let router = app(repo, store, config.get_public_dir())?;

    info!("initialized router");

    let address = config.get_address();
    info!("stats server running on http://{address}");

    axum::Server::bind(&address.parse()?)
        .serve(router.into_make_service())
        .with_graceful_shutdown(infra::os::shutdown_signal())
        .await?;

    infra::telemetry::shutdown();
    Ok(())
}

fn app(repo: stats::Repository, store: stats::Store, public_dir: &Path) -> Result<Router> {
    let router = Router::new()
        .merge(stats::router(repo, store))
        .merge(assets::router(public_dir)?);

    Ok(infra::cors::permissive(router).layer(infra::telemetry::tracing_middleware()))
}
