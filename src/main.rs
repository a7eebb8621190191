use std::sync::Arc;

use anyhow::Context;
use rendezvous::event::HttpConfigLoader;
use rendezvous::kernel::{Orchestrator, OrchestratorOptions, SystemClock};
use rendezvous::services::{HttpActionsFactory, HttpTransport, JsonFileStore};
use rendezvous::Settings;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Logging (RUST_LOG, default info)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")?;

    // 2. Settings
    let path = Settings::resolve_path(std::env::args().nth(1));
    let settings = Settings::load(&path).with_context(|| format!("loading {}", path.display()))?;
    tracing::info!(config = %path.display(), "Rendezvous booting...");

    // 3. Collaborators
    let client = HttpTransport::build_client(settings.request_timeout());
    let loader = HttpConfigLoader::new(client.clone(), &settings.data_url).with_cache(&settings.bundle_dir);
    let factory = HttpActionsFactory::new(client, settings.endpoints());
    let store = Arc::new(JsonFileStore::new(&settings.store_path));

    let mut orchestrator = Orchestrator::new(
        store,
        factory,
        loader,
        Arc::new(SystemClock),
        OrchestratorOptions::from_settings(&settings),
    );

    // 4. Stop on Ctrl+C
    let cancel = orchestrator.cancellation_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Ctrl+C received, shutting down");
                cancel.cancel();
            }
            Err(e) => tracing::warn!("Cannot listen for Ctrl+C: {}", e),
        }
    });

    orchestrator.run().await?;
    Ok(())
}
