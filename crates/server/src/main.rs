//! cronpilot server - job event watcher

use cronpilot_adapters::{init_logging, AppConfig};
use cronpilot_server::bootstrap::{initialize_server, log_config_summary};
use cronpilot_server::metrics_api::router;
use tokio::sync::oneshot;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    init_logging(&config.logging)?;

    info!("🚀 Starting cronpilot server");
    let components = initialize_server(config).await?;
    log_config_summary(&components.config);

    let mut stop_signals = Vec::new();
    let mut watcher_tasks = Vec::new();
    for watcher in components.watchers {
        let (stop_tx, stop_rx) = oneshot::channel();
        stop_signals.push(stop_tx);
        watcher_tasks.push(tokio::spawn(async move { watcher.run(stop_rx).await }));
    }

    if components.config.metrics.enabled {
        let port = components.config.metrics.port;
        let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
        let app = router(components.registry.clone());
        info!("📡 Metrics listening on http://0.0.0.0:{}/metrics", port);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("Metrics server stopped: {}", e);
            }
        });
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    for stop in stop_signals {
        let _ = stop.send(());
    }
    for task in watcher_tasks {
        task.await?;
    }
    Ok(())
}
