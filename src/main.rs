use callflow::application::{CallFlowService, CallFlowSettings};
use callflow::config::Config;
use callflow::domain::call::gateway::ProviderGateway;
use callflow::infrastructure::provider::AcsGateway;
use callflow::infrastructure::session_store::SessionStore;
use callflow::interface::api::{build_router, init_metrics, AppState};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Config file looked up when `CALLFLOW_CONFIG` is not set
const DEFAULT_CONFIG: &str = "callflow";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting callflow IVR controller");

    // Load configuration
    let config_path = std::env::var("CALLFLOW_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG.to_string());
    let config = Config::load(&config_path)?;
    info!("Configuration loaded: {:?}", config);

    // Provider gateway and call flow
    let gateway: Arc<dyn ProviderGateway> = Arc::new(AcsGateway::new(&config.provider)?);
    let store = Arc::new(SessionStore::new());
    let service = Arc::new(CallFlowService::new(
        gateway,
        store,
        CallFlowSettings::from(&config),
    ));

    // Idle session sweep
    if let Some(idle_timeout) = config.session.idle_timeout() {
        let service = service.clone();
        let period = config.session.sweep_interval();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                service.sweep_idle_sessions(idle_timeout).await;
            }
        });
        info!(
            "Idle session sweep started (timeout {}s)",
            idle_timeout.as_secs()
        );
    }

    // Initialize metrics exporter
    info!("Initializing Prometheus metrics exporter");
    let prometheus_handle = match init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Metrics exporter unavailable: {}", e);
            None
        }
    };

    if !config.server.audio_dir.is_dir() {
        warn!(
            "Audio directory {} does not exist; prompts will not be served",
            config.server.audio_dir.display()
        );
    }

    let app = build_router(
        AppState::new(service),
        prometheus_handle,
        &config.server.audio_dir,
    );
    let address = config.bind_address()?;
    let listener = tokio::net::TcpListener::bind(address).await?;
    info!("HTTP server listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down callflow IVR controller");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}
