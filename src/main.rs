use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use castgrid_player::config::{self, AppConfig, Backend};
use castgrid_player::demo;
use castgrid_player::device_id;
use castgrid_player::errors::AppError;
use castgrid_player::http_store::HttpJsonStore;
use castgrid_player::memory_store::MemoryStore;
use castgrid_player::model::SessionState;
use castgrid_player::session::DeviceSession;
use castgrid_player::store::ConfigStore;
use castgrid_player::zone::ZoneEvent;

fn resolve_device_id(config: &AppConfig) -> String {
    match &config.device_id {
        Some(id) => {
            if !device_id::is_valid(id) {
                warn!(
                    "Configured device_id '{}' does not follow the tv_<id>_<nnnn> convention",
                    id
                );
            }
            id.clone()
        }
        None => {
            let id = device_id::generate();
            warn!(
                "No device_id configured. Generated '{}'; register it in the admin dashboard.",
                id
            );
            id
        }
    }
}

fn build_store(config: &AppConfig, device_id: &str) -> Result<Arc<dyn ConfigStore>, AppError> {
    match &config.backend {
        Backend::Http { data_url, api_token } => {
            info!("Using HTTP JSON backend at {}", data_url);
            Ok(Arc::new(HttpJsonStore::new(data_url, api_token.clone(), config.request_timeout)?))
        }
        Backend::Demo => {
            info!("Using in-memory demo backend");
            let store = MemoryStore::new();
            demo::seed(&store, device_id)?;
            Ok(Arc::new(store))
        }
    }
}

fn render_event(event: &ZoneEvent) {
    match &event.item {
        Some(item) => info!(
            "[zone {}] {:?}: {} '{}' for {}s ({})",
            event.position,
            event.cause,
            if item.is_video() { "video" } else { "image" },
            item.filename,
            item.duration_secs,
            item.url
        ),
        None => info!("[zone {}] {:?}: no media", event.position, event.cause),
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("Starting castgrid-player...");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config::DEFAULT_CONFIG_PATH.to_string());
    let app_config = config::load_config(&config_path).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;
    let device_id = resolve_device_id(&app_config);
    let store = build_store(&app_config, &device_id)?;

    let mut session = DeviceSession::new(&device_id, store);
    let mut events = session.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => render_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Renderer lagged, skipped {} zone event(s)", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("Zone event stream closed");
    });

    let initial_state = session.start().await.clone();
    match initial_state {
        SessionState::Running => {
            info!("Device '{}' running with layout {:?}", device_id, session.layout());
            for (position, item) in session.snapshot() {
                debug!("Initial zone {}: {:?}", position, item.map(|i| i.filename));
            }
        }
        ref other => error!(
            "Device '{}' not running yet: {}",
            device_id,
            other.error_message().unwrap_or("unknown")
        ),
    }

    session
        .run_polling(app_config.refresh_interval, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;
    info!("castgrid-player stopped.");
    Ok(())
}
