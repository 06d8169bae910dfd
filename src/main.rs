//! Marknotes - Main Entry Point
//!
//! A local markdown notes server: file tree, live change notifications, and
//! HTML/PDF export for a browser front-end.

mod api;
mod config;
mod error;
mod export;
mod files;
mod markdown;
mod theme;
mod watch;

use api::AppState;
use config::{
    load_server_config, JsonFileStorage, MemoryStorage, PreferenceStorage, PreferenceStore,
};
use error::Result;
use export::Exporter;
use log::{info, warn};
use theme::{SystemAppearance, ThemeWatchHandle};

/// Application name constant.
const APP_NAME: &str = "Marknotes";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting {} {}", APP_NAME, env!("CARGO_PKG_VERSION"));

    let config = load_server_config();
    info!("Default note root: {}", config.default_root().display());

    let storage: Box<dyn PreferenceStorage> = match JsonFileStorage::in_config_dir() {
        Ok(storage) => Box::new(storage),
        Err(e) => {
            warn!("{}. Preferences will not persist.", e);
            Box::new(MemoryStorage::new())
        }
    };
    let preferences = PreferenceStore::new(storage);
    let settings = preferences.load();
    info!("Theme preference: {:?}", settings.theme);

    let appearance = SystemAppearance::new(config.prefers_dark);
    let exporter = Exporter::from_config(&config.export);
    let bind_address = config.bind_address.clone();

    let state = AppState::new(config, exporter, preferences, appearance);
    spawn_theme_follower(&state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    let app = api::router(state.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.sessions.shutdown();
    info!("{} stopped", APP_NAME);
    Ok(())
}

/// Log the effective theme whenever the preference or, under `System`, the
/// reported appearance changes.
fn spawn_theme_follower(state: &AppState) {
    let state = state.clone();
    let mut preferences = state.preferences.subscribe();

    tokio::spawn(async move {
        let mut follower: Option<ThemeWatchHandle> = None;
        loop {
            let manager = state.theme_manager();
            info!("Effective theme: {}", manager.tooltip());

            if let Some(handle) = follower.take() {
                handle.teardown();
            }
            follower = manager.follow(|mode| info!("System appearance changed, theme now {}", mode));

            let previous = manager.current_theme();
            loop {
                if preferences.changed().await.is_err() {
                    return;
                }
                if preferences.borrow_and_update().theme != previous {
                    break;
                }
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
