pub mod config;
pub mod logging;
pub mod tui;

#[cfg(feature = "protocol")]
use anyhow::{Context, Result};
#[cfg(feature = "protocol")]
use config::TowerConfig;
#[cfg(feature = "protocol")]
use tui::{AppSettings, TowerApp, ViewType, bridge::protocol_service_bundle};

/// Connect to the configured Tower API and run the UI until the user quits.
#[cfg(feature = "protocol")]
pub fn run_tui(config: TowerConfig, initial_view: ViewType) -> Result<()> {
    let services = protocol_service_bundle(&config)
        .with_context(|| format!("failed to set up Tower API client for {}", config.api_url))?;
    let settings = AppSettings {
        api_url: config.api_url.clone(),
        page_size: config.page_size,
        refresh_interval: config.refresh_interval,
        theme: config.theme.clone(),
    };
    tracing::info!(target: "tui", view = initial_view.name(), "launching terminal UI");
    let mut app = TowerApp::new(initial_view, services, settings);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(app.run())
}
