use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tower_tui::{
    config::{ConfigOverrides, FileConfig, TowerConfig},
    logging, run_tui,
    tui::ViewType,
};

#[derive(Debug, Parser)]
#[command(name = "tower-tui", version, about = "Tower Terminal UI")]
struct Cli {
    /// Tower API endpoint (default: http://localhost:8000/api)
    #[arg(long, env = "TOWER_API_URL")]
    api_url: Option<String>,

    /// Personal access token sent as a bearer token
    #[arg(long, env = "TOWER_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Initial view (dashboard, tasks, account, help)
    #[arg(long, default_value = "dashboard")]
    view: String,

    /// Workflows fetched per page
    #[arg(long)]
    page_size: Option<u32>,

    /// Path of the live update stream, relative to the API URL
    #[arg(long)]
    live_path: Option<String>,

    /// Log file (default: <data dir>/tower-tui/tower-tui.log)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Configuration file (default: <config dir>/tower-tui/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let Some(view) = ViewType::from_name(&cli.view) else {
        bail!("unknown view '{}'", cli.view);
    };

    let file = match cli.config.or_else(FileConfig::default_path) {
        Some(path) => FileConfig::load(&path)?,
        None => FileConfig::default(),
    };
    let config = TowerConfig::resolve(
        file,
        ConfigOverrides {
            api_url: cli.api_url,
            access_token: cli.access_token,
            page_size: cli.page_size,
            live_path: cli.live_path,
            log_file: cli.log_file,
        },
    );

    logging::init(&config.log_file).context("failed to set up logging")?;
    run_tui(config, view)
}
