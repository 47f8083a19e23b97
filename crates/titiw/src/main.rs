use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use titiw::app::App;
use titiw::app::service::AppClients;
use titiw::config::{API_KEY_VAR, AppConfig, LOG_VAR};
use titiw::domain::catalog::default_catalog;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_VAR).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let working_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let config = AppConfig::from_env(working_dir).map_err(|config_error| {
        error!(%config_error, "invalid configuration");

        io::Error::other(format!("Error: {config_error}"))
    })?;
    if config.api_key.is_none() {
        warn!("{API_KEY_VAR} is not set; turns will fail until it is provided");
    }

    let clients = AppClients::from_config(&config)
        .map_err(|provider_error| io::Error::other(format!("Error: {provider_error}")))?;
    let mut app = App::new(&config, Arc::new(default_catalog()), clients).await;

    titiw::runtime::run(&mut app).await
}
