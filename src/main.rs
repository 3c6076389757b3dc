use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use mcpanel::config::{AppConfig, ConfigError, DEFAULT_CONFIG_PATH, SettingsStore};
use mcpanel::process::{Supervisor, SupervisorOptions};
use mcpanel::web::{AppState, WebError, run_web_server};

/// How long to wait for the server to exit on Ctrl-C
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(
    name = "mcpanel",
    author,
    version,
    about = "Web control panel for a Minecraft server",
    long_about = None
)]
struct Args {
    /// Settings file, created with defaults if missing
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override the web port from the settings file
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Debug, thiserror::Error)]
enum MainError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Web(#[from] WebError),
}

/// Initialize logging, honoring RUST_LOG when set
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mcpanel=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

async fn run(args: Args) -> Result<(), MainError> {
    let config = AppConfig::load_or_init(&args.config)?;
    let port = args.port.unwrap_or(config.web.port);
    let settings = SettingsStore::new(config, args.config);
    let supervisor = Supervisor::new(settings.clone(), SupervisorOptions::default());

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    let state = AppState::new(supervisor.clone(), settings);
    run_web_server(addr, state, shutdown_signal()).await?;

    supervisor.shutdown(SHUTDOWN_TIMEOUT).await;
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    let args = Args::parse();

    if let Err(err) = run(args).await {
        tracing::error!(error = %err, "mcpanel failed");
        std::process::exit(1);
    }
}
