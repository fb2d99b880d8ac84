//! cexscan - terminal heatmap of cross-exchange arbitrage spreads.

use anyhow::Result;
use cexscan_session::{ConfiguredIdentity, Identity, IdentityProvider, StaticIdentity};
use clap::Parser;
use std::io::IsTerminal;
use std::sync::Arc;
use tracing::info;

/// Cross-exchange arbitrage heatmap in the terminal
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via CEXSCAN_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// User id, overriding config and environment
    #[arg(long)]
    user_id: Option<String>,

    /// Display name used when the user has to be created
    #[arg(long)]
    username: Option<String>,

    /// Fetch, print one frame and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    cexscan_telemetry::init_logging()?;

    info!("Starting cexscan v{}", env!("CARGO_PKG_VERSION"));

    let config = cexscan_app::AppConfig::load(args.config.as_deref())?;
    info!(api_url = %config.api_url, "Configuration loaded");

    let identity: Arc<dyn IdentityProvider> = match args.user_id {
        Some(user_id) => Arc::new(StaticIdentity(Some(Identity::new(user_id, args.username)))),
        None => Arc::new(ConfiguredIdentity::new(
            config.identity.user_id.clone(),
            args.username.or_else(|| config.identity.username.clone()),
        )),
    };

    let clear_screen = !args.once && std::io::stdout().is_terminal();
    let mut app = cexscan_app::Application::from_config(config, identity)?
        .with_output(Box::new(std::io::stdout()), clear_screen);

    if args.once {
        app.run_once().await?;
        return Ok(());
    }

    let shutdown = app.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C");
            shutdown.cancel();
        }
    });

    app.run().await?;
    info!("cexscan stopped");
    Ok(())
}
