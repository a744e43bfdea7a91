use std::path::PathBuf;

use clap::Parser;
use multiview_config::MultiviewConfig;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (defaults to $XDG_CONFIG_HOME/multiview/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Spin on the event queue instead of blocking when it is empty
    #[arg(long)]
    busy_poll: bool,
}

fn start(args: &Args) -> anyhow::Result<()> {
    let mut config = MultiviewConfig::load(args.config.as_deref())?;
    if args.busy_poll {
        config.render.busy_poll = true;
    }

    let health = multiview::app::run(&config)?;
    if health.is_healthy {
        info!("No frame errors");
    } else {
        warn!(
            "Frame errors: x11={} context={} draw={} present={}",
            health.x11_errors, health.context_errors, health.draw_errors, health.present_errors
        );
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    info!("Starting multiview...");

    if let Err(e) = start(&args) {
        error!("{:#}", e);
        std::process::exit(-1);
    }
}
