use anyhow::Result;
use clap::{Parser, Subcommand};
use derma_core::BackendConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod render;

#[derive(Parser)]
#[command(name = "derma")]
#[command(about = "Derma-AI CLI - skin image analysis and dermatology assistant", long_about = None)]
struct Cli {
    /// Backend base address (overrides DERMA_BACKEND_URL and config.toml)
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a skin image
    Analyze {
        /// Path to the image file
        image: PathBuf,
    },
    /// Send one message to the assistant
    Chat {
        message: String,
        /// Analyze this image first and send the result as context
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Start an interactive session
    Session,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn resolve_config(backend: Option<String>) -> Result<BackendConfig> {
    let config = BackendConfig::resolve()?;
    Ok(match backend {
        Some(url) => BackendConfig::new(url).with_request_timeout(config.request_timeout()),
        None => config,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = resolve_config(cli.backend)?;
    tracing::debug!("Using backend {}", config.base_url());

    match cli.command {
        Commands::Analyze { image } => commands::analyze::run(config, &image).await?,
        Commands::Chat { message, image } => {
            commands::chat::run(config, &message, image.as_deref()).await?
        }
        Commands::Session => commands::session::run(config).await?,
    }

    Ok(())
}
