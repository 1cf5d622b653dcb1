//! depimage - cached dependency base images
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use depimage::cli::{Cli, Commands};
use depimage::config::{Config, ConfigManager};
use depimage::error::{DepImageError, DepImageResult};
use depimage::ui::UiContext;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> DepImageResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };

    let cwd = std::env::current_dir().map_err(|e| DepImageError::io("getting current directory", e))?;
    let local_config_path = if cli.no_local {
        None
    } else {
        ConfigManager::find_local_config(&cwd)
    };

    let config = config_manager
        .load_merged(local_config_path.as_deref(), &cwd)
        .await?;

    init_logging(cli.verbose, &config);
    match local_config_path {
        Some(ref path) => debug!("Using local config: {}", path.display()),
        None => debug!("No local config, project directory {}", cwd.display()),
    }

    let ctx = UiContext::detect().with_quiet(cli.quiet);

    match cli.command {
        Commands::Build(args) => depimage::cli::commands::build(args, &config, &ctx).await,
        Commands::Status(args) => depimage::cli::commands::status(args, &config, &ctx).await,
        Commands::Clean => depimage::cli::commands::clean(&config, &ctx).await,
        Commands::Config(args) => {
            depimage::cli::commands::config(args, &config, &config_manager, &ctx).await
        }
    }
}

/// Initialize logging: 0 = warn, 1 = info, 2+ = debug; logs go to stderr
fn init_logging(verbose: u8, config: &Config) {
    let filter = match verbose {
        0 => EnvFilter::try_from_env("DEPIMAGE_LOG")
            .unwrap_or_else(|_| EnvFilter::new("depimage=warn")),
        1 => EnvFilter::new("depimage=info"),
        _ => EnvFilter::new("depimage=debug"),
    };

    if config.general.log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .without_time()
            .with_writer(std::io::stderr)
            .init();
    }
}
