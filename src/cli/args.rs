//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// depimage - cached dependency base images
///
/// Stages resolved runtime dependencies, fingerprints them and builds a
/// base image only when the dependency set changed.
#[derive(Parser, Debug)]
#[command(name = "depimage")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only print results (fingerprints, JSON) to stdout
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Global configuration file path
    #[arg(short, long, global = true, env = "DEPIMAGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip local depimage.toml discovery
    #[arg(long, global = true)]
    pub no_local: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stage dependencies and build the image if they changed
    Build(BuildArgs),

    /// Stage and fingerprint dependencies, report cache state without building
    Status(StatusArgs),

    /// Remove the staging directory and cache record
    Clean,

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Arguments for the build command
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Build even if the fingerprint matches the cache record
    #[arg(short, long)]
    pub force: bool,

    /// Dependency manifest (overrides resolver.manifest)
    #[arg(short = 'm', long)]
    pub manifest: Option<PathBuf>,

    /// Container CLI to build with (overrides image.builder)
    #[arg(long)]
    pub builder: Option<String>,

    /// Kill the build after this many seconds (overrides image.build_timeout_secs)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,
}

/// Arguments for the status command
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Dependency manifest (overrides resolver.manifest)
    #[arg(short = 'm', long)]
    pub manifest: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// Output format for status
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Show the global config file path
    Path,

    /// Write a default depimage.toml in the current directory
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_build_flags() {
        let cli = Cli::parse_from(["depimage", "-vv", "build", "--force", "--timeout", "60"]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Build(args) => {
                assert!(args.force);
                assert_eq!(args.timeout, Some(60));
                assert!(args.manifest.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn zero_timeout_rejected() {
        let err = Cli::try_parse_from(["depimage", "build", "--timeout", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parse_status_json() {
        let cli = Cli::parse_from(["depimage", "status", "--format", "json"]);
        match cli.command {
            Commands::Status(args) => assert_eq!(args.format, OutputFormat::Json),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parse_config_init() {
        let cli = Cli::parse_from(["depimage", "config", "init", "--force"]);
        assert!(matches!(
            cli.command,
            Commands::Config(ConfigArgs {
                action: Some(ConfigAction::Init { force: true })
            })
        ));
    }
}
