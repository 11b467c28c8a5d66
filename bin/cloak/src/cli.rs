//! Cloak CLI entry point.

use clap::{Args, Parser, Subcommand};
use cloak_node_core::args::{DataDirArgs, LogArgs, NetworkArgs};
use cloak_node_core::version::{LONG_VERSION, SHORT_VERSION};
use cloak_node_core::{logging, version};
use eyre::Result;
use tracing::info;

use crate::commands;

/// Cloak - connectivity control and peer discovery for anonymous overlays
#[derive(Debug, Parser)]
#[command(
    author,
    version = SHORT_VERSION,
    long_version = LONG_VERSION.as_str(),
    about,
    long_about = None
)]
pub(crate) struct Cli {
    /// Logging configuration (applies to all subcommands).
    #[command(flatten)]
    pub(crate) logs: LogArgs,

    #[command(flatten)]
    pub(crate) datadir: DataDirArgs,

    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    /// Run a local mesh of nodes over the in-memory transport.
    Dev(DevArgs),
    /// Inspect or initialize the configuration file.
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub(crate) struct DevArgs {
    /// Number of nodes in the mesh, the first acting as seed.
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u16).range(2..))]
    pub(crate) nodes: u16,

    /// Stop after this many seconds instead of waiting for Ctrl+C.
    #[arg(long, value_name = "SECS")]
    pub(crate) duration: Option<u64>,

    /// Seconds between peer table reports.
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    pub(crate) report_interval: u64,

    #[command(flatten)]
    pub(crate) network: NetworkArgs,
}

#[derive(Debug, Args)]
pub(crate) struct ConfigArgs {
    /// Write a default configuration file if none exists.
    #[arg(long)]
    pub(crate) init: bool,

    /// Print the effective configuration.
    #[arg(long)]
    pub(crate) show: bool,

    #[command(flatten)]
    pub(crate) network: NetworkArgs,
}

/// Parse arguments, initialize logging and dispatch.
pub(crate) async fn run() -> Result<()> {
    let cli = Cli::parse();

    logging::init_logging(&cli.logs)?;
    info!("Starting cloak {}", version::VERSION);

    match cli.command {
        Commands::Dev(args) => commands::dev::run(&cli.datadir, args).await,
        Commands::Config(args) => commands::config::run(&cli.datadir, args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dev() {
        let cli = Cli::try_parse_from([
            "cloak",
            "-vv",
            "dev",
            "--nodes",
            "4",
            "--network.seeds",
            "fp1@addr1,fp2@addr2",
        ])
        .unwrap();

        assert_eq!(cli.logs.verbosity, 2);
        let Commands::Dev(args) = cli.command else {
            panic!("expected dev command");
        };
        assert_eq!(args.nodes, 4);
        assert_eq!(args.network.seeds.len(), 2);
        assert_eq!(args.network.seeds[1].fingerprint, "fp2");
    }

    #[test]
    fn test_dev_needs_two_nodes() {
        assert!(Cli::try_parse_from(["cloak", "dev", "--nodes", "1"]).is_err());
    }

    #[test]
    fn test_parse_config_with_datadir() {
        let cli =
            Cli::try_parse_from(["cloak", "config", "--show", "--datadir", "/tmp/x"]).unwrap();
        assert_eq!(
            cli.datadir.config_file(),
            std::path::PathBuf::from("/tmp/x/cloak.toml")
        );
        assert!(matches!(cli.command, Commands::Config(ConfigArgs { show: true, .. })));
    }
}
