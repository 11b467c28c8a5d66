use clap::Args;

use crate::config::SeedConfig;

/// Parameters for configuring the overlay network
#[derive(Debug, Clone, Default, Args, PartialEq, Eq)]
#[command(next_help_heading = "Networking")]
pub struct NetworkArgs {
    /// Tag of the overlay to join.
    #[arg(long = "network.tag", value_name = "TAG")]
    pub tag: Option<String>,

    /// Maximum number of known peers.
    #[arg(long = "network.max-peers", value_name = "COUNT")]
    pub max_peers: Option<usize>,

    /// Comma separated bootstrap seeds, each `fingerprint@address`.
    ///
    /// --network.seeds 'WLlz...=@I7SB...AAAA'
    #[arg(long = "network.seeds", value_delimiter = ',', value_parser = parse_seed)]
    pub seeds: Vec<SeedConfig>,

    /// Seconds between discovery rounds.
    #[arg(
        long = "discovery.interval",
        value_name = "SECS",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub discovery_interval: Option<u64>,

    /// Seconds between connectivity checks.
    #[arg(
        long = "monitor.interval",
        value_name = "SECS",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub monitor_interval: Option<u64>,
}

/// Parse a `fingerprint@address` seed.
pub fn parse_seed(value: &str) -> Result<SeedConfig, String> {
    let (fingerprint, address) = value
        .split_once('@')
        .ok_or_else(|| format!("expected fingerprint@address, got {value:?}"))?;

    if fingerprint.is_empty() || address.is_empty() {
        return Err(format!("seed needs both fingerprint and address: {value:?}"));
    }

    Ok(SeedConfig {
        address: address.to_owned(),
        fingerprint: fingerprint.to_owned(),
        key_type: String::new(),
    })
}
