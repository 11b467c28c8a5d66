//! Dev command - run a local mesh over the in-memory transport
//!
//! Node 0 acts as seed for every other node. Discovery and status checks run
//! on short intervals unless overridden, and the peer tables are reported
//! periodically until Ctrl+C or `--duration` elapses.

use std::sync::Arc;
use std::time::Duration;

use cloak_net_discovery::MessageBus;
use cloak_net_transport::Envelope;
use cloak_net_transport::memory::{MemoryNetwork, MemoryTransport};
use cloak_node_core::args::DataDirArgs;
use cloak_node_core::config::{CloakConfig, SeedConfig};
use cloak_node_service::NetworkService;
use eyre::{Result, WrapErr};
use tracing::{info, warn};

use crate::cli::DevArgs;

const DEV_INTERVAL_SECS: u64 = 5;

/// Logs application messages delivered to a dev node.
#[derive(Debug)]
struct LoggingBus {
    node: String,
}

impl MessageBus for LoggingBus {
    fn publish(&self, envelope: Envelope) {
        let from = envelope
            .origination()
            .map(|peer| peer.to_string())
            .unwrap_or_default();
        info!(node = %self.node, id = %envelope.id.short(), %from, "application message");
    }
}

pub(crate) async fn run(datadir: &DataDirArgs, args: DevArgs) -> Result<()> {
    let mut config = CloakConfig::load(Some(&datadir.config_file()))?;
    if args.network.discovery_interval.is_none() {
        config.discovery.interval_secs = DEV_INTERVAL_SECS;
    }
    if args.network.monitor_interval.is_none() {
        config.monitor.interval_secs = DEV_INTERVAL_SECS;
    }
    config.apply_args(&args.network);
    config.validate()?;

    let network = MemoryNetwork::new(config.network.tag.clone());
    info!(
        tag = %config.network.tag,
        nodes = args.nodes,
        discovery_secs = config.discovery.interval_secs,
        "starting dev mesh"
    );

    let seed_fingerprint = node_fingerprint(0);
    let seed = SeedConfig {
        address: format!("mem://{seed_fingerprint}"),
        fingerprint: seed_fingerprint,
        key_type: String::new(),
    };

    let mut nodes = Vec::with_capacity(usize::from(args.nodes));
    for index in 0..args.nodes {
        let fingerprint = node_fingerprint(index);
        let mut node_config = config.clone();
        // The seed points at itself, which leaves it with no seeds at all.
        node_config.network.seeds = vec![seed.clone()];

        let service = NetworkService::new(
            node_config,
            network.transport(fingerprint.as_str()),
            Arc::new(LoggingBus {
                node: fingerprint.clone(),
            }),
        );
        service
            .start()
            .await
            .wrap_err_with(|| format!("failed to start {fingerprint}"))?;
        nodes.push((fingerprint, service));
    }

    info!("dev mesh running (press Ctrl+C to stop)");
    let mut report = tokio::time::interval(Duration::from_secs(args.report_interval.max(1)));
    let stop = async {
        match args.duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    warn!(%err, "failed to listen for Ctrl+C");
                }
            }
        }
    };
    tokio::pin!(stop);

    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = report.tick() => report_peers(&nodes),
        }
    }

    report_peers(&nodes);
    info!("stopping dev mesh");
    for (fingerprint, service) in &nodes {
        if let Err(err) = service.shutdown(true).await {
            warn!(node = %fingerprint, %err, "shutdown failed");
        }
    }

    Ok(())
}

fn node_fingerprint(index: u16) -> String {
    format!("dev-node-{index}")
}

fn report_peers(nodes: &[(String, NetworkService<MemoryTransport>)]) {
    for (fingerprint, service) in nodes {
        let known = service.directory().map_or(0, |directory| directory.count());
        info!(node = %fingerprint, state = %service.state(), known, "peer table");
    }
}
