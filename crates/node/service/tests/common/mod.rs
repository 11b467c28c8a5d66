#![allow(dead_code, unreachable_pub)]

use std::sync::Arc;
use std::time::Duration;

use cloak_net_discovery::MessageBus;
use cloak_net_primitives::{Clock, NetworkTag, SystemClock};
use cloak_net_transport::Envelope;
use cloak_net_transport::memory::{MemoryNetwork, MemoryTransport};
use cloak_node_core::config::{CloakConfig, SeedConfig};
use cloak_node_service::NetworkService;
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

/// Tag without built-in seeds, so nodes only know what the test gives them.
pub const MESH: &str = "mesh";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Default)]
pub struct RecordingBus {
    pub published: Mutex<Vec<Envelope>>,
}

impl MessageBus for RecordingBus {
    fn publish(&self, envelope: Envelope) {
        self.published.lock().push(envelope);
    }
}

pub struct TestNode<C = SystemClock> {
    pub fingerprint: String,
    pub transport: MemoryTransport,
    pub bus: Arc<RecordingBus>,
    pub service: NetworkService<MemoryTransport, C>,
}

pub fn mesh() -> Arc<MemoryNetwork> {
    MemoryNetwork::new(NetworkTag::new(MESH))
}

pub fn config(seeds: &[&TestNode]) -> CloakConfig {
    let mut config = CloakConfig::default();
    config.network.tag = NetworkTag::new(MESH);
    config.network.seeds = seeds
        .iter()
        .map(|node| SeedConfig {
            address: format!("mem://{}", node.fingerprint),
            fingerprint: node.fingerprint.clone(),
            key_type: String::new(),
        })
        .collect();
    config
}

pub async fn start_node(
    network: &Arc<MemoryNetwork>,
    fingerprint: &str,
    config: CloakConfig,
) -> TestNode {
    start_node_with_clock(network, fingerprint, config, SystemClock).await
}

pub async fn start_node_with_clock<C: Clock + Clone>(
    network: &Arc<MemoryNetwork>,
    fingerprint: &str,
    config: CloakConfig,
    clock: C,
) -> TestNode<C> {
    let transport = network.transport(fingerprint);
    let bus = Arc::new(RecordingBus::default());
    let service = NetworkService::with_clock(config, transport.clone(), bus.clone(), clock);
    service.start().await.unwrap();

    TestNode {
        fingerprint: fingerprint.to_owned(),
        transport,
        bus,
        service,
    }
}

/// Poll `condition` while letting the paused clock advance.
pub async fn eventually(what: &str, mut condition: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    panic!("timed out waiting for {what}");
}
