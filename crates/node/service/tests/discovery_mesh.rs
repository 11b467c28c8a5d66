//! Nodes on an in-memory mesh learn about each other through a shared seed.

mod common;

use cloak_net_connectivity::ConnectivityState;
use cloak_net_peers::Fingerprint;
use cloak_net_transport::Envelope;
use serde_json::json;

use common::{config, eventually, init_tracing, mesh, start_node};

fn knows(node: &common::TestNode, other: &common::TestNode) -> bool {
    node.service
        .directory()
        .is_some_and(|directory| directory.contains(&Fingerprint::from(other.fingerprint.as_str())))
}

#[tokio::test(start_paused = true)]
async fn test_nodes_discover_each_other_via_seed() {
    init_tracing();
    let network = mesh();

    let seed = start_node(&network, "seed", config(&[])).await;
    let alice = start_node(&network, "alice", config(&[&seed])).await;
    let bob = start_node(&network, "bob", config(&[&seed])).await;

    eventually("alice connected", || {
        alice.service.state() == ConnectivityState::Connected
    })
    .await;

    eventually("seed learns both nodes", || knows(&seed, &alice) && knows(&seed, &bob)).await;
    eventually("alice learns bob", || knows(&alice, &bob)).await;
    eventually("bob learns alice", || knows(&bob, &alice)).await;

    // Nobody ever stores itself.
    for node in [&seed, &alice, &bob] {
        assert!(!knows(node, node));
    }

    for node in [&seed, &alice, &bob] {
        node.service.shutdown(true).await.unwrap();
    }
    assert!(network.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_responses_clear_in_flight_requests() {
    init_tracing();
    let network = mesh();

    let seed = start_node(&network, "seed", config(&[])).await;
    let alice = start_node(&network, "alice", config(&[&seed])).await;

    eventually("seed learns alice", || knows(&seed, &alice)).await;
    eventually("alice's request answered", || {
        alice.service.tracker().is_some_and(|tracker| tracker.is_empty())
    })
    .await;

    alice.service.shutdown(true).await.unwrap();
    seed.service.shutdown(true).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_application_message_reaches_bus_with_observed_sender() {
    init_tracing();
    let network = mesh();

    let alice = start_node(&network, "alice", config(&[])).await;
    let bob = start_node(&network, "bob", config(&[])).await;

    let destination = bob.service.local_peer().unwrap();
    alice
        .service
        .send(Envelope::application(json!({"hello": "bob"})).with_destination(destination))
        .await
        .unwrap();

    eventually("bob's bus receives the message", || {
        !bob.bus.published.lock().is_empty()
    })
    .await;

    let received = bob.bus.published.lock().remove(0);
    let origination = received.origination().unwrap();
    assert_eq!(origination.fingerprint().as_str(), "alice");
    assert!(!received.is_discovery());

    // The sender is now a known peer of the receiver.
    assert!(knows(&bob, &alice));

    alice.service.shutdown(true).await.unwrap();
    bob.service.shutdown(true).await.unwrap();
}
