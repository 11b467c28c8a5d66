mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use bytes::Bytes;
use cloak_net_connectivity::{ConnectivityState, RestartKind};
use cloak_net_peers::NetworkPeer;
use cloak_net_primitives::{ManualClock, NetworkTag};
use cloak_net_transport::memory::SETTING_HIDDEN_MODE;
use cloak_net_transport::{
    Envelope, SenderIdentity, TransportError, TransportEvent, TransportStatus,
};
use cloak_node_service::{Operation, OperationOutcome, ServiceError};
use serde_json::json;

use common::{MESH, config, eventually, init_tracing, mesh, start_node, start_node_with_clock};

#[tokio::test(start_paused = true)]
async fn test_requires_start() {
    init_tracing();
    let network = mesh();
    let transport = network.transport("idle");
    let service = cloak_node_service::NetworkService::new(
        config(&[]),
        transport,
        std::sync::Arc::new(common::RecordingBus::default()),
    );

    assert!(!service.is_running());
    assert_eq!(service.state(), ConnectivityState::Unknown);
    assert_matches!(
        service.handle_operation(Operation::KnownPeersCount).await,
        Err(ServiceError::NotStarted)
    );
    assert_matches!(
        service.send(Envelope::application(json!(1))).await,
        Err(ServiceError::NotStarted)
    );

    service.start().await.unwrap();
    assert!(service.is_running());
    assert_matches!(service.start().await, Err(ServiceError::AlreadyStarted));
    service.shutdown(true).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_send_validation() {
    init_tracing();
    let network = mesh();
    let node = start_node(&network, "local", config(&[])).await;

    assert_matches!(
        node.service.send(Envelope::application(json!("x"))).await,
        Err(ServiceError::DestinationRequired)
    );

    let elsewhere = NetworkPeer::new(NetworkTag::new("tor"), "addr", "remote");
    assert_matches!(
        node.service
            .send(Envelope::application(json!("x")).with_destination(elsewhere))
            .await,
        Err(ServiceError::WrongNetwork { expected, actual })
            if expected.as_str() == MESH && actual.as_str() == "tor"
    );

    let unknown = NetworkPeer::new(NetworkTag::new(MESH), "addr", "nobody");
    assert_matches!(
        node.service
            .send(Envelope::application(json!("x")).with_destination(unknown))
            .await,
        Err(ServiceError::Transport(TransportError::DestinationNotFound(fp)))
            if fp.as_str() == "nobody"
    );

    node.service.shutdown(true).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_operations() {
    init_tracing();
    let network = mesh();
    let seed = start_node(&network, "seed", config(&[])).await;
    let node = start_node(&network, "local", config(&[&seed])).await;

    eventually("connected", || node.service.state() == ConnectivityState::Connected).await;
    eventually("seed bootstrapped", || {
        node.service.directory().is_some_and(|directory| !directory.is_empty())
    })
    .await;

    assert_eq!(
        node.service.handle_operation(Operation::CheckStatus).await.unwrap(),
        OperationOutcome::Status(ConnectivityState::Connected)
    );
    assert_eq!(
        node.service.handle_operation(Operation::ActivePeersCount).await.unwrap(),
        OperationOutcome::Count(1)
    );
    assert_matches!(
        node.service.handle_operation(Operation::KnownPeersCount).await.unwrap(),
        OperationOutcome::Count(count) if count >= 1
    );
    assert_matches!(
        node.service.handle_operation(Operation::LocalPeer).await.unwrap(),
        OperationOutcome::LocalPeer(Some(peer)) if peer.fingerprint().as_str() == "local"
    );
    assert_eq!(
        node.service
            .handle_operation(Operation::Other {
                name: "tunnel-stats".to_owned()
            })
            .await
            .unwrap(),
        OperationOutcome::DeadLetter {
            name: "tunnel-stats".to_owned()
        }
    );

    node.service.shutdown(true).await.unwrap();
    seed.service.shutdown(true).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_changed_setting_restarts_transport() {
    init_tracing();
    let network = mesh();
    let node = start_node(&network, "local", config(&[])).await;
    eventually("connected", || node.service.state() == ConnectivityState::Connected).await;

    let update = || Operation::UpdateSetting {
        key: SETTING_HIDDEN_MODE.to_owned(),
        value: "true".to_owned(),
    };

    assert_eq!(
        node.service.handle_operation(update()).await.unwrap(),
        OperationOutcome::SettingUpdated {
            changed: true,
            restart: Some(RestartKind::Soft)
        }
    );
    assert_eq!(node.transport.soft_restarts(), 1);
    assert_eq!(node.transport.setting(SETTING_HIDDEN_MODE).as_deref(), Some("true"));

    // Same value again: nothing persisted, no restart.
    assert_eq!(
        node.service.handle_operation(update()).await.unwrap(),
        OperationOutcome::SettingUpdated {
            changed: false,
            restart: None
        }
    );
    assert_eq!(node.transport.soft_restarts(), 1);

    assert_matches!(
        node.service
            .handle_operation(Operation::UpdateSetting {
                key: "bogus".to_owned(),
                value: "1".to_owned(),
            })
            .await,
        Err(ServiceError::Transport(TransportError::UnknownSetting(_)))
    );

    node.service.shutdown(true).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_hard_restart_recovers() {
    init_tracing();
    let network = mesh();
    let seed = start_node(&network, "seed", config(&[])).await;

    let mut cfg = config(&[&seed]);
    // Every restart escalates straight to hard.
    cfg.monitor.hard_restart_threshold = 0;
    let node = start_node(&network, "local", cfg).await;
    eventually("connected", || node.service.state() == ConnectivityState::Connected).await;

    assert_eq!(
        node.service
            .handle_operation(Operation::UpdateSetting {
                key: SETTING_HIDDEN_MODE.to_owned(),
                value: "true".to_owned(),
            })
            .await
            .unwrap(),
        OperationOutcome::SettingUpdated {
            changed: true,
            restart: Some(RestartKind::Hard)
        }
    );
    assert_eq!(node.transport.shutdowns(), 1);
    assert_eq!(node.transport.starts(), 2);
    assert_eq!(node.service.restart_attempts().await.unwrap(), 0);

    // Scheduled work resumes and the node reconnects and reseeds.
    eventually("reconnected", || node.service.state() == ConnectivityState::Connected).await;
    eventually("seed known again", || {
        node.service.directory().is_some_and(|directory| !directory.is_empty())
    })
    .await;

    node.service.shutdown(true).await.unwrap();
    seed.service.shutdown(true).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_notifications_reevaluate_current_status() {
    init_tracing();
    let network = mesh();
    let node = start_node(&network, "local", config(&[])).await;
    eventually("connected", || node.service.state() == ConnectivityState::Connected).await;

    // The transport still reports OK, so none of these restart anything.
    node.transport.emit(TransportEvent::Disconnected);
    node.transport.emit(TransportEvent::Error {
        message: "tunnel build failed".to_owned(),
    });
    node.transport.emit(TransportEvent::Abuse {
        severity: 2,
        reason: "flood".to_owned(),
    });
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(node.transport.soft_restarts(), 0);
    assert_eq!(node.service.state(), ConnectivityState::Connected);

    node.service.shutdown(true).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_error_notification_restarts_long_blocked_node() {
    init_tracing();
    let network = mesh();
    let clock = Arc::new(ManualClock::new(0));
    let mut cfg = config(&[]);
    // Keep the scheduled check out of the way so only notifications drive the monitor.
    cfg.monitor.interval_secs = 3_600;
    let node = start_node_with_clock(&network, "local", cfg, Arc::clone(&clock)).await;
    eventually("connected", || node.service.state() == ConnectivityState::Connected).await;

    node.transport.set_status(Some(TransportStatus::RejectUnsolicited));
    eventually("blocked", || node.service.state() == ConnectivityState::Blocked).await;
    assert_eq!(node.transport.soft_restarts(), 0);

    clock.advance(Duration::from_secs(181));
    node.transport.emit(TransportEvent::Error {
        message: "tunnel build failed".to_owned(),
    });

    eventually("soft restart", || node.transport.soft_restarts() == 1).await;
    eventually("connected again", || {
        node.service.state() == ConnectivityState::Connected
    })
    .await;
    assert_eq!(node.transport.soft_restarts(), 1);

    node.service.shutdown(true).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_malformed_inbound_is_dropped() {
    init_tracing();
    let network = mesh();
    let node = start_node(&network, "local", config(&[])).await;
    eventually("connected", || node.service.state() == ConnectivityState::Connected).await;

    node.transport.emit(TransportEvent::Message {
        sender: SenderIdentity {
            address: "mem://mallory".to_owned(),
            fingerprint: "mallory".into(),
        },
        payload: Bytes::from_static(b"{not json"),
    });
    tokio::time::sleep(std::time::Duration::from_secs(5)).await;

    let directory = node.service.directory().unwrap();
    assert!(directory.is_empty());
    assert!(node.bus.published.lock().is_empty());

    node.service.shutdown(true).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_everything() {
    init_tracing();
    let network = mesh();
    let node = start_node(&network, "local", config(&[])).await;
    assert_eq!(network.len(), 1);

    node.service.shutdown(false).await.unwrap();
    assert!(!node.service.is_running());
    assert!(network.is_empty());
    assert_eq!(node.transport.shutdowns(), 1);
    assert!(node.service.shutdown_token().is_cancelled());
    assert_matches!(
        node.service.handle_operation(Operation::KnownPeersCount).await,
        Err(ServiceError::NotStarted)
    );
}
