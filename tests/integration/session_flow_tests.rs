//! DeviceClient against the simulated device: connection, identity,
//! signing and telemetry sessions end to end.

use futures_lite::future::block_on;

use steptosign::adapters::sim_link::{SimConfig, SimulatedDevice};
use steptosign::app::DeviceClient;
use steptosign::app::events::{AppEvent, StopReason};
use steptosign::app::ports::TimePort as _;
use steptosign::error::{Error, LedgerError, ProtocolError, TransportError};
use steptosign::link::{Capabilities, WriteMode, WriteTarget};
use steptosign::protocol::{AckTag, Command, SystemState};
use steptosign::session::SessionState;

use crate::mock_ports::{ManualTime, MockLedger, Recorder, connected_client, test_config};

const SEQUENTIAL_KEY_ADDRESS: &str =
    "0x0ddaaec3ffac93977c83c3d7440e9e65663850d4861be2f48532548d0a463336";

// ── Connection ────────────────────────────────────────────────

#[test]
fn scan_and_connect() {
    let mut client =
        DeviceClient::new(SimulatedDevice::default(), ManualTime::default(), test_config())
            .unwrap();
    let mut sink = Recorder::default();

    let found = block_on(client.scan()).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "Step-to-Sign Sim");

    block_on(client.connect(&found[0].id, &mut sink)).unwrap();
    assert!(client.service().is_connected());
    assert_eq!(
        sink.events,
        vec![AppEvent::Connected {
            device_id: "SIM-00:11:22:33".into()
        }]
    );
}

#[test]
fn device_without_telemetry_is_refused() {
    let sim = SimConfig {
        capabilities: Capabilities::from_bits(Capabilities::COMMAND | Capabilities::TEXT),
        ..SimConfig::default()
    };
    let mut client =
        DeviceClient::new(SimulatedDevice::new(sim), ManualTime::default(), test_config())
            .unwrap();
    let mut sink = Recorder::default();

    let err = block_on(client.connect("SIM-00:11:22:33", &mut sink)).unwrap_err();
    assert_eq!(
        err,
        Error::Transport(TransportError::CharacteristicMissing("telemetry"))
    );
    assert!(!client.service().is_connected());
}

// ── Identity ──────────────────────────────────────────────────

#[test]
fn request_address_resolves_identity() {
    let (mut client, mut sink) = connected_client(test_config(), SimConfig::default());

    let identity = block_on(client.request_address(&mut sink)).unwrap();
    assert_eq!(identity.address, SEQUENTIAL_KEY_ADDRESS);
    assert_eq!(identity.public_key, client.link().public_key_hex());

    // Acknowledged writes, never above the ceiling.
    let writes = client.link().writes();
    assert!(writes.iter().all(|w| w.mode == WriteMode::WithResponse));
    assert!(writes.iter().all(|w| w.data.len() <= 20));
    assert_eq!(
        client.link().written_bytes(WriteTarget::Command),
        b"<get_address>"
    );
}

#[test]
fn unanswered_address_request_times_out() {
    let sim = SimConfig {
        drop_acks: true,
        ..SimConfig::default()
    };
    let (mut client, mut sink) = connected_client(test_config(), sim);

    let err = block_on(client.request_address(&mut sink)).unwrap_err();
    assert_eq!(err, Error::Protocol(ProtocolError::AckTimedOut(AckTag::Address)));
    assert!(client.time().now_ms() >= 500);
    assert!(sink.events.contains(&AppEvent::AckTimedOut(AckTag::Address)));
    assert!(client.service().identity().is_none());
}

// ── Signing ───────────────────────────────────────────────────

#[test]
fn sign_and_broadcast_round_trip() {
    let (mut client, mut sink) = connected_client(test_config(), SimConfig::default());
    let mut ledger = MockLedger::accepting("5Tz1");

    let receipt =
        block_on(client.sign_and_broadcast(b"transfer 5", &mut ledger, &mut sink)).unwrap();
    assert_eq!(receipt.digest, "5Tz1");
    assert_eq!(client.service().signing_state(), SystemState::Idle);

    let tx = &ledger.submitted[0];
    assert_eq!(tx.message_bytes().unwrap(), b"transfer 5");
    let signature = tx.signature_bytes().unwrap();
    assert_eq!(signature.len(), 97);
    assert_eq!(signature[0], 0x00);

    // "<msg" + 20 hex chars + ">" is 25 bytes: two writes, one pause between.
    let wire = client.link().written_bytes(WriteTarget::Command);
    assert_eq!(wire, format!("<msg{}>", hex::encode(b"transfer 5")).as_bytes());
    assert_eq!(client.link().writes().len(), 2);
    assert!(client.link().writes().iter().all(|w| w.mode == WriteMode::WithoutResponse));
    assert!(client.time().slept().contains(&20));

    let transitions: Vec<_> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::SigningState { from, to } => Some((*from, *to)),
            _ => None,
        })
        .collect();
    assert_eq!(
        transitions,
        vec![
            (SystemState::Idle, SystemState::AwaitingSignature),
            (SystemState::AwaitingSignature, SystemState::Broadcasting),
            (SystemState::Broadcasting, SystemState::Idle),
        ]
    );
}

#[test]
fn ledger_failure_still_returns_to_idle() {
    let (mut client, mut sink) = connected_client(test_config(), SimConfig::default());
    let mut ledger = MockLedger::failing(LedgerError::Unreachable);

    let err = block_on(client.sign_and_broadcast(b"x", &mut ledger, &mut sink)).unwrap_err();
    assert_eq!(err, Error::Ledger(LedgerError::Unreachable));
    assert_eq!(client.service().signing_state(), SystemState::Idle);
    assert!(sink.events.contains(&AppEvent::BroadcastFailed(LedgerError::Unreachable)));
}

#[test]
fn signature_timeout_frees_the_flow() {
    let sim = SimConfig {
        drop_acks: true,
        ..SimConfig::default()
    };
    let (mut client, mut sink) = connected_client(test_config(), sim);
    let err = block_on(client.request_signature(b"x", &mut sink)).unwrap_err();
    assert_eq!(err, Error::Protocol(ProtocolError::AckTimedOut(AckTag::Signature)));
    assert_eq!(client.service().signing_state(), SystemState::Idle);

    client.link_mut().set_drop_acks(false);
    block_on(client.request_signature(b"y", &mut sink)).unwrap();
    assert_eq!(client.service().signing_state(), SystemState::Broadcasting);
}

// ── Sessions ──────────────────────────────────────────────────

#[test]
fn collect_stops_at_target_and_archives() {
    let (mut client, mut sink) = connected_client(test_config(), SimConfig::default());

    let archived = block_on(client.collect("stomp", Some(10), &mut sink)).unwrap();
    assert_eq!(archived, 10);
    assert!(!client.link().is_streaming());
    assert_eq!(client.service().session_state(), SessionState::NoSession);
    assert_eq!(client.service().archive().count("stomp"), 10);
    assert_eq!(
        client.link().written_bytes(WriteTarget::Command),
        b"<start_imu><stop_imu>"
    );

    let timestamps: Vec<u32> = client
        .service()
        .archive()
        .get("stomp")
        .unwrap()
        .iter()
        .map(|s| s.timestamp)
        .collect();
    assert!(timestamps.windows(2).all(|w| w[0] < w[1]));

    assert_eq!(
        sink.count(|e| matches!(
            e,
            AppEvent::StopRequested {
                reason: StopReason::TargetReached,
                ..
            }
        )),
        1
    );
    assert_eq!(sink.count(|e| matches!(e, AppEvent::SessionProgress(_))), 10);
}

#[test]
fn manual_stop_commits_what_was_collected() {
    let (mut client, mut sink) = connected_client(test_config(), SimConfig::default());
    block_on(async {
        client.start_session("tap", Some(1000), &mut sink).await.unwrap();
        for _ in 0..6 {
            client.pump(&mut sink).await.unwrap();
        }
        assert!(client.stop_session(&mut sink).await.unwrap());
        assert!(!client.stop_session(&mut sink).await.unwrap());
        client.wait_for(AckTag::ImuStopped, &mut sink).await.unwrap();
    });
    assert_eq!(client.service().archive().count("tap"), 6);
    assert!(sink.events.contains(&AppEvent::SessionCommitted {
        gesture: "tap".into(),
        samples: 6,
    }));
}

#[test]
fn failed_start_write_releases_the_session() {
    let sim = SimConfig {
        mtu_payload: 5,
        ..SimConfig::default()
    };
    let (mut client, mut sink) = connected_client(test_config(), sim);

    let err = block_on(client.start_session("wave", Some(10), &mut sink)).unwrap_err();
    assert_eq!(err, Error::Transport(TransportError::PayloadTooLarge));
    assert!(client.service().is_connected());
    assert!(client.service().active_gesture().is_none());
    assert!(!client.service().is_streaming());
    assert_eq!(client.service().session_state(), SessionState::NoSession);
    assert!(!client.service().is_awaiting(AckTag::ImuStopped));
    assert!(sink.events.contains(&AppEvent::SessionAbandoned {
        gesture: "wave".into(),
        samples: 0,
    }));

    // A retry hits the same write error, not AlreadyActive.
    assert_eq!(
        block_on(client.start_session("wave", Some(10), &mut sink)),
        Err(Error::Transport(TransportError::PayloadTooLarge))
    );
}

#[test]
fn failed_auto_stop_write_is_resent() {
    let (mut client, mut sink) = connected_client(test_config(), SimConfig::default());
    block_on(async {
        client.start_session("tap", Some(3), &mut sink).await.unwrap();
        client.link_mut().fail_next_writes(1);
        client.pump(&mut sink).await.unwrap();
        client.pump(&mut sink).await.unwrap();
        let err = client.pump(&mut sink).await.unwrap_err();
        assert_eq!(err, Error::Transport(TransportError::WriteFailed));
    });
    assert_eq!(client.service().session_state(), SessionState::TargetReached);
    assert!(client.service().has_outbound());
    assert!(client.link().is_streaming());

    block_on(async {
        // Already stopping, so nothing new is requested, but the queued stop goes out.
        assert!(!client.stop_session(&mut sink).await.unwrap());
        client.wait_for(AckTag::ImuStopped, &mut sink).await.unwrap();
    });
    assert!(!client.link().is_streaming());
    assert_eq!(
        client.link().written_bytes(WriteTarget::Command),
        b"<start_imu><stop_imu>"
    );
    assert_eq!(client.service().archive().count("tap"), 3);
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::StopRequested { .. })),
        1
    );
}

#[test]
fn link_loss_abandons_session() {
    let (mut client, mut sink) = connected_client(test_config(), SimConfig::default());
    block_on(async {
        client.start_session("tap", Some(100), &mut sink).await.unwrap();
        client.pump(&mut sink).await.unwrap();
        client.link_mut().drop_link();
        let err = client.pump(&mut sink).await.unwrap_err();
        assert_eq!(err, Error::Transport(TransportError::LinkLost));
    });
    assert!(!client.service().is_connected());
    assert!(client.service().archive().is_empty());
    assert!(sink.events.contains(&AppEvent::SessionAbandoned {
        gesture: "tap".into(),
        samples: 1,
    }));
    assert!(sink.events.contains(&AppEvent::Disconnected { lost: true }));
}

// ── Other commands ────────────────────────────────────────────

#[test]
fn password_verification_round_trip() {
    let sim = SimConfig {
        password_ok: false,
        ..SimConfig::default()
    };
    let (mut client, mut sink) = connected_client(test_config(), sim);
    block_on(async {
        client
            .send_command(Command::StartCurrentPasswordVerification, &mut sink)
            .await
            .unwrap();
        client.wait_for(AckTag::PasswordVerdict, &mut sink).await.unwrap();
    });
    assert!(sink.events.contains(&AppEvent::PasswordVerdict(false)));
}

#[test]
fn auxiliary_writes_check_capabilities() {
    let (mut client, _sink) = connected_client(test_config(), SimConfig::default());
    block_on(client.send_control(b"\x01\x02")).unwrap();
    block_on(client.send_file_chunk(&[0xAA; 30])).unwrap();
    assert_eq!(client.link().written_bytes(WriteTarget::Control), b"\x01\x02");
    assert_eq!(client.link().written_bytes(WriteTarget::FileTransfer).len(), 30);

    let sim = SimConfig {
        capabilities: Capabilities::from_bits(
            Capabilities::COMMAND | Capabilities::TEXT | Capabilities::TELEMETRY,
        ),
        ..SimConfig::default()
    };
    let (mut bare, _sink) = connected_client(test_config(), sim);
    assert_eq!(
        block_on(bare.send_control(b"\x01")),
        Err(Error::Transport(TransportError::CharacteristicMissing("control")))
    );
}

#[test]
fn operations_after_disconnect_fail() {
    let (mut client, mut sink) = connected_client(test_config(), SimConfig::default());
    block_on(client.disconnect(&mut sink)).unwrap();
    assert_eq!(
        block_on(client.request_address(&mut sink)).unwrap_err(),
        Error::Transport(TransportError::NotConnected)
    );
}
