//! Connection strategy tests against scripted controllers

mod common;

use common::*;
use onionport::config::{ConnectionConfig, ManualConfig};
use onionport::strategy::{AttemptStage, AutomaticCandidates};
use onionport::tor::{AuthMethod, ControlEndpoint, SocksEndpoint};
use onionport::{Error, ErrorKind, OnionManager};
use std::path::PathBuf;
use std::time::Duration;

fn manual(endpoint: ControlEndpoint, auth: AuthMethod) -> ConnectionConfig {
    ConnectionConfig::Manual(ManualConfig {
        endpoint,
        auth,
        socks: SocksEndpoint::new("127.0.0.1", 9050),
    })
}

fn automatic() -> ConnectionConfig {
    ConnectionConfig::Automatic(AutomaticCandidates::with_env_override(
        &test_platform(true),
        None,
    ))
}

async fn connect_manual(
    endpoint: ControlEndpoint,
    auth: AuthMethod,
    connector: FakeConnector,
) -> onionport::Result<OnionManager> {
    OnionManager::builder(manual(endpoint, auth))
        .platform(test_platform(true))
        .connector(connector)
        .supervisor(FakeSupervisor::new(new_log()))
        .connect()
        .await
}

#[tokio::test]
async fn test_manual_port_unreachable() {
    let log = new_log();
    let endpoint = ControlEndpoint::tcp("10.1.2.3", 9051);

    let err = connect_manual(endpoint, AuthMethod::None, FakeConnector::new(log))
        .await
        .err()
        .unwrap();

    match err {
        Error::SocketPort { address, port } => {
            assert_eq!(address, "10.1.2.3");
            assert_eq!(port, 9051);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_manual_socket_unreachable() {
    let endpoint = ControlEndpoint::socket("/run/tor/control");

    let err = connect_manual(endpoint, AuthMethod::None, FakeConnector::new(new_log()))
        .await
        .err()
        .unwrap();

    match err {
        Error::SocketFile { path } => assert_eq!(path, PathBuf::from("/run/tor/control")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_manual_auth_failures_are_classified() {
    let cases = [
        (AuthOutcome::MissingPassword, ErrorKind::AuthMissingCredential),
        (AuthOutcome::UnreadableCookie, ErrorKind::AuthUnreadableCookie),
        (AuthOutcome::Reject, ErrorKind::AuthFailed),
        (AuthOutcome::Garbage, ErrorKind::ProtocolError),
    ];

    for (outcome, kind) in cases {
        let endpoint = ControlEndpoint::localhost(9051);
        let connector = FakeConnector::new(new_log()).serve(
            endpoint.clone(),
            ChannelScript {
                auth: outcome,
                ..Default::default()
            },
        );

        let err = connect_manual(endpoint, AuthMethod::None, connector)
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), kind, "outcome {:?}", outcome);
    }
}

#[tokio::test]
async fn test_manual_success_uses_configured_auth_and_socks() {
    let log = new_log();
    let endpoint = ControlEndpoint::localhost(9051);
    let connector = FakeConnector::new(log.clone()).serve(endpoint.clone(), ChannelScript::default());

    let manager = connect_manual(
        endpoint.clone(),
        AuthMethod::Password("hunter2".into()),
        connector,
    )
    .await
    .unwrap();

    assert_eq!(manager.socks_endpoint(), &SocksEndpoint::new("127.0.0.1", 9050));
    assert!(manager.candidate_attempts().is_empty());

    let calls = calls(&log);
    assert_eq!(calls[0], Call::Connect(endpoint));
    assert_eq!(
        calls[1],
        Call::Authenticate(AuthMethod::Password("hunter2".into()))
    );
}

#[tokio::test]
async fn test_automatic_uses_first_working_candidate() {
    let log = new_log();
    let connector = FakeConnector::new(log.clone())
        .serve(ControlEndpoint::localhost(9051), ChannelScript::default())
        .serve(
            ControlEndpoint::socket("/run/user/1000/Tor/control.socket"),
            ChannelScript::default(),
        );

    let manager = OnionManager::builder(automatic())
        .connector(connector)
        .supervisor(FakeSupervisor::new(new_log()))
        .connect()
        .await
        .unwrap();

    assert_eq!(manager.socks_endpoint(), &SocksEndpoint::localhost(9150));

    let connects: Vec<_> = calls(&log)
        .into_iter()
        .filter_map(|c| match c {
            Call::Connect(endpoint) => Some(endpoint),
            _ => None,
        })
        .collect();
    assert_eq!(
        connects,
        vec![
            ControlEndpoint::localhost(9151),
            ControlEndpoint::localhost(9153),
            ControlEndpoint::localhost(9051),
        ]
    );

    let attempts = manager.candidate_attempts();
    assert_eq!(attempts.len(), 2);
    assert!(attempts.iter().all(|a| a.stage == AttemptStage::Connect));
    assert!(calls(&log).contains(&Call::Authenticate(AuthMethod::None)));
}

#[tokio::test]
async fn test_automatic_failure_lists_every_candidate() {
    let connector = FakeConnector::new(new_log()).serve(
        ControlEndpoint::localhost(9153),
        ChannelScript {
            auth: AuthOutcome::MissingPassword,
            ..Default::default()
        },
    );

    let err = OnionManager::builder(automatic())
        .connector(connector)
        .supervisor(FakeSupervisor::new(new_log()))
        .connect()
        .await
        .err()
        .unwrap();

    let Error::Automatic { attempts } = err else {
        panic!("expected automatic discovery failure");
    };
    let endpoints: Vec<_> = attempts.iter().map(|a| a.endpoint.clone()).collect();
    assert_eq!(
        endpoints,
        vec![
            ControlEndpoint::localhost(9151),
            ControlEndpoint::localhost(9153),
            ControlEndpoint::localhost(9051),
            ControlEndpoint::socket("/run/user/1000/Tor/control.socket"),
        ]
    );
    assert_eq!(attempts[1].stage, AttemptStage::Authenticate);
    assert_eq!(attempts[0].stage, AttemptStage::Connect);
}

#[tokio::test]
async fn test_bundled_unsupported_never_spawns() {
    let log = new_log();

    let err = OnionManager::builder(ConnectionConfig::Bundled(bundled_config()))
        .platform(test_platform(false))
        .connector(FakeConnector::new(log.clone()))
        .supervisor(FakeSupervisor::new(log.clone()))
        .connect()
        .await
        .err()
        .unwrap();

    assert!(matches!(err, Error::BundledTorNotSupported));
    assert_eq!(count(&log, |c| *c == Call::Spawn), 0);
}

#[tokio::test]
async fn test_bundled_spawn_failure() {
    let log = new_log();

    let err = OnionManager::builder(ConnectionConfig::Bundled(bundled_config()))
        .platform(test_platform(true))
        .connector(FakeConnector::new(log.clone()))
        .supervisor(FakeSupervisor::new(log.clone()).failing())
        .connect()
        .await
        .err()
        .unwrap();

    assert_eq!(err.kind(), ErrorKind::BundledStartFailed);
}

#[tokio::test]
async fn test_bundled_success_uses_cookie_and_private_socks() {
    let log = new_log();
    let launch = bundled_launch();
    let connector =
        FakeConnector::new(log.clone()).serve(launch.control.clone(), ChannelScript::default());

    let manager = OnionManager::builder(ConnectionConfig::Bundled(bundled_config()))
        .platform(test_platform(true))
        .connector(connector)
        .supervisor(FakeSupervisor::new(log.clone()))
        .connect()
        .await
        .unwrap();

    assert_eq!(
        manager.socks_endpoint(),
        &SocksEndpoint::localhost(launch.socks_port)
    );
    assert!(calls(&log).contains(&Call::Authenticate(AuthMethod::Cookie(Some(
        launch.cookie_auth_file
    )))));
    assert_eq!(count(&log, |c| *c == Call::Terminate), 0);
}

#[tokio::test(start_paused = true)]
async fn test_bundled_waits_for_control_endpoint() {
    let log = new_log();
    let connector = FakeConnector::new(log.clone())
        .serve(bundled_launch().control, ChannelScript::default())
        .refuse_first(3);

    let manager = OnionManager::builder(ConnectionConfig::Bundled(bundled_config()))
        .platform(test_platform(true))
        .connector(connector)
        .supervisor(FakeSupervisor::new(log.clone()))
        .connect()
        .await;

    assert!(manager.is_ok());
    assert_eq!(count(&log, |c| matches!(c, Call::Connect(_))), 4);
}

#[tokio::test(start_paused = true)]
async fn test_bundled_control_never_appears() {
    let log = new_log();

    let err = OnionManager::builder(ConnectionConfig::Bundled(bundled_config()))
        .platform(test_platform(true))
        .connector(FakeConnector::new(log.clone()))
        .supervisor(FakeSupervisor::new(log.clone()))
        .control_wait(Duration::from_secs(2))
        .connect()
        .await
        .err()
        .unwrap();

    assert_eq!(err.kind(), ErrorKind::TransportUnreachable);
    assert_eq!(count(&log, |c| *c == Call::Terminate), 1);
}

#[tokio::test]
async fn test_bundled_auth_failure_terminates_tor() {
    let log = new_log();
    let connector = FakeConnector::new(log.clone()).serve(
        bundled_launch().control,
        ChannelScript {
            auth: AuthOutcome::UnreadableCookie,
            ..Default::default()
        },
    );

    let err = OnionManager::builder(ConnectionConfig::Bundled(bundled_config()))
        .platform(test_platform(true))
        .connector(connector)
        .supervisor(FakeSupervisor::new(log.clone()))
        .connect()
        .await
        .err()
        .unwrap();

    assert_eq!(err.kind(), ErrorKind::AuthUnreadableCookie);
    assert_eq!(count(&log, |c| *c == Call::Terminate), 1);
}
