//! End-to-end tests against the in-process host.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use common::{Behavior, MockHost, JOB_NAME, PASSWORD, SERVER_CCSID, USER};
use hostserver_protocol::protocol::security_codes;
use hostserver_protocol::{
    HostConfig, HostSystem, ProtocolError, DATABASE, DATA_QUEUE, REMOTE_COMMAND, SIGNON,
};
use std::sync::Arc;
use std::time::Duration;

// ===== SIGN-ON =====

#[tokio::test]
async fn test_connection_signs_on_and_starts_server() {
    let host = MockHost::start(Behavior::default()).await;
    let (system, locator) = host.system(USER, PASSWORD);

    let conn = system.connection(&REMOTE_COMMAND, 0x1234).await.unwrap();
    assert_eq!(conn.correlation_id(), 0x1234);
    assert_eq!(conn.service().id, REMOTE_COMMAND.id);
    assert_eq!(conn.job_name().as_deref(), Some(JOB_NAME));

    // One sign-on socket plus one service socket.
    assert_eq!(locator.calls(), 2);
    assert_eq!(host.stats.signons(), 1);
    assert_eq!(host.stats.start_servers(), 1);
    host.stats.wait_closed(1).await;

    let info = system.signon_info().await.unwrap();
    assert_eq!(info.server_version, common::SERVER_VERSION);
    assert_eq!(info.server_level, common::SERVER_LEVEL);
    assert_eq!(info.server_ccsid, SERVER_CCSID);
    assert_eq!(info.expiration_warning, 7);
    assert_eq!(system.server_ccsid().await, Some(SERVER_CCSID));
}

#[tokio::test]
async fn test_hash_password_level() {
    let host = MockHost::start(Behavior {
        password_level: 2,
        ..Default::default()
    })
    .await;
    let (system, _) = host.system(USER, PASSWORD);

    let conn = system.connection(&DATA_QUEUE, 9).await.unwrap();
    assert_eq!(conn.job_name().as_deref(), Some(JOB_NAME));
    assert_eq!(system.signon_info().await.unwrap().password_level.0, 2);
}

#[tokio::test]
async fn test_unknown_user_is_rejected() {
    let host = MockHost::start(Behavior::default()).await;
    let (system, _) = host.system("BAD", PASSWORD);

    let err = system.connection(&REMOTE_COMMAND, 1).await.unwrap_err();
    match err {
        ProtocolError::ReturnCode { code, message } => {
            assert_eq!(code, security_codes::USER_ID_UNKNOWN);
            assert_eq!(message, "Unknown user ID");
        }
        other => panic!("expected ReturnCode, got {other:?}"),
    }
    assert!(system.signon_info().await.is_none());
    assert!(!system.cache().contains(1).await);
    // Both the sign-on socket and the service socket are closed.
    host.stats.wait_closed(2).await;
}

#[tokio::test]
async fn test_wrong_password_is_rejected() {
    let host = MockHost::start(Behavior {
        password_level: 2,
        ..Default::default()
    })
    .await;
    let (system, _) = host.system(USER, "WRONG");

    let err = system.signon().await.unwrap_err();
    assert_eq!(err.return_code_value(), Some(security_codes::PASSWORD_INCORRECT));
    assert_eq!(system.metrics().signons_failed, 1);
}

#[tokio::test]
async fn test_signon_runs_once_per_system() {
    let host = MockHost::start(Behavior::default()).await;
    let (system, _) = host.system(USER, PASSWORD);

    system.connection(&DATA_QUEUE, 1).await.unwrap();
    system.connection(&REMOTE_COMMAND, 2).await.unwrap();
    system.connection(&DATABASE, 3).await.unwrap();
    assert_eq!(host.stats.signons(), 1);
    assert_eq!(host.stats.start_servers(), 3);

    // An explicit sign-on always goes to the host.
    system.signon().await.unwrap();
    assert_eq!(host.stats.signons(), 2);
}

#[tokio::test]
async fn test_signon_service_skips_start_server() {
    let host = MockHost::start(Behavior::default()).await;
    let (system, locator) = host.system(USER, PASSWORD);

    let conn = system.connection(&SIGNON, 5).await.unwrap();
    assert!(conn.job_id().is_none());
    assert_eq!(locator.calls(), 1);
    assert_eq!(host.stats.signons(), 0);
    assert_eq!(host.stats.start_servers(), 0);
}

// ===== CONNECTION CACHE =====

#[tokio::test]
async fn test_cached_connection_is_reused() {
    let host = MockHost::start(Behavior::default()).await;
    let (system, locator) = host.system(USER, PASSWORD);

    let first = system.connection(&DATA_QUEUE, 77).await.unwrap();
    let calls = locator.calls();
    let second = system.connection(&DATA_QUEUE, 77).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(locator.calls(), calls);
    assert_eq!(system.metrics().connections_reused, 1);
}

#[tokio::test]
async fn test_failed_start_server_closes_socket_and_caches_nothing() {
    let host = MockHost::start(Behavior {
        start_server_rc: security_codes::PASSWORD_EXPIRED,
        ..Default::default()
    })
    .await;
    let (system, _) = host.system(USER, PASSWORD);

    let err = system.connection(&REMOTE_COMMAND, 11).await.unwrap_err();
    assert_eq!(err.return_code_value(), Some(security_codes::PASSWORD_EXPIRED));
    assert!(!system.cache().contains(11).await);
    host.stats.wait_closed(2).await;

    let metrics = system.metrics();
    assert_eq!(metrics.handshakes_failed, 1);
    assert_eq!(metrics.connections_active, 0);
}

#[tokio::test]
async fn test_concurrent_callers_share_one_build() {
    let host = MockHost::start(Behavior {
        seed_delay: Duration::from_millis(30),
        ..Default::default()
    })
    .await;
    let (system, _) = host.system(USER, PASSWORD);

    let mut tasks = Vec::new();
    for _ in 0..6 {
        let system = system.clone();
        tasks.push(tokio::spawn(async move {
            system.connection(&DATA_QUEUE, 500).await
        }));
    }
    let mut conns = Vec::new();
    for task in tasks {
        conns.push(task.await.unwrap().unwrap());
    }

    assert!(conns.iter().all(|c| Arc::ptr_eq(c, &conns[0])));
    assert_eq!(host.stats.start_servers(), 1);
    assert_eq!(host.stats.signons(), 1);
}

#[tokio::test]
async fn test_distinct_ids_get_distinct_connections() {
    let host = MockHost::start(Behavior::default()).await;
    let (system, _) = host.system(USER, PASSWORD);

    let a = system.connection(&DATA_QUEUE, 1).await.unwrap();
    let b = system.connection(&DATA_QUEUE, 2).await.unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(system.cache().len().await, 2);
}

#[tokio::test]
async fn test_disconnect() {
    let host = MockHost::start(Behavior::default()).await;
    let (system, _) = host.system(USER, PASSWORD);

    system.connection(&DATA_QUEUE, 1).await.unwrap();
    system.connection(&REMOTE_COMMAND, 2).await.unwrap();
    system.connection(&DATABASE, 3).await.unwrap();

    assert!(system.disconnect(1).await.unwrap());
    assert!(!system.disconnect(1).await.unwrap());
    assert_eq!(system.disconnect_all().await, 2);
    assert!(system.cache().is_empty().await);
    // Sign-on socket plus three service sockets.
    host.stats.wait_closed(4).await;
}

// ===== PORT MAPPER =====

#[tokio::test]
async fn test_end_to_end_through_port_mapper() {
    let host = MockHost::start(Behavior::default()).await;
    let (mapper_port, names) = common::mock_port_mapper(host.addr.port()).await;

    let mut config = HostConfig::new("127.0.0.1", USER, PASSWORD);
    config.connection.port_mapper_port = mapper_port;
    let system = HostSystem::new(config).unwrap();

    let conn = system.connection(&REMOTE_COMMAND, 3).await.unwrap();
    assert_eq!(conn.job_name().as_deref(), Some(JOB_NAME));

    // The service socket is located before sign-on runs.
    let names = names.lock().unwrap().clone();
    assert_eq!(names, vec!["as-rmtcmd".to_string(), "as-signon".to_string()]);
}

#[tokio::test]
async fn test_unreachable_host_fails_to_locate() {
    let mut config = HostConfig::new("127.0.0.1", USER, PASSWORD);
    // Nothing listens on the mapper port of a freshly closed listener.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    config.connection.port_mapper_port = listener.local_addr().unwrap().port();
    config.connection.connect_timeout = Duration::from_secs(2);
    drop(listener);

    let system = HostSystem::new(config).unwrap();
    let err = system.connection(&DATA_QUEUE, 1).await.unwrap_err();
    assert!(err.is_transport(), "unexpected error {err:?}");
    assert!(system.cache().is_empty().await);
}
