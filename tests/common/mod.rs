//! In-process host used by the integration tests.
//!
//! Answers sign-on, random seed, start server and attribute exchange requests
//! on a loopback listener, and echoes anything else back. Credentials are
//! checked the way the host checks them, by recomputing the substitution from
//! the seeds seen on the same socket.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use hostserver_protocol::core::codec::HostCodec;
use hostserver_protocol::core::packet::Packet;
use hostserver_protocol::error::Result;
use hostserver_protocol::protocol::messages::{
    id, DataQueueExchangeAttributesResponse, DataQueueReturnCodeResponse,
    RandomSeedExchangeRequest, RandomSeedExchangeResponse, RemoteCommandExchangeAttributesResponse,
    SignonInfoRequest, SignonInfoResponse, SignonSeedExchangeRequest, SignonSeedExchangeResponse,
    StartServerRequest, StartServerResponse,
};
use hostserver_protocol::protocol::security_codes;
use hostserver_protocol::service::ServiceDescriptor;
use hostserver_protocol::transport::stream::{boxed, BoxedStream};
use hostserver_protocol::utils::crypto::{self, PasswordLevel, Seed};
use hostserver_protocol::utils::ebcdic;
use hostserver_protocol::{HostConfig, HostSystem, ServiceLocator};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;

pub const USER: &str = "USER";
pub const PASSWORD: &str = "PASS";
pub const JOB_NAME: &str = "123456/QUSER/QZRCSRVS";
pub const SERVER_VERSION: u32 = 7_340_545;
pub const SERVER_LEVEL: u16 = 10;
pub const SERVER_CCSID: u32 = 37;

/// How the mock host answers.
#[derive(Debug, Clone)]
pub struct Behavior {
    pub password_level: u8,
    /// Return code for start server (0 accepts)
    pub start_server_rc: u32,
    /// Return code reply for the data queue exchange
    pub data_queue_rc: Option<(u16, Option<String>)>,
    /// Return code for the remote command exchange
    pub remote_command_rc: u16,
    /// Delay before answering the random seed exchange
    pub seed_delay: Duration,
}

impl Default for Behavior {
    fn default() -> Self {
        Behavior {
            password_level: 0,
            start_server_rc: 0,
            data_queue_rc: None,
            remote_command_rc: 0,
            seed_delay: Duration::ZERO,
        }
    }
}

/// Counters shared with the test body.
#[derive(Debug, Default)]
pub struct Stats {
    pub accepted: AtomicUsize,
    pub closed: AtomicUsize,
    pub signons: AtomicUsize,
    pub start_servers: AtomicUsize,
    pub service_ids: Mutex<Vec<u16>>,
}

impl Stats {
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn signons(&self) -> usize {
        self.signons.load(Ordering::SeqCst)
    }

    pub fn start_servers(&self) -> usize {
        self.start_servers.load(Ordering::SeqCst)
    }

    /// Wait until `count` sockets have been closed by the client.
    pub async fn wait_closed(&self, count: usize) {
        for _ in 0..200 {
            if self.closed() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {count} closed sockets, saw {}", self.closed());
    }
}

pub struct MockHost {
    pub addr: SocketAddr,
    pub stats: Arc<Stats>,
}

impl MockHost {
    pub async fn start(behavior: Behavior) -> MockHost {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let stats = Arc::new(Stats::default());
        let accept_stats = stats.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                accept_stats.accepted.fetch_add(1, Ordering::SeqCst);
                let stats = accept_stats.clone();
                let behavior = behavior.clone();
                tokio::spawn(async move {
                    serve(socket, &behavior, &stats).await;
                    stats.closed.fetch_add(1, Ordering::SeqCst);
                });
            }
        });
        MockHost { addr, stats }
    }

    pub fn locator(&self) -> Arc<MockLocator> {
        Arc::new(MockLocator {
            addr: self.addr,
            calls: AtomicUsize::new(0),
        })
    }

    /// System signed on as `user` and talking to this host.
    pub fn system(&self, user: &str, password: &str) -> (Arc<HostSystem>, Arc<MockLocator>) {
        let locator = self.locator();
        let config = HostConfig::new("127.0.0.1", user, password);
        let system = HostSystem::with_locator(config, locator.clone()).unwrap();
        (Arc::new(system), locator)
    }
}

/// Locator that connects every service straight to the mock host.
pub struct MockLocator {
    addr: SocketAddr,
    calls: AtomicUsize,
}

impl MockLocator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServiceLocator for MockLocator {
    async fn connect(&self, _host: &str, _service: &ServiceDescriptor) -> Result<BoxedStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let stream = TcpStream::connect(self.addr).await?;
        Ok(boxed(stream))
    }
}

#[derive(Default)]
struct SocketState {
    client_seed: Option<Seed>,
    server_seed: Option<Seed>,
}

fn job_name_value() -> Vec<u8> {
    let mut value = SERVER_CCSID.to_be_bytes().to_vec();
    value.extend(ebcdic::encode(JOB_NAME).unwrap());
    value
}

fn credential_ok(
    level: PasswordLevel,
    user: &str,
    credential: &[u8],
    state: &SocketState,
) -> Option<u32> {
    if user != USER {
        return Some(security_codes::USER_ID_UNKNOWN);
    }
    let (client, server) = (state.client_seed.as_ref()?, state.server_seed.as_ref()?);
    let expected = crypto::encrypt_password(level, user, PASSWORD, client, server).unwrap();
    if expected.as_slice() == credential {
        None
    } else {
        Some(security_codes::PASSWORD_INCORRECT)
    }
}

async fn serve(socket: TcpStream, behavior: &Behavior, stats: &Stats) {
    let mut framed = Framed::new(socket, HostCodec::default());
    let mut state = SocketState::default();
    let level = PasswordLevel(behavior.password_level);

    while let Some(Ok(frame)) = framed.next().await {
        let packet = Packet::from_bytes(&frame).unwrap();
        stats.service_ids.lock().unwrap().push(packet.service_id());

        let reply = match packet.request_response_id() {
            id::SIGNON_SEED_EXCHANGE_REQUEST => {
                let request = SignonSeedExchangeRequest::decode(&frame).unwrap();
                let server_seed = Seed::generate().unwrap();
                state.client_seed = Some(request.client_seed);
                state.server_seed = Some(server_seed.clone());
                SignonSeedExchangeResponse {
                    rc: 0,
                    server_version: Some(SERVER_VERSION),
                    server_level: Some(SERVER_LEVEL),
                    server_seed: Some(server_seed),
                    password_level: Some(level),
                    job_name: Some(job_name_value()),
                }
                .encode()
                .unwrap()
            }
            id::SIGNON_INFO_REQUEST => {
                stats.signons.fetch_add(1, Ordering::SeqCst);
                let request = SignonInfoRequest::decode(&frame).unwrap();
                match credential_ok(level, &request.user_id, &request.credential, &state) {
                    Some(rc) => SignonInfoResponse {
                        rc,
                        ..Default::default()
                    },
                    None => SignonInfoResponse {
                        rc: 0,
                        current_signon_date: chrono::NaiveDate::from_ymd_opt(2024, 5, 1)
                            .and_then(|d| d.and_hms_opt(9, 30, 0)),
                        last_signon_date: None,
                        password_expiration_date: None,
                        expiration_warning: Some(7),
                        server_ccsid: Some(SERVER_CCSID),
                        user_id: Some(request.user_id.clone()),
                    },
                }
                .encode()
                .unwrap()
            }
            id::RANDOM_SEED_EXCHANGE_REQUEST => {
                tokio::time::sleep(behavior.seed_delay).await;
                let request = RandomSeedExchangeRequest::decode(&frame).unwrap();
                let server_seed = Seed::generate().unwrap();
                state.client_seed = Some(request.client_seed);
                state.server_seed = Some(server_seed.clone());
                RandomSeedExchangeResponse {
                    rc: 0,
                    server_seed: Some(server_seed),
                }
                .encode(request.service_id, request.correlation_id)
                .unwrap()
            }
            id::START_SERVER_REQUEST => {
                stats.start_servers.fetch_add(1, Ordering::SeqCst);
                let request = StartServerRequest::decode(&frame).unwrap();
                let rc = credential_ok(level, &request.user_id, &request.credential, &state)
                    .unwrap_or(behavior.start_server_rc);
                let reply = if rc == 0 {
                    StartServerResponse {
                        rc,
                        user_id: Some(request.user_id.clone()),
                        job_name: Some(job_name_value()),
                    }
                } else {
                    StartServerResponse {
                        rc,
                        ..Default::default()
                    }
                };
                reply.encode(request.service_id, request.correlation_id).unwrap()
            }
            id::DATA_QUEUE_EXCHANGE_ATTRIBUTES => match &behavior.data_queue_rc {
                Some((rc, message)) => DataQueueReturnCodeResponse {
                    rc: *rc,
                    message: message.clone(),
                }
                .encode()
                .unwrap(),
                None => DataQueueExchangeAttributesResponse.encode().unwrap(),
            },
            id::REMOTE_COMMAND_EXCHANGE_ATTRIBUTES_REQUEST => RemoteCommandExchangeAttributesResponse {
                rc: behavior.remote_command_rc,
                ccsid: Some(SERVER_CCSID),
                ds_level: Some(SERVER_LEVEL),
            }
            .encode()
            .unwrap(),
            _ => packet,
        };

        if framed.send(reply).await.is_err() {
            break;
        }
    }
}

/// Port mapper that answers every service name with `port`.
pub async fn mock_port_mapper(port: u16) -> (u16, Arc<Mutex<Vec<String>>>) {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mapper_port = listener.local_addr().unwrap().port();
    let names = Arc::new(Mutex::new(Vec::new()));
    let seen = names.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = [0u8; 64];
            let n = socket.read(&mut buf).await.unwrap_or(0);
            seen.lock().unwrap().push(String::from_utf8_lossy(&buf[..n]).into_owned());
            let mut reply = vec![0x2B];
            reply.extend_from_slice(&u32::from(port).to_be_bytes());
            let _ = socket.write_all(&reply).await;
        }
    });
    (mapper_port, names)
}
