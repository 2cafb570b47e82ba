//! Host server handshake steps.
//!
//! A bare socket becomes usable in two ways:
//!
//! - **Sign-on** (on the sign-on service): seed exchange, then sign-on info
//!   with the encrypted password. This proves the credentials and reports
//!   the password level every later credential is encrypted with.
//! - **Service start** (on any other service): random seed exchange, then
//!   start server with a credential built from the new seeds. The reply
//!   names the server job bound to the socket.
//!
//! Each step is one request and one reply. Per-attempt state lives in
//! [`HandshakeState`], so concurrent handshakes never share seeds. Seeds are
//! zeroized when the state is dropped.

use crate::error::{ProtocolError, Result, Stage};
use crate::protocol::messages::{
    field, RandomSeedExchangeRequest, RandomSeedExchangeResponse, SignonInfoRequest,
    SignonInfoResponse, SignonSeedExchangeRequest, SignonSeedExchangeResponse, StartServerRequest,
    StartServerResponse,
};
use crate::protocol::messages::start_server::job_name_text;
use crate::service::descriptor::ServiceDescriptor;
use crate::transport::channel::Channel;
use crate::utils::crypto::{encrypt_password, PasswordLevel, Seed};
use chrono::NaiveDateTime;
use tracing::{debug, instrument, warn};

/// Seeds of one handshake attempt
pub struct HandshakeState {
    client_seed: Seed,
    server_seed: Option<Seed>,
}

impl HandshakeState {
    /// Fresh state with a newly drawn client seed.
    pub fn new() -> Result<Self> {
        Ok(Self::with_seed(Seed::generate()?))
    }

    /// State with a caller-chosen client seed.
    pub fn with_seed(client_seed: Seed) -> Self {
        HandshakeState {
            client_seed,
            server_seed: None,
        }
    }

    pub fn client_seed(&self) -> &Seed {
        &self.client_seed
    }

    fn server_seed(&self, stage: Stage) -> Result<&Seed> {
        self.server_seed.as_ref().ok_or(ProtocolError::MissingField {
            stage,
            id: field::SEED,
        })
    }
}

/// What the sign-on server reports in the seed exchange.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerAttributes {
    pub server_version: u32,
    pub server_level: u16,
    pub password_level: PasswordLevel,
}

/// What a completed sign-on learned about the host and the account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignonInfo {
    pub server_version: u32,
    pub server_level: u16,
    pub password_level: PasswordLevel,
    pub server_ccsid: u32,
    pub current_signon_date: Option<NaiveDateTime>,
    pub last_signon_date: Option<NaiveDateTime>,
    pub password_expiration_date: Option<NaiveDateTime>,
    /// Days before expiry at which the host starts warning
    pub expiration_warning: u32,
    /// User id as the host echoed it
    pub user_id: Option<String>,
    /// Sign-on server job
    pub job_name: Option<String>,
}

fn check_rc(rc: u32, stage: Stage) -> Result<()> {
    if rc == 0 {
        return Ok(());
    }
    let err = ProtocolError::return_code(rc);
    warn!(%stage, rc, error = %err, "Host rejected request");
    Err(err)
}

/// Sign-on seed exchange. Records the server seed in `state`.
#[instrument(skip_all, fields(peer = %channel.peer()))]
pub async fn signon_seed_exchange(
    channel: &mut Channel,
    state: &mut HandshakeState,
) -> Result<(ServerAttributes, Option<Vec<u8>>)> {
    let request = SignonSeedExchangeRequest::new(state.client_seed.clone());
    let frame = channel.request(request.encode()?).await?;
    let response = SignonSeedExchangeResponse::decode(&frame)?;
    check_rc(response.rc, Stage::SignonSeedExchange)?;

    state.server_seed = Some(response.server_seed.ok_or(ProtocolError::MissingField {
        stage: Stage::SignonSeedExchange,
        id: field::SEED,
    })?);
    let attributes = ServerAttributes {
        server_version: response.server_version.unwrap_or(0),
        server_level: response.server_level.unwrap_or(0),
        password_level: response.password_level.ok_or(ProtocolError::MissingField {
            stage: Stage::SignonSeedExchange,
            id: field::PASSWORD_LEVEL,
        })?,
    };
    debug!(
        server_version = attributes.server_version,
        server_level = attributes.server_level,
        password_level = attributes.password_level.0,
        "Sign-on seeds exchanged"
    );
    Ok((attributes, response.job_name))
}

/// Submit the encrypted password on the sign-on socket.
#[instrument(skip(channel, state, password), fields(peer = %channel.peer()))]
pub async fn signon_info(
    channel: &mut Channel,
    state: &HandshakeState,
    attributes: &ServerAttributes,
    user_id: &str,
    password: &str,
) -> Result<SignonInfoResponse> {
    let credential = encrypt_password(
        attributes.password_level,
        user_id,
        password,
        &state.client_seed,
        state.server_seed(Stage::SignonInfo)?,
    )?;
    let request = SignonInfoRequest {
        user_id: user_id.to_string(),
        credential,
        server_level: attributes.server_level,
    };
    let frame = channel.request(request.encode()?).await?;
    let response = SignonInfoResponse::decode(&frame)?;
    check_rc(response.rc, Stage::SignonInfo)?;
    debug!(server_ccsid = ?response.server_ccsid, "Sign-on accepted");
    Ok(response)
}

/// Run the whole sign-on exchange on a sign-on socket.
pub async fn signon(channel: &mut Channel, user_id: &str, password: &str) -> Result<SignonInfo> {
    let mut state = HandshakeState::new()?;
    let (attributes, job_name) = signon_seed_exchange(channel, &mut state).await?;
    let info = signon_info(channel, &state, &attributes, user_id, password).await?;
    Ok(SignonInfo {
        server_version: attributes.server_version,
        server_level: attributes.server_level,
        password_level: attributes.password_level,
        server_ccsid: info.server_ccsid.unwrap_or(0),
        current_signon_date: info.current_signon_date,
        last_signon_date: info.last_signon_date,
        password_expiration_date: info.password_expiration_date,
        expiration_warning: info.expiration_warning.unwrap_or(0),
        user_id: info.user_id,
        job_name: job_name.as_deref().map(job_name_text),
    })
}

/// Random seed exchange with a target service. Records the server seed in `state`.
#[instrument(skip(channel, state, service), fields(service = service.name, peer = %channel.peer()))]
pub async fn random_seed_exchange(
    channel: &mut Channel,
    state: &mut HandshakeState,
    service: &ServiceDescriptor,
    correlation_id: u32,
) -> Result<()> {
    let request = RandomSeedExchangeRequest {
        service_id: service.id,
        correlation_id,
        client_seed: state.client_seed.clone(),
    };
    let frame = channel.request(request.encode()?).await?;
    let response = RandomSeedExchangeResponse::decode(&frame)?;
    check_rc(response.rc, Stage::SeedExchange)?;

    let server_seed = response.server_seed.ok_or(ProtocolError::Framing {
        stage: Stage::SeedExchange,
        expected: 32,
        actual: frame.len(),
    })?;
    state.server_seed = Some(server_seed);
    debug!("Service seeds exchanged");
    Ok(())
}

/// Start server on a service socket. Returns the raw job name value.
#[instrument(skip(channel, state, service, password), fields(service = service.name, peer = %channel.peer()))]
pub async fn start_server(
    channel: &mut Channel,
    state: &HandshakeState,
    service: &ServiceDescriptor,
    correlation_id: u32,
    password_level: PasswordLevel,
    user_id: &str,
    password: &str,
) -> Result<Option<Vec<u8>>> {
    let credential = encrypt_password(
        password_level,
        user_id,
        password,
        &state.client_seed,
        state.server_seed(Stage::StartServer)?,
    )?;
    let request = StartServerRequest {
        service_id: service.id,
        correlation_id,
        user_id: user_id.to_string(),
        credential,
    };
    let frame = channel.request(request.encode()?).await?;
    let response = StartServerResponse::decode(&frame)?;
    check_rc(response.rc, Stage::StartServer)?;

    if let Some(job) = response.job_name.as_deref() {
        debug!(job = %job_name_text(job), "Server job started");
    }
    Ok(response.job_name)
}

/// Seed exchange followed by start server: authenticate a raw service socket.
pub async fn start_service(
    channel: &mut Channel,
    service: &ServiceDescriptor,
    correlation_id: u32,
    password_level: PasswordLevel,
    user_id: &str,
    password: &str,
) -> Result<Option<Vec<u8>>> {
    let mut state = HandshakeState::new()?;
    random_seed_exchange(channel, &mut state, service, correlation_id).await?;
    start_server(
        channel,
        &state,
        service,
        correlation_id,
        password_level,
        user_id,
        password,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::HostCodec;
    use crate::protocol::messages::JOB_NAME_WIDTH;
    use crate::service::descriptor::DATA_QUEUE;
    use crate::transport::stream::boxed;
    use crate::utils::crypto;
    use crate::utils::metrics::Metrics;
    use futures::{SinkExt, StreamExt};
    use std::sync::Arc;
    use tokio::io::DuplexStream;
    use tokio_util::codec::Framed;

    fn pair() -> (Channel, Framed<DuplexStream, HostCodec>) {
        let (client, server) = tokio::io::duplex(4096);
        let channel = Channel::new(boxed(client), "duplex", 1 << 20, Arc::new(Metrics::new()));
        (channel, Framed::new(server, HostCodec::default()))
    }

    #[tokio::test]
    async fn test_signon_seed_exchange_records_server_seed() {
        let (mut channel, mut host) = pair();
        let peer = tokio::spawn(async move {
            let frame = host.next().await.unwrap().unwrap();
            let request = SignonSeedExchangeRequest::decode(&frame).unwrap();
            let reply = SignonSeedExchangeResponse {
                server_version: Some(7),
                server_level: Some(10),
                server_seed: Some(Seed::from([5; 8])),
                password_level: Some(PasswordLevel(2)),
                ..Default::default()
            };
            host.send(reply.encode().unwrap()).await.unwrap();
            request.client_seed
        });

        let mut state = HandshakeState::with_seed(Seed::from([1; 8]));
        let (attrs, _) = signon_seed_exchange(&mut channel, &mut state).await.unwrap();
        assert_eq!(attrs.server_level, 10);
        assert_eq!(attrs.password_level, PasswordLevel(2));
        assert_eq!(state.server_seed, Some(Seed::from([5; 8])));
        assert_eq!(peer.await.unwrap(), Seed::from([1; 8]));
    }

    #[tokio::test]
    async fn test_signon_seed_exchange_rejected() {
        let (mut channel, mut host) = pair();
        tokio::spawn(async move {
            let _ = host.next().await;
            let reply = SignonSeedExchangeResponse {
                rc: 0x0001_0001,
                ..Default::default()
            };
            host.send(reply.encode().unwrap()).await.unwrap();
        });

        let mut state = HandshakeState::with_seed(Seed::from([1; 8]));
        let err = signon_seed_exchange(&mut channel, &mut state).await.unwrap_err();
        assert_eq!(err.return_code_value(), Some(0x0001_0001));
        assert!(state.server_seed.is_none());
    }

    #[tokio::test]
    async fn test_start_service_sends_expected_credential() {
        let (mut channel, mut host) = pair();
        let server_seed = Seed::from([0xAB; 8]);
        let peer_seed = server_seed.clone();
        let peer = tokio::spawn(async move {
            let frame = host.next().await.unwrap().unwrap();
            let seed_req = RandomSeedExchangeRequest::decode(&frame).unwrap();
            let reply = RandomSeedExchangeResponse {
                rc: 0,
                server_seed: Some(peer_seed),
            };
            host.send(reply.encode(seed_req.service_id, seed_req.correlation_id).unwrap())
                .await
                .unwrap();

            let frame = host.next().await.unwrap().unwrap();
            let start = StartServerRequest::decode(&frame).unwrap();
            let reply = StartServerResponse {
                rc: 0,
                user_id: Some(start.user_id.clone()),
                job_name: Some(vec![0, 0, 0, 37, 0xF1]),
            };
            host.send(reply.encode(start.service_id, start.correlation_id).unwrap())
                .await
                .unwrap();
            (seed_req, start)
        });

        let job = start_service(&mut channel, &DATA_QUEUE, 99, PasswordLevel(0), "USER", "PASS")
            .await
            .unwrap();
        // The job name field is fixed width and comes back zero filled.
        let mut expected_job = vec![0, 0, 0, 37, 0xF1];
        expected_job.resize(JOB_NAME_WIDTH, 0);
        assert_eq!(job, Some(expected_job));

        let (seed_req, start) = peer.await.unwrap();
        assert_eq!(seed_req.service_id, 0xE007);
        assert_eq!(seed_req.correlation_id, 99);
        let expected =
            crypto::encrypt_legacy("USER", "PASS", &seed_req.client_seed, &server_seed).unwrap();
        assert_eq!(start.credential.as_slice(), &expected[..]);
        assert_eq!(start.correlation_id, 99);
    }

    #[tokio::test]
    async fn test_seed_reply_without_seed_is_framing() {
        let (mut channel, mut host) = pair();
        tokio::spawn(async move {
            let _ = host.next().await;
            let mut short = crate::core::packet::Packet::with_size(24).unwrap();
            short.set_request_response_id(0xF001);
            host.send(short).await.unwrap();
        });

        let mut state = HandshakeState::with_seed(Seed::from([1; 8]));
        let err = random_seed_exchange(&mut channel, &mut state, &DATA_QUEUE, 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Framing {
                stage: Stage::SeedExchange,
                expected: 32,
                actual: 24
            }
        ));
    }
}
