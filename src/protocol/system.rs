//! # Host System
//!
//! [`HostSystem`] owns everything needed to talk to one host as one user:
//! credentials, the service locator, the connection cache and the sign-on
//! state. Services ask it for connections by correlation id.
//!
//! Building a connection:
//!
//! ```text
//! LOCATING ─▶ CONNECTED_RAW ─┬─ sign-on service ──────────────────────────────▶ READY
//!                            └─ SIGNON_IF_NEEDED ─▶ SEED_EXCHANGE ─▶ START_SERVER ─▶ READY
//!                  any failure after LOCATING: socket closed, nothing cached ─▶ FAILED
//! ```
//!
//! Sign-on runs at most once per system on its own short-lived socket; later
//! builds reuse the password level it learned.

use crate::config::{HostConfig, MAX_CREDENTIAL_CHARS};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::handshake::{self, SignonInfo};
use crate::service::descriptor::{ServiceDescriptor, SIGNON};
use crate::transport::channel::Channel;
use crate::transport::connection::Connection;
use crate::transport::connection_cache::{ConnectionCache, Lookup};
use crate::transport::port_mapper::{PortMapper, ServiceLocator};
use crate::transport::stream::BoxedStream;
use crate::utils::environment;
use crate::utils::metrics::{Metrics, MetricsSnapshot, Timer};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};
use zeroize::Zeroizing;

/// Step a connection build was in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStage {
    Locating,
    ConnectedRaw,
    SignonIfNeeded,
    SeedExchange,
    StartServer,
    Ready,
}

pub struct HostSystem {
    config: HostConfig,
    password: Zeroizing<String>,
    locator: Arc<dyn ServiceLocator>,
    cache: Arc<ConnectionCache>,
    signon: Mutex<Option<SignonInfo>>,
    metrics: Arc<Metrics>,
    nlv: &'static str,
    client_ccsid: u32,
}

impl HostSystem {
    /// System using the port mapper described by `config.connection`.
    pub fn new(config: HostConfig) -> Result<Self> {
        let locator = Arc::new(PortMapper::new(&config.connection));
        Self::with_locator(config, locator)
    }

    /// System with a caller-supplied locator.
    pub fn with_locator(config: HostConfig, locator: Arc<dyn ServiceLocator>) -> Result<Self> {
        Self::with_parts(config, locator, Arc::new(ConnectionCache::new()))
    }

    /// System with a caller-supplied locator and connection cache.
    pub fn with_parts(
        mut config: HostConfig,
        locator: Arc<dyn ServiceLocator>,
        cache: Arc<ConnectionCache>,
    ) -> Result<Self> {
        validate_credentials(&config)?;
        let password = Zeroizing::new(std::mem::take(&mut config.password));

        debug!(
            host = %config.host,
            user = %config.user,
            use_tls = config.connection.use_tls,
            use_default_ports = config.connection.use_default_ports,
            "Host system created"
        );

        Ok(HostSystem {
            config,
            password,
            locator,
            cache,
            signon: Mutex::new(None),
            metrics: Arc::new(Metrics::new()),
            nlv: environment::nlv(),
            client_ccsid: environment::ccsid(),
        })
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    pub fn user_id(&self) -> &str {
        &self.config.user
    }

    /// Configuration this system was built from (password removed)
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// National language version sent to services that ask for one
    pub fn nlv(&self) -> &'static str {
        self.nlv
    }

    /// CCSID of the local environment
    pub fn client_ccsid(&self) -> u32 {
        self.client_ccsid
    }

    pub fn cache(&self) -> &Arc<ConnectionCache> {
        &self.cache
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Result of the last successful sign-on.
    pub async fn signon_info(&self) -> Option<SignonInfo> {
        self.signon.lock().await.clone()
    }

    /// Server CCSID reported at sign-on.
    pub async fn server_ccsid(&self) -> Option<u32> {
        self.signon.lock().await.as_ref().map(|info| info.server_ccsid)
    }

    /// Connection for `service` under `correlation_id`, built on first use.
    ///
    /// Concurrent callers with the same id share one build.
    #[instrument(skip(self, service), fields(host = %self.config.host, service = service.name))]
    pub async fn connection(
        &self,
        service: &ServiceDescriptor,
        correlation_id: u32,
    ) -> Result<Arc<Connection>> {
        let lookup = self
            .cache
            .get_or_build(correlation_id, || self.build(service, correlation_id))
            .await?;

        if let Lookup::Hit(conn) = &lookup {
            self.metrics.connection_reused();
            if conn.service().id != service.id {
                warn!(
                    cached = conn.service().name,
                    "Correlation id already bound to another service"
                );
            }
            debug!("Reusing cached connection");
        }
        Ok(lookup.into_connection())
    }

    async fn build(&self, service: &ServiceDescriptor, correlation_id: u32) -> Result<Connection> {
        self.metrics.handshake_attempt();
        let _timer = Timer::start("connection_build");

        let mut stage = HandshakeStage::Locating;
        debug!(?stage, "Building connection");
        let stream = match self.locator.connect(&self.config.host, service).await {
            Ok(stream) => stream,
            Err(e) => {
                self.metrics.handshake_failed();
                self.metrics.record_error(&e);
                error!(?stage, error = %e, "Failed to locate service");
                return Err(e);
            }
        };
        self.metrics.connection_established();

        stage = HandshakeStage::ConnectedRaw;
        debug!(?stage, "Socket connected");
        let mut channel = self.channel(stream, service);

        let job_id = if service.is_signon() {
            None
        } else {
            match self
                .authenticate(&mut channel, service, correlation_id, &mut stage)
                .await
            {
                Ok(job_id) => job_id,
                Err(e) => {
                    error!(?stage, error = %e, "Connection handshake failed");
                    if let Err(close_err) = channel.close().await {
                        debug!(error = %close_err, "Socket close after failure also failed");
                    }
                    self.metrics.connections_closed(1);
                    self.metrics.handshake_failed();
                    self.metrics.record_error(&e);
                    return Err(e);
                }
            }
        };

        stage = HandshakeStage::Ready;
        self.metrics.handshake_success();
        info!(?stage, correlation_id, "Connection ready");
        Ok(Connection::new(channel, *service, correlation_id, job_id))
    }

    async fn authenticate(
        &self,
        channel: &mut Channel,
        service: &ServiceDescriptor,
        correlation_id: u32,
        stage: &mut HandshakeStage,
    ) -> Result<Option<Vec<u8>>> {
        *stage = HandshakeStage::SignonIfNeeded;
        let password_level = self.ensure_signon().await?.password_level;

        *stage = HandshakeStage::SeedExchange;
        let mut state = handshake::HandshakeState::new()?;
        handshake::random_seed_exchange(channel, &mut state, service, correlation_id).await?;

        *stage = HandshakeStage::StartServer;
        handshake::start_server(
            channel,
            &state,
            service,
            correlation_id,
            password_level,
            &self.config.user,
            &self.password,
        )
        .await
    }

    /// Sign on unless an earlier sign-on succeeded.
    async fn ensure_signon(&self) -> Result<SignonInfo> {
        let mut guard = self.signon.lock().await;
        if let Some(info) = guard.as_ref() {
            return Ok(info.clone());
        }
        let info = self.run_signon().await?;
        *guard = Some(info.clone());
        Ok(info)
    }

    /// Sign on now, replacing any earlier sign-on result.
    pub async fn signon(&self) -> Result<SignonInfo> {
        let mut guard = self.signon.lock().await;
        let info = self.run_signon().await?;
        *guard = Some(info.clone());
        Ok(info)
    }

    #[instrument(skip(self), fields(host = %self.config.host, user = %self.config.user))]
    async fn run_signon(&self) -> Result<SignonInfo> {
        self.metrics.signon_attempt();
        let _timer = Timer::start("signon");
        let result = async {
            let stream = self.locator.connect(&self.config.host, &SIGNON).await?;
            self.metrics.connection_established();
            let mut channel = self.channel(stream, &SIGNON);
            let result = handshake::signon(&mut channel, &self.config.user, &self.password).await;
            // The sign-on socket never outlives the exchange.
            if let Err(e) = channel.close().await {
                debug!(error = %e, "Sign-on socket close failed");
            }
            self.metrics.connections_closed(1);
            result
        }
        .await;

        match &result {
            Ok(info) => info!(
                server_ccsid = info.server_ccsid,
                password_level = info.password_level.0,
                "Signed on"
            ),
            Err(e) => {
                self.metrics.signon_failed();
                self.metrics.record_error(e);
                error!(error = %e, "Sign-on failed");
            }
        }
        result
    }

    fn channel(&self, stream: BoxedStream, service: &ServiceDescriptor) -> Channel {
        Channel::new(
            stream,
            format!("{}/{}", self.config.host, service.name),
            self.config.connection.max_packet_size,
            self.metrics.clone(),
        )
    }

    /// Close and forget the connection cached under `correlation_id`.
    pub async fn disconnect(&self, correlation_id: u32) -> Result<bool> {
        let Some(conn) = self.cache.remove(correlation_id).await else {
            return Ok(false);
        };
        self.metrics.connections_closed(1);
        conn.close().await?;
        Ok(true)
    }

    /// Close every cached connection.
    pub async fn disconnect_all(&self) -> usize {
        let closed = self.cache.close_all().await;
        self.metrics.connections_closed(closed as u64);
        debug!(closed, "All connections closed");
        self.metrics.log_metrics();
        closed
    }
}

impl std::fmt::Debug for HostSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostSystem")
            .field("host", &self.config.host)
            .field("user", &self.config.user)
            .finish_non_exhaustive()
    }
}

fn validate_credentials(config: &HostConfig) -> Result<()> {
    if config.host.trim().is_empty() {
        return Err(ProtocolError::InvalidInput(constants::ERR_HOST_NAME_EMPTY.into()));
    }
    if config.user.trim().is_empty() {
        return Err(ProtocolError::InvalidInput(constants::ERR_USER_ID_EMPTY.into()));
    }
    if config.user.chars().count() > MAX_CREDENTIAL_CHARS {
        return Err(ProtocolError::InvalidInput(constants::ERR_USER_ID_TOO_LONG.into()));
    }
    if config.password.is_empty() {
        return Err(ProtocolError::InvalidInput(constants::ERR_PASSWORD_EMPTY.into()));
    }
    Ok(())
}
