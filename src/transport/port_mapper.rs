//! # Service Location
//!
//! The host runs a port mapper (port 449 by default) that answers a service
//! name with the port the service listens on:
//!
//! ```text
//! client -> "as-dtaq"            (ASCII name, "-s" suffix for TLS)
//! host   -> 0x2B [port u32]      (success)
//! host   -> anything else        (unknown service)
//! ```
//!
//! Resolved ports are cached per host and service name, and the mapper socket
//! is closed once the answer is read.

use crate::config::ConnectionConfig;
use crate::error::{constants, ProtocolError, Result};
use crate::service::descriptor::ServiceDescriptor;
use crate::transport::stream::{boxed, BoxedStream};
use crate::transport::tls::{self, TlsClientConfig};
use crate::utils::timeout::with_timeout;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

/// First byte of a successful port mapper reply
pub const MAPPER_OK: u8 = 0x2B;

/// Opens sockets to host services.
#[async_trait]
pub trait ServiceLocator: Send + Sync {
    /// Open a socket to `service` on `host`.
    async fn connect(&self, host: &str, service: &ServiceDescriptor) -> Result<BoxedStream>;
}

/// Default locator backed by the host's port mapper.
pub struct PortMapper {
    port: u16,
    use_default_ports: bool,
    use_tls: bool,
    accept_invalid_certs: bool,
    connect_timeout: Duration,
    ports: Mutex<HashMap<(String, String), u16>>,
}

impl PortMapper {
    pub fn new(config: &ConnectionConfig) -> Self {
        PortMapper {
            port: config.port_mapper_port,
            use_default_ports: config.use_default_ports,
            use_tls: config.use_tls,
            accept_invalid_certs: config.accept_invalid_certs,
            connect_timeout: config.connect_timeout,
            ports: Mutex::new(HashMap::new()),
        }
    }

    /// Port of `service` on `host`, from the cache, the well-known ports or
    /// a port mapper query.
    #[instrument(skip(self, service), fields(service = service.name))]
    pub async fn resolve(&self, host: &str, service: &ServiceDescriptor) -> Result<u16> {
        let name = service.mapper_name(self.use_tls);
        let key = (host.to_string(), name.clone());
        if let Some(port) = self.ports.lock().await.get(&key).copied() {
            debug!(port, "Port found in cache");
            return Ok(port);
        }

        let port = if self.use_default_ports {
            service.port(self.use_tls)
        } else {
            self.query(host, &name).await?
        };

        debug!(port, "Port resolved");
        self.ports.lock().await.insert(key, port);
        Ok(port)
    }

    /// Previously resolved port, if any.
    pub async fn cached_port(&self, host: &str, service: &ServiceDescriptor) -> Option<u16> {
        let key = (host.to_string(), service.mapper_name(self.use_tls));
        self.ports.lock().await.get(&key).copied()
    }

    async fn query(&self, host: &str, name: &str) -> Result<u16> {
        let mut socket = self.open(host, self.port).await?;
        let result = Self::ask(&mut socket, name).await;
        if let Err(e) = socket.shutdown().await {
            debug!(error = %e, "Port mapper socket shutdown failed");
        }
        result
    }

    async fn ask(socket: &mut TcpStream, name: &str) -> Result<u16> {
        socket.write_all(name.as_bytes()).await?;
        socket.flush().await?;

        let status = match socket.read_u8().await {
            Ok(status) => status,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(ProtocolError::ConnectionClosed)
            }
            Err(e) => return Err(e.into()),
        };
        if status != MAPPER_OK {
            warn!(service = name, status, "Port mapper rejected service");
            return Err(ProtocolError::ReturnCode {
                code: u32::from(status),
                message: format!("{}: {name}", constants::ERR_UNKNOWN_SERVICE),
            });
        }

        let port = socket.read_u32().await?;
        u16::try_from(port).map_err(|_| {
            ProtocolError::TransportError(format!("Port mapper returned invalid port {port}"))
        })
    }

    async fn open(&self, host: &str, port: u16) -> Result<TcpStream> {
        debug!(host, port, "Connecting");
        let stream = with_timeout(self.connect_timeout, async {
            TcpStream::connect((host, port)).await.map_err(ProtocolError::from)
        })
        .await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

#[async_trait]
impl ServiceLocator for PortMapper {
    async fn connect(&self, host: &str, service: &ServiceDescriptor) -> Result<BoxedStream> {
        let port = self.resolve(host, service).await?;
        let stream = self.open(host, port).await?;
        if !self.use_tls {
            return Ok(boxed(stream));
        }

        let mut config = TlsClientConfig::new(host);
        if self.accept_invalid_certs {
            config = config.insecure();
        }
        Ok(boxed(tls::connect(stream, &config).await?))
    }
}

impl std::fmt::Debug for PortMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortMapper")
            .field("port", &self.port)
            .field("use_default_ports", &self.use_default_ports)
            .field("use_tls", &self.use_tls)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::descriptor::{DATA_QUEUE, REMOTE_COMMAND};
    use tokio::net::TcpListener;

    async fn mapper_host(reply: Vec<u8>) -> (u16, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 64];
            let n = socket.read(&mut buf).await.unwrap();
            socket.write_all(&reply).await.unwrap();
            String::from_utf8_lossy(&buf[..n]).into_owned()
        });
        (port, handle)
    }

    fn config(port: u16) -> ConnectionConfig {
        ConnectionConfig {
            port_mapper_port: port,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_resolve_queries_and_caches() {
        let mut reply = vec![MAPPER_OK];
        reply.extend_from_slice(&8472u32.to_be_bytes());
        let (port, host) = mapper_host(reply).await;

        let mapper = PortMapper::new(&config(port));
        assert_eq!(mapper.resolve("127.0.0.1", &DATA_QUEUE).await.unwrap(), 8472);
        assert_eq!(host.await.unwrap(), "as-dtaq");

        // Second lookup is served from the cache; the listener is gone.
        assert_eq!(mapper.resolve("127.0.0.1", &DATA_QUEUE).await.unwrap(), 8472);
        assert_eq!(mapper.cached_port("127.0.0.1", &DATA_QUEUE).await, Some(8472));
    }

    #[tokio::test]
    async fn test_unknown_service() {
        let (port, _host) = mapper_host(vec![0x2D]).await;
        let mapper = PortMapper::new(&config(port));
        let err = mapper.resolve("127.0.0.1", &REMOTE_COMMAND).await.unwrap_err();
        assert_eq!(err.return_code_value(), Some(0x2D));
        assert!(err.to_string().contains("Unknown service: as-rmtcmd"));
        assert_eq!(mapper.cached_port("127.0.0.1", &REMOTE_COMMAND).await, None);
    }

    #[tokio::test]
    async fn test_default_ports_skip_the_mapper() {
        let mapper = PortMapper::new(&ConnectionConfig {
            port_mapper_port: 1,
            use_default_ports: true,
            use_tls: true,
            ..Default::default()
        });
        assert_eq!(mapper.resolve("127.0.0.1", &DATA_QUEUE).await.unwrap(), 9472);
    }
}
