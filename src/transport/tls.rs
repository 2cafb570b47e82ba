//! # TLS Transport Layer
//!
//! Client-side TLS for service sockets. Host server TLS ports present
//! certificates issued by the host's certificate store; those are verified
//! against the platform trust store loaded through `rustls-native-certs`.
//!
//! ## Responsibilities
//! - Build a `rustls` client configuration
//! - Wrap an established TCP stream in a TLS session

use std::sync::Arc;

use rustls::{Certificate, ClientConfig, RootCertStore, ServerName};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, instrument, warn};

use crate::error::{ProtocolError, Result};

/// TLS Client Configuration
#[derive(Debug, Clone)]
pub struct TlsClientConfig {
    server_name: String,
    insecure: bool,
}

impl TlsClientConfig {
    /// Create a new TLS client configuration
    pub fn new<S: Into<String>>(server_name: S) -> Self {
        Self {
            server_name: server_name.into(),
            insecure: false,
        }
    }

    /// Allow insecure connections (skip certificate verification)
    ///
    /// # WARNING: Security Risk
    /// Only for test hosts with self-signed certificates.
    pub fn insecure(mut self) -> Self {
        warn!("INSECURE MODE ENABLED: Certificate verification is disabled. This should only be used for development/testing.");
        self.insecure = true;
        self
    }

    pub fn is_insecure(&self) -> bool {
        self.insecure
    }

    /// Load the TLS client configuration
    pub fn load_client_config(&self) -> Result<ClientConfig> {
        let builder = ClientConfig::builder().with_safe_defaults();

        if self.insecure {
            struct AcceptAnyServerCert;

            impl rustls::client::ServerCertVerifier for AcceptAnyServerCert {
                fn verify_server_cert(
                    &self,
                    _end_entity: &Certificate,
                    _intermediates: &[Certificate],
                    _server_name: &ServerName,
                    _scts: &mut dyn Iterator<Item = &[u8]>,
                    _ocsp_response: &[u8],
                    _now: std::time::SystemTime,
                ) -> std::result::Result<rustls::client::ServerCertVerified, rustls::Error> {
                    Ok(rustls::client::ServerCertVerified::assertion())
                }
            }

            return Ok(builder
                .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert))
                .with_no_client_auth());
        }

        let mut root_store = RootCertStore::empty();
        let native_certs = rustls_native_certs::load_native_certs()
            .map_err(|e| ProtocolError::TlsError(format!("Failed to load native certs: {e}")))?;

        let mut skipped = 0usize;
        for cert in native_certs {
            // One unparsable platform certificate should not disable TLS entirely.
            if root_store.add(&Certificate(cert.0)).is_err() {
                skipped += 1;
            }
        }
        if skipped > 0 {
            debug!(skipped, "Ignored unparsable platform certificates");
        }
        if root_store.is_empty() {
            return Err(ProtocolError::TlsError(
                "No trusted root certificates available".into(),
            ));
        }

        Ok(builder
            .with_root_certificates(root_store)
            .with_no_client_auth())
    }

    /// Get the server name as a rustls::ServerName
    pub fn server_name(&self) -> Result<ServerName> {
        ServerName::try_from(self.server_name.as_str())
            .map_err(|_| ProtocolError::TlsError("Invalid server name".into()))
    }
}

/// Wrap an established TCP stream in TLS.
#[instrument(skip(config, stream), fields(server = %config.server_name))]
pub async fn connect(stream: TcpStream, config: &TlsClientConfig) -> Result<TlsStream<TcpStream>> {
    let tls_config = Arc::new(config.load_client_config()?);
    let connector = TlsConnector::from(tls_config);
    let domain = config.server_name()?;

    connector
        .connect(domain, stream)
        .await
        .map_err(|e| ProtocolError::TlsError(format!("TLS connection failed: {e}")))
}
