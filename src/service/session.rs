//! # Service Sessions
//!
//! A [`ServiceSession`] is one client's handle on one host service. It picks a
//! random correlation id once, gets its connection from the [`HostSystem`]
//! and runs the service's attribute exchange the first time it opens.

use crate::core::packet::Packet;
use crate::error::Result;
use crate::protocol::messages::{
    DataQueueExchangeAttributesRequest, DataQueueExchangeAttributesResponse,
    RemoteCommandExchangeAttributesRequest, RemoteCommandExchangeAttributesResponse,
};
use crate::protocol::system::HostSystem;
use crate::service::descriptor::{ServiceDescriptor, DATA_QUEUE, REMOTE_COMMAND};
use crate::transport::connection::Connection;
use async_trait::async_trait;
use bytes::BytesMut;
use std::sync::Arc;
use tracing::{debug, error, instrument};

/// What a service reported in its attribute exchange.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceAttributes {
    pub server_ccsid: Option<u32>,
    pub data_stream_level: Option<u16>,
    /// Host exchanges text as UTF-16
    pub unicode: bool,
}

/// Per-service negotiation run once on a fresh connection.
#[async_trait]
pub trait AttributeExchange: Send + Sync {
    async fn exchange(&self, connection: &Connection) -> Result<ServiceAttributes>;
}

/// Services that need no negotiation (database, sign-on).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExchange;

#[async_trait]
impl AttributeExchange for NoExchange {
    async fn exchange(&self, _connection: &Connection) -> Result<ServiceAttributes> {
        Ok(ServiceAttributes::default())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DataQueueExchange;

#[async_trait]
impl AttributeExchange for DataQueueExchange {
    async fn exchange(&self, connection: &Connection) -> Result<ServiceAttributes> {
        let mut request = DataQueueExchangeAttributesRequest::default().encode()?;
        request.set_correlation_id(connection.correlation_id());
        let frame = connection.request(request).await?;
        DataQueueExchangeAttributesResponse::decode(&frame)?;
        debug!("Data queue attributes exchanged");
        Ok(ServiceAttributes::default())
    }
}

#[derive(Debug, Clone)]
pub struct RemoteCommandExchange {
    pub ccsid: u32,
    pub nlv: String,
}

#[async_trait]
impl AttributeExchange for RemoteCommandExchange {
    async fn exchange(&self, connection: &Connection) -> Result<ServiceAttributes> {
        let mut request =
            RemoteCommandExchangeAttributesRequest::new(self.ccsid, self.nlv.as_str()).encode()?;
        request.set_correlation_id(connection.correlation_id());
        let frame = connection.request(request).await?;
        let response = RemoteCommandExchangeAttributesResponse::decode(&frame)?;
        response.check()?;
        debug!(
            ccsid = ?response.ccsid,
            ds_level = ?response.ds_level,
            "Remote command attributes exchanged"
        );
        Ok(ServiceAttributes {
            server_ccsid: response.ccsid,
            data_stream_level: response.ds_level,
            unicode: response.supports_unicode(),
        })
    }
}

/// The exchange a well-known service expects.
pub fn exchange_for(system: &HostSystem, service: &ServiceDescriptor) -> Box<dyn AttributeExchange> {
    if service.id == DATA_QUEUE.id {
        Box::new(DataQueueExchange)
    } else if service.id == REMOTE_COMMAND.id {
        Box::new(RemoteCommandExchange {
            ccsid: system.client_ccsid(),
            nlv: system.nlv().to_string(),
        })
    } else {
        Box::new(NoExchange)
    }
}

pub struct ServiceSession {
    system: Arc<HostSystem>,
    service: ServiceDescriptor,
    correlation_id: u32,
    exchange: Box<dyn AttributeExchange>,
    connection: Option<Arc<Connection>>,
    attributes: Option<ServiceAttributes>,
}

impl ServiceSession {
    pub fn new(system: Arc<HostSystem>, service: ServiceDescriptor) -> Self {
        let exchange = exchange_for(&system, &service);
        Self::with_exchange(system, service, exchange)
    }

    pub fn with_exchange(
        system: Arc<HostSystem>,
        service: ServiceDescriptor,
        exchange: Box<dyn AttributeExchange>,
    ) -> Self {
        let correlation_id = rand::random::<u32>();
        debug!(
            service = service.name,
            correlation_id, "Service session created"
        );
        ServiceSession {
            system,
            service,
            correlation_id,
            exchange,
            connection: None,
            attributes: None,
        }
    }

    pub fn correlation_id(&self) -> u32 {
        self.correlation_id
    }

    pub fn service(&self) -> &ServiceDescriptor {
        &self.service
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    /// Attributes from the exchange, once the session has opened.
    pub fn attributes(&self) -> Option<&ServiceAttributes> {
        self.attributes.as_ref()
    }

    pub fn connection(&self) -> Option<&Arc<Connection>> {
        self.connection.as_ref()
    }

    /// Get the connection and exchange attributes if that has not happened yet.
    #[instrument(skip(self), fields(service = self.service.name, correlation_id = self.correlation_id))]
    pub async fn open(&mut self) -> Result<Arc<Connection>> {
        match self.try_open().await {
            Ok(conn) => Ok(conn),
            Err(e) => {
                error!(error = %e, "Failed to open service session");
                if let Err(close_err) = self.close().await {
                    debug!(error = %close_err, "Close after failed open also failed");
                }
                Err(e)
            }
        }
    }

    async fn try_open(&mut self) -> Result<Arc<Connection>> {
        let conn = self
            .system
            .connection(&self.service, self.correlation_id)
            .await?;
        self.connection = Some(conn.clone());
        if self.attributes.is_none() {
            self.attributes = Some(self.exchange.exchange(&conn).await?);
        }
        Ok(conn)
    }

    async fn opened(&mut self) -> Result<Arc<Connection>> {
        match &self.connection {
            Some(conn) => Ok(conn.clone()),
            None => self.open().await,
        }
    }

    /// Stamp the session's correlation id on `packet` and write it.
    pub async fn send_framed_packet(&mut self, packet: &mut Packet) -> Result<()> {
        let conn = self.opened().await?;
        packet.set_correlation_id(self.correlation_id);
        conn.send(packet.clone()).await
    }

    /// Send `packet` and wait for the frame that answers it.
    pub async fn request(&mut self, packet: &mut Packet) -> Result<BytesMut> {
        let conn = self.opened().await?;
        packet.set_correlation_id(self.correlation_id);
        conn.request(packet.clone()).await
    }

    /// Close the session's connection and drop it from the system cache.
    ///
    /// Safe to call on a session that never opened.
    pub async fn close(&mut self) -> Result<()> {
        self.connection = None;
        self.attributes = None;
        self.system.disconnect(self.correlation_id).await?;
        Ok(())
    }
}

impl std::fmt::Debug for ServiceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceSession")
            .field("service", &self.service.name)
            .field("correlation_id", &self.correlation_id)
            .field("open", &self.is_open())
            .finish()
    }
}
