//! Well-known host services.

use std::fmt;

/// Identity and well-known ports of one host service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceDescriptor {
    /// Name registered with the port mapper
    pub name: &'static str,
    /// Service id carried in every packet header
    pub id: u16,
    pub default_port: u16,
    pub default_tls_port: u16,
}

impl ServiceDescriptor {
    /// Name to ask the port mapper for.
    pub fn mapper_name(&self, tls: bool) -> String {
        if tls {
            format!("{}-s", self.name)
        } else {
            self.name.to_string()
        }
    }

    /// Well-known port for plain or TLS sockets.
    pub fn port(&self, tls: bool) -> u16 {
        if tls {
            self.default_tls_port
        } else {
            self.default_port
        }
    }

    /// The sign-on service authenticates itself; every other service needs
    /// the seed exchange and start server steps.
    pub fn is_signon(&self) -> bool {
        self.id == SIGNON.id
    }
}

impl fmt::Display for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#06x})", self.name, self.id)
    }
}

pub const SIGNON: ServiceDescriptor = ServiceDescriptor {
    name: "as-signon",
    id: 0xE009,
    default_port: 8476,
    default_tls_port: 9476,
};

pub const DATA_QUEUE: ServiceDescriptor = ServiceDescriptor {
    name: "as-dtaq",
    id: 0xE007,
    default_port: 8472,
    default_tls_port: 9472,
};

pub const REMOTE_COMMAND: ServiceDescriptor = ServiceDescriptor {
    name: "as-rmtcmd",
    id: 0xE008,
    default_port: 8475,
    default_tls_port: 9475,
};

pub const DATABASE: ServiceDescriptor = ServiceDescriptor {
    name: "as-database",
    id: 0xE004,
    default_port: 8471,
    default_tls_port: 9471,
};
