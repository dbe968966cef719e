//! Endpoint address carried in a PROXY header.

use std::net::{IpAddr, SocketAddr};

use compact_str::{CompactString, ToCompactString};

use super::error::ProxyError;

/// IP address text plus port
///
/// The IP is kept as text and only validated when a binary encoding needs it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    ip: CompactString,
    port: u16,
}

impl Address {
    pub fn new(ip: impl Into<CompactString>, port: u16) -> Self {
        Self {
            ip: ip.into(),
            port,
        }
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Parse the IP text into a socket address
    pub fn to_socket_addr(&self) -> Result<SocketAddr, ProxyError> {
        let ip: IpAddr = self
            .ip
            .parse()
            .map_err(|_| ProxyError::invalid(format!("invalid IP address: {}", self.ip)))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        Self {
            ip: addr.ip().to_compact_string(),
            port: addr.port(),
        }
    }
}

impl TryFrom<&Address> for SocketAddr {
    type Error = ProxyError;

    fn try_from(addr: &Address) -> Result<Self, Self::Error> {
        addr.to_socket_addr()
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.ip.contains(':') {
            write!(f, "[{}]:{}", self.ip, self.port)
        } else {
            write!(f, "{}:{}", self.ip, self.port)
        }
    }
}
