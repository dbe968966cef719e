//! PROXY Protocol Parser
//!
//! Auto-detects and parses PROXY v1 (text) and v2 (binary) headers from an
//! in-memory buffer.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use bytes::Bytes;
use tracing::trace;

use super::error::ProxyError;
use super::header::{Decoded, Header, ProxyHeader};
use super::types::{Command, ProtocolVersion};
use super::v1::{V1Header, V1_SIGNATURE, V1_UNKNOWN};
use super::v2::{V2Header, V2_SIGNATURE};
use crate::config::ProxyProtocolConfig;

/// Information extracted from a PROXY protocol header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyInfo {
    /// Original client address (source from PROXY header).
    /// Unspecified when the header carries no addresses.
    pub client_addr: SocketAddr,

    /// Server address the client connected to (destination from PROXY header)
    pub server_addr: Option<SocketAddr>,

    /// Protocol version used (v1 or v2)
    pub version: ProtocolVersion,

    /// LOCAL for health checks from the proxy itself; always PROXY for v1
    pub command: Command,
}

impl ProxyInfo {
    /// Extract socket addresses from a decoded header
    pub fn from_header(header: &Header) -> Result<Self, ProxyError> {
        let command = match header {
            Header::V1(_) => Command::Proxy,
            Header::V2(h) => h.command(),
        };

        // v1 UNKNOWN addresses must not be interpreted
        let described = !matches!(header, Header::V1(h) if h.protocol() == Some(V1_UNKNOWN));

        let (client_addr, server_addr) = match (header.source_address(), header.target_address()) {
            (Some(source), Some(target)) if described => {
                (source.to_socket_addr()?, Some(target.to_socket_addr()?))
            }
            // UNKNOWN / UNSPECIFIED - use placeholder
            _ => (SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0), None),
        };

        Ok(ProxyInfo {
            client_addr,
            server_addr,
            version: header.version(),
            command,
        })
    }
}

/// Decode whichever header version `buf` starts with
pub fn decode_header(
    buf: &[u8],
    config: &ProxyProtocolConfig,
) -> Result<Decoded<Header>, ProxyError> {
    if buf.starts_with(&V2_SIGNATURE) {
        Ok(V2Header::decode_with(buf, config.unknown_family)?.map(Header::V2))
    } else if config.accept_v1 && buf.starts_with(V1_SIGNATURE) {
        Ok(V1Header::decode_with_limit(buf, config.max_v1_length)?.map(Header::V1))
    } else {
        trace!("no PROXY protocol signature");
        Ok(Decoded::NoMatch)
    }
}

/// Parse a PROXY protocol header from the front of `buf`
///
/// Returns the extracted addresses and the bytes following the header.
pub fn parse_proxy_header(
    buf: &[u8],
    config: &ProxyProtocolConfig,
) -> Result<Decoded<ProxyInfo>, ProxyError> {
    match decode_header(buf, config)? {
        Decoded::Match { header, remaining } => Ok(Decoded::Match {
            header: ProxyInfo::from_header(&header)?,
            remaining,
        }),
        Decoded::NoMatch => Ok(Decoded::NoMatch),
    }
}

/// Split a buffer into the PROXY info and the payload after it
///
/// Buffers without a header come back untouched as the payload.
pub fn strip_proxy_header(
    buf: Bytes,
    config: &ProxyProtocolConfig,
) -> Result<(Option<ProxyInfo>, Bytes), ProxyError> {
    match parse_proxy_header(&buf, config)? {
        Decoded::Match { header, remaining } => Ok((Some(header), remaining)),
        Decoded::NoMatch => Ok((None, buf)),
    }
}
