//! PROXY v2 (binary) codec
//!
//! ```text
//! offset  size  field
//!      0    12  signature 0D 0A 0D 0A 00 0D 0A 51 55 49 54 0A
//!     12     1  (version << 4) | command
//!     13     1  address family / transport
//!     14     2  payload length, big-endian
//!     16   len  src addr, dst addr, src port (2B), dst port (2B)
//! ```
//!
//! A decoded header is only accepted when its canonical encoding reproduces
//! the bytes it was read from.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use compact_str::{CompactString, ToCompactString};
use tracing::{debug, trace};

use super::address::Address;
use super::error::ProxyError;
use super::header::{Decoded, ProxyHeader};
use super::types::{AddressFamily, Command, ProtocolVersion};
use super::v1::put_v1;
use crate::config::UnknownFamilyPolicy;

/// PROXY v2 signature (12 bytes)
pub const V2_SIGNATURE: [u8; 12] = *b"\r\n\r\n\x00\r\nQUIT\n";

/// Signature, version/command, family and length
pub const V2_PREFIX_LEN: usize = 16;

/// Payload length (addresses + ports) per family byte
const ADDRESS_LENGTHS: [(u8, u16); 7] = [
    (0x00, 0),   // UNSPECIFIED
    (0x11, 12),  // TCP4
    (0x12, 12),  // UDP4
    (0x21, 36),  // TCP6
    (0x22, 36),  // UDP6
    (0x31, 216), // UNIX_STREAM
    (0x32, 216), // UNIX_DGRAM
];

/// Payload length for a raw family byte, `None` if the byte is not a known family
pub fn address_length(tag: u8) -> Option<u16> {
    ADDRESS_LENGTHS
        .iter()
        .find(|(t, _)| *t == tag)
        .map(|(_, len)| *len)
}

/// Total encoded size for a family: prefix plus payload
pub fn header_length(family: AddressFamily) -> usize {
    V2_PREFIX_LEN + address_length(family.as_u8()).unwrap_or(0) as usize
}

/// Byte 13: version in the high nibble, command in the low nibble
pub fn version_command(version: ProtocolVersion, command: Command) -> u8 {
    (version.as_u8() << 4) | command.as_u8()
}

/// A PROXY v2 header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V2Header {
    version: ProtocolVersion,
    command: Command,
    family: AddressFamily,
    source: Option<Address>,
    target: Option<Address>,
}

impl Default for V2Header {
    fn default() -> Self {
        Self {
            version: ProtocolVersion::V2,
            command: Command::Proxy,
            family: AddressFamily::Tcp4,
            source: None,
            target: None,
        }
    }
}

impl V2Header {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> V2HeaderBuilder {
        V2HeaderBuilder::default()
    }

    pub fn command(&self) -> Command {
        self.command
    }

    pub fn address_family(&self) -> AddressFamily {
        self.family
    }

    pub fn target_ip(&self) -> Option<&str> {
        self.target.as_ref().map(Address::ip)
    }

    pub fn target_port(&self) -> Option<u16> {
        self.target.as_ref().map(Address::port)
    }

    pub fn set_version(&mut self, version: ProtocolVersion) {
        self.version = version;
    }

    pub fn set_command(&mut self, command: Command) {
        self.command = command;
    }

    pub fn set_address_family(&mut self, family: AddressFamily) {
        self.family = family;
    }

    pub fn set_source_address(&mut self, source: Option<Address>) {
        self.source = source;
    }

    pub fn set_target_address(&mut self, target: Option<Address>) {
        self.target = target;
    }

    /// Encode using the framing of this header's version
    ///
    /// V2 produces the binary form; V1 produces the text line named after the
    /// address family.
    pub fn encode(&self) -> Result<Bytes, ProxyError> {
        match self.version {
            ProtocolVersion::V2 => encode_v2(self),
            ProtocolVersion::V1 => {
                let mut buf = BytesMut::new();
                put_v1(&mut buf, self.family, self.source.as_ref(), self.target.as_ref())?;
                Ok(buf.freeze())
            }
        }
    }

    /// Decode a v2 header from the front of `buf`, rejecting unknown families
    pub fn decode(buf: &[u8]) -> Result<Decoded<V2Header>, ProxyError> {
        Self::decode_with(buf, UnknownFamilyPolicy::Reject)
    }

    /// Decode a v2 header from the front of `buf`
    ///
    /// Returns `NoMatch` when the signature is missing, the buffer is too
    /// short, or the header does not re-encode to the observed bytes.
    pub fn decode_with(
        buf: &[u8],
        unknown_family: UnknownFamilyPolicy,
    ) -> Result<Decoded<V2Header>, ProxyError> {
        if !buf.starts_with(&V2_SIGNATURE) {
            trace!("no PROXY v2 signature");
            return Ok(Decoded::NoMatch);
        }
        if buf.len() < V2_PREFIX_LEN {
            trace!(buffered = buf.len(), "PROXY v2 prefix incomplete");
            return Ok(Decoded::NoMatch);
        }

        let version = ProtocolVersion::try_from(buf[12] >> 4)?;
        let command = Command::try_from(buf[12] & 0x0F)?;
        if version != ProtocolVersion::V2 {
            debug!(?version, "binary PROXY header with non-v2 version");
            return Ok(Decoded::NoMatch);
        }

        let tag = buf[13];
        let family = match AddressFamily::try_from(tag) {
            Ok(family) => family,
            Err(err) => match unknown_family {
                UnknownFamilyPolicy::Reject => return Err(err),
                UnknownFamilyPolicy::Unspecified => {
                    debug!(tag, "unknown PROXY v2 family, treating as UNSPECIFIED");
                    AddressFamily::Unspecified
                }
            },
        };
        if family.is_unix() {
            return Err(ProxyError::unix_unsupported());
        }

        let length = address_length(family.as_u8()).unwrap_or(0) as usize;
        let total = V2_PREFIX_LEN + length;
        if buf.len() < total {
            trace!(buffered = buf.len(), needed = total, "PROXY v2 payload incomplete");
            return Ok(Decoded::NoMatch);
        }

        let (source, target) = if family == AddressFamily::Unspecified {
            (None, None)
        } else {
            let span = length / 2 - 2;
            let mut payload = &buf[V2_PREFIX_LEN..total];

            let source_ip = decode_address(&payload[..span], family)?;
            payload.advance(span);
            let target_ip = decode_address(&payload[..span], family)?;
            payload.advance(span);
            let source_port = payload.get_u16();
            let target_port = payload.get_u16();

            (
                Some(Address::new(source_ip, source_port)),
                Some(Address::new(target_ip, target_port)),
            )
        };

        let header = V2Header {
            version,
            command,
            family,
            source,
            target,
        };

        match check_round_trip(&header, buf)? {
            RoundTrip::Canonical { consumed } => {
                trace!(consumed, family = %header.family, "PROXY v2 header accepted");
                Ok(Decoded::Match {
                    header,
                    remaining: Bytes::copy_from_slice(&buf[consumed..]),
                })
            }
            RoundTrip::Mismatch => {
                debug!(family = %header.family, "PROXY v2 header is not canonical");
                Ok(Decoded::NoMatch)
            }
        }
    }
}

impl ProxyHeader for V2Header {
    fn version(&self) -> ProtocolVersion {
        self.version
    }

    fn source_address(&self) -> Option<&Address> {
        self.source.as_ref()
    }

    fn target_address(&self) -> Option<&Address> {
        self.target.as_ref()
    }
}

/// Outcome of re-encoding a decoded header against its source bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundTrip {
    /// The buffer starts with the canonical encoding, `consumed` bytes long
    Canonical { consumed: usize },
    /// The canonical encoding differs from the buffer
    Mismatch,
}

/// Re-encode `header` and compare it with the front of `buf`
pub fn check_round_trip(header: &V2Header, buf: &[u8]) -> Result<RoundTrip, ProxyError> {
    let encoded = encode_v2(header)?;
    if buf.starts_with(&encoded) {
        Ok(RoundTrip::Canonical {
            consumed: encoded.len(),
        })
    } else {
        Ok(RoundTrip::Mismatch)
    }
}

/// Encode `header` in the binary form
pub fn encode_v2(header: &V2Header) -> Result<Bytes, ProxyError> {
    if header.version != ProtocolVersion::V2 {
        return Err(ProxyError::invalid("binary encoding requires protocol version 2"));
    }

    let family = header.family;
    if family.is_unix() {
        return Err(ProxyError::unix_unsupported());
    }
    let length = address_length(family.as_u8())
        .ok_or_else(|| ProxyError::invalid(format!("unknown address family: {}", family)))?;

    let mut buf = BytesMut::with_capacity(V2_PREFIX_LEN + length as usize);
    buf.put_slice(&V2_SIGNATURE);
    buf.put_u8(version_command(header.version, header.command));
    buf.put_u8(family.as_u8());
    buf.put_u16(length);

    if family != AddressFamily::Unspecified {
        let source = header
            .source
            .as_ref()
            .ok_or_else(|| ProxyError::invalid("v2 header is missing its source address"))?;
        let target = header
            .target
            .as_ref()
            .ok_or_else(|| ProxyError::invalid("v2 header is missing its target address"))?;

        put_address(&mut buf, source.ip(), family)?;
        put_address(&mut buf, target.ip(), family)?;
        buf.put_u16(source.port());
        buf.put_u16(target.port());
    }

    Ok(buf.freeze())
}

/// Decode a v2 header from the front of `buf`, rejecting unknown families
pub fn decode_v2(buf: &[u8]) -> Result<Decoded<V2Header>, ProxyError> {
    V2Header::decode(buf)
}

/// Ready-to-encode TCP4 PROXY header for a forwarded connection
pub fn create_forward(
    source_ip: impl Into<CompactString>,
    source_port: u16,
    target_ip: impl Into<CompactString>,
    target_port: u16,
) -> V2Header {
    create_forward_with_version(source_ip, source_port, target_ip, target_port, ProtocolVersion::V2)
}

/// Same as [`create_forward`] with an explicit protocol version
pub fn create_forward_with_version(
    source_ip: impl Into<CompactString>,
    source_port: u16,
    target_ip: impl Into<CompactString>,
    target_port: u16,
    version: ProtocolVersion,
) -> V2Header {
    V2Header {
        version,
        source: Some(Address::new(source_ip, source_port)),
        target: Some(Address::new(target_ip, target_port)),
        ..V2Header::default()
    }
}

/// Parse `ip` as the address kind `family` requires
fn parse_ip(ip: &str, family: AddressFamily) -> Result<IpAddr, ProxyError> {
    if family.is_unix() {
        return Err(ProxyError::unix_unsupported());
    }
    let parsed = if family.is_ipv4() {
        ip.parse::<Ipv4Addr>().ok().map(IpAddr::V4)
    } else if family.is_ipv6() {
        ip.parse::<Ipv6Addr>().ok().map(IpAddr::V6)
    } else {
        return Err(ProxyError::invalid(format!("family {} carries no addresses", family)));
    };
    parsed.ok_or_else(|| ProxyError::invalid(format!("invalid {} address: {}", family, ip)))
}

fn put_address(buf: &mut BytesMut, ip: &str, family: AddressFamily) -> Result<(), ProxyError> {
    match parse_ip(ip, family)? {
        IpAddr::V4(ip) => buf.put_slice(&ip.octets()),
        IpAddr::V6(ip) => buf.put_slice(&ip.octets()),
    }
    Ok(())
}

fn decode_address(raw: &[u8], family: AddressFamily) -> Result<CompactString, ProxyError> {
    let malformed = || ProxyError::invalid(format!("malformed {} address", family));
    if family.is_ipv4() {
        let octets = <[u8; 4]>::try_from(raw).map_err(|_| malformed())?;
        Ok(Ipv4Addr::from(octets).to_compact_string())
    } else if family.is_ipv6() {
        let octets = <[u8; 16]>::try_from(raw).map_err(|_| malformed())?;
        Ok(Ipv6Addr::from(octets).to_compact_string())
    } else if family.is_unix() {
        Err(ProxyError::unix_unsupported())
    } else {
        Err(ProxyError::invalid(format!("family {} carries no addresses", family)))
    }
}

/// Builds a [`V2Header`] and checks it is complete before handing it out
#[derive(Debug, Clone)]
pub struct V2HeaderBuilder {
    version: ProtocolVersion,
    command: Command,
    family: AddressFamily,
    source: Option<Address>,
    target: Option<Address>,
}

impl Default for V2HeaderBuilder {
    fn default() -> Self {
        let header = V2Header::default();
        Self {
            version: header.version,
            command: header.command,
            family: header.family,
            source: None,
            target: None,
        }
    }
}

impl V2HeaderBuilder {
    pub fn version(mut self, version: ProtocolVersion) -> Self {
        self.version = version;
        self
    }

    pub fn command(mut self, command: Command) -> Self {
        self.command = command;
        self
    }

    pub fn address_family(mut self, family: AddressFamily) -> Self {
        self.family = family;
        self
    }

    pub fn source(mut self, ip: impl Into<CompactString>, port: u16) -> Self {
        self.source = Some(Address::new(ip, port));
        self
    }

    pub fn target(mut self, ip: impl Into<CompactString>, port: u16) -> Self {
        self.target = Some(Address::new(ip, port));
        self
    }

    /// Finish the header, failing if it could not be encoded
    pub fn build(self) -> Result<V2Header, ProxyError> {
        if self.family.is_unix() {
            return Err(ProxyError::unix_unsupported());
        }

        if self.family == AddressFamily::Unspecified {
            if self.source.is_some() || self.target.is_some() {
                return Err(ProxyError::invalid("UNSPECIFIED family carries no addresses"));
            }
        } else {
            let source = self
                .source
                .as_ref()
                .ok_or_else(|| ProxyError::invalid("missing source address"))?;
            let target = self
                .target
                .as_ref()
                .ok_or_else(|| ProxyError::invalid("missing target address"))?;
            parse_ip(source.ip(), self.family)?;
            parse_ip(target.ip(), self.family)?;
        }

        Ok(V2Header {
            version: self.version,
            command: self.command,
            family: self.family,
            source: self.source,
            target: self.target,
        })
    }
}
