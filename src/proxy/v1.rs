//! PROXY v1 (text) codec
//!
//! ```text
//! PROXY <family> <src-ip> <dst-ip> <src-port> <dst-port>\r\n
//! PROXY TCP4 192.168.0.1 192.168.0.11 56324 443\r\n
//! ```

use std::net::{Ipv4Addr, Ipv6Addr};

use bytes::{BufMut, Bytes, BytesMut};
use compact_str::CompactString;
use tracing::{debug, trace};

use super::address::Address;
use super::error::ProxyError;
use super::header::{Decoded, ProxyHeader};
use super::types::{AddressFamily, ProtocolVersion};

/// PROXY v1 signature: "PROXY "
pub const V1_SIGNATURE: &[u8] = b"PROXY ";

/// Family token used when the proxy cannot describe the connection
pub const V1_UNKNOWN: &str = "UNKNOWN";

/// Longest v1 line allowed by HAProxy, CRLF included
pub const V1_MAX_LENGTH: usize = 107;

const CRLF: &[u8] = b"\r\n";

/// Assemble a v1 header line
///
/// Returns empty bytes when the family, source or target is missing: the
/// header is not ready to send yet.
pub fn encode_v1(
    family: Option<&str>,
    source: Option<&Address>,
    target: Option<&Address>,
) -> Bytes {
    let (Some(family), Some(source), Some(target)) = (family, source, target) else {
        return Bytes::new();
    };

    let line = format!(
        "PROXY {} {} {} {} {}\r\n",
        family,
        source.ip(),
        target.ip(),
        source.port(),
        target.port()
    );
    Bytes::from(line)
}

/// A PROXY v1 header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct V1Header {
    protocol: Option<CompactString>,
    source: Option<Address>,
    target: Option<Address>,
    /// Text between `UNKNOWN` and the CRLF, kept verbatim
    unknown_detail: CompactString,
}

impl V1Header {
    pub fn new(protocol: impl Into<CompactString>, source: Address, target: Address) -> Self {
        Self {
            protocol: Some(protocol.into()),
            source: Some(source),
            target: Some(target),
            unknown_detail: CompactString::default(),
        }
    }

    /// `PROXY UNKNOWN\r\n`
    pub fn unknown() -> Self {
        Self {
            protocol: Some(V1_UNKNOWN.into()),
            source: None,
            target: None,
            unknown_detail: CompactString::default(),
        }
    }

    /// `PROXY UNKNOWN<detail>\r\n`; `detail` is opaque to the receiver
    pub fn unknown_with_detail(detail: impl Into<CompactString>) -> Self {
        Self {
            unknown_detail: detail.into(),
            ..Self::unknown()
        }
    }

    /// Text following `UNKNOWN` on a decoded line, leading space included
    pub fn unknown_detail(&self) -> &str {
        &self.unknown_detail
    }

    pub fn protocol(&self) -> Option<&str> {
        self.protocol.as_deref()
    }

    pub fn set_protocol(&mut self, protocol: impl Into<CompactString>) {
        self.protocol = Some(protocol.into());
    }

    pub fn set_source_address(&mut self, source: Option<Address>) {
        self.source = source;
    }

    pub fn set_target_address(&mut self, target: Option<Address>) {
        self.target = target;
    }

    fn is_bare_unknown(&self) -> bool {
        self.protocol() == Some(V1_UNKNOWN) && self.source.is_none() && self.target.is_none()
    }

    /// Encode the header; empty when incomplete
    pub fn encode(&self) -> Bytes {
        if self.is_bare_unknown() {
            return Bytes::from(format!("PROXY {}{}\r\n", V1_UNKNOWN, self.unknown_detail));
        }
        encode_v1(self.protocol(), self.source.as_ref(), self.target.as_ref())
    }

    /// Encode the header, failing when a required field is missing
    pub fn try_encode(&self) -> Result<Bytes, ProxyError> {
        let encoded = self.encode();
        if encoded.is_empty() {
            let missing = if self.protocol.is_none() {
                "family"
            } else if self.source.is_none() {
                "source address"
            } else {
                "target address"
            };
            return Err(ProxyError::invalid(format!(
                "v1 header is missing its {}",
                missing
            )));
        }
        Ok(encoded)
    }

    /// Decode a v1 line from the front of `buf`
    pub fn decode(buf: &[u8]) -> Result<Decoded<V1Header>, ProxyError> {
        Self::decode_with_limit(buf, V1_MAX_LENGTH)
    }

    /// Decode a v1 line no longer than `max_length` bytes (CRLF included)
    pub fn decode_with_limit(
        buf: &[u8],
        max_length: usize,
    ) -> Result<Decoded<V1Header>, ProxyError> {
        if !buf.starts_with(V1_SIGNATURE) {
            trace!("no PROXY v1 signature");
            return Ok(Decoded::NoMatch);
        }

        let window = &buf[..buf.len().min(max_length)];
        let Some(crlf) = window.windows(2).position(|w| w == CRLF) else {
            if buf.len() >= max_length {
                return Err(ProxyError::invalid("v1 header too long"));
            }
            trace!(buffered = buf.len(), "PROXY v1 line not terminated yet");
            return Ok(Decoded::NoMatch);
        };
        let end = crlf + CRLF.len();

        let line = std::str::from_utf8(&buf[..crlf])
            .map_err(|_| ProxyError::invalid("v1 header contains invalid UTF-8"))?;
        let header = parse_line(line)?;

        if header.encode().as_ref() != &buf[..end] {
            debug!(line, "PROXY v1 line is not canonical");
            return Ok(Decoded::NoMatch);
        }

        Ok(Decoded::Match {
            header,
            remaining: Bytes::copy_from_slice(&buf[end..]),
        })
    }
}

/// Parse a v1 line with the CRLF already stripped
fn parse_line(line: &str) -> Result<V1Header, ProxyError> {
    // Everything after UNKNOWN up to the CRLF must be ignored
    if let Some(detail) = line
        .strip_prefix("PROXY ")
        .and_then(|rest| rest.strip_prefix(V1_UNKNOWN))
        .filter(|rest| rest.is_empty() || rest.starts_with(' '))
    {
        return Ok(V1Header::unknown_with_detail(detail));
    }

    let parts: Vec<&str> = line.split(' ').collect();
    let family = parts.get(1).copied().unwrap_or_default();
    if parts.len() != 6 {
        return Err(ProxyError::invalid(format!(
            "expected 6 fields in v1 header, got {}",
            parts.len()
        )));
    }

    match AddressFamily::from_name(family) {
        Some(f) if f.is_ipv4() => {
            check_ip::<Ipv4Addr>(parts[2])?;
            check_ip::<Ipv4Addr>(parts[3])?;
        }
        Some(f) if f.is_ipv6() => {
            check_ip::<Ipv6Addr>(parts[2])?;
            check_ip::<Ipv6Addr>(parts[3])?;
        }
        Some(f) if f.is_unix() => return Err(ProxyError::unix_unsupported()),
        _ => return Err(ProxyError::invalid(format!("unknown v1 family: {}", family))),
    }

    let source_port = parse_port(parts[4])?;
    let target_port = parse_port(parts[5])?;

    Ok(V1Header::new(
        family,
        Address::new(parts[2], source_port),
        Address::new(parts[3], target_port),
    ))
}

fn check_ip<T: std::str::FromStr>(ip: &str) -> Result<(), ProxyError> {
    ip.parse::<T>()
        .map(|_| ())
        .map_err(|_| ProxyError::invalid(format!("invalid IP address: {}", ip)))
}

fn parse_port(port: &str) -> Result<u16, ProxyError> {
    port.parse()
        .map_err(|_| ProxyError::invalid(format!("invalid port: {}", port)))
}

impl ProxyHeader for V1Header {
    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::V1
    }

    fn source_address(&self) -> Option<&Address> {
        self.source.as_ref()
    }

    fn target_address(&self) -> Option<&Address> {
        self.target.as_ref()
    }
}

/// Write a v1 line for `family` straight into `buf`
pub(crate) fn put_v1(
    buf: &mut BytesMut,
    family: AddressFamily,
    source: Option<&Address>,
    target: Option<&Address>,
) -> Result<(), ProxyError> {
    match family {
        AddressFamily::Unspecified => buf.put_slice(b"PROXY UNKNOWN\r\n"),
        f if f.is_unix() => return Err(ProxyError::unix_unsupported()),
        f => {
            let line = encode_v1(Some(f.name()), source, target);
            if line.is_empty() {
                return Err(ProxyError::invalid("v1 header requires source and target"));
            }
            buf.put_slice(&line);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn sample() -> V1Header {
        V1Header::new(
            "TCP4",
            Address::new("192.168.0.1", 56324),
            Address::new("192.168.0.11", 443),
        )
    }

    #[test]
    fn test_encode_literal() {
        let source = Address::new("192.168.0.1", 56324);
        let target = Address::new("192.168.0.11", 443);
        assert_eq!(
            encode_v1(Some("TCP4"), Some(&source), Some(&target)),
            Bytes::from_static(b"PROXY TCP4 192.168.0.1 192.168.0.11 56324 443\r\n")
        );
    }

    #[test]
    fn test_encode_incomplete_is_empty() {
        let target = Address::new("192.168.0.11", 443);
        assert!(encode_v1(Some("TCP4"), None, Some(&target)).is_empty());
        assert!(encode_v1(None, Some(&target), Some(&target)).is_empty());
        assert!(encode_v1(Some("TCP4"), Some(&target), None).is_empty());
        assert!(V1Header::default().encode().is_empty());
    }

    #[test]
    fn test_try_encode_names_missing_field() {
        let mut header = V1Header::default();
        header.set_protocol("TCP4");
        header.set_target_address(Some(Address::new("10.0.0.1", 80)));

        let err = header.try_encode().unwrap_err();
        assert_eq!(
            err,
            ProxyError::invalid("v1 header is missing its source address")
        );
        assert_eq!(sample().try_encode().unwrap(), sample().encode());
    }

    #[test]
    fn test_decode_with_remaining() {
        let buf = b"PROXY TCP4 192.168.0.1 192.168.0.11 56324 443\r\nGET / HTTP/1.1\r\n";
        let (header, remaining) = V1Header::decode(buf).unwrap().into_parts().unwrap();

        assert_eq!(header, sample());
        assert_eq!(header.protocol(), Some("TCP4"));
        assert_eq!(remaining, Bytes::from_static(b"GET / HTTP/1.1\r\n"));
    }

    #[test]
    fn test_decode_tcp6() {
        let buf = b"PROXY TCP6 2001:db8::1 2001:db8::2 56324 443\r\n";
        let (header, remaining) = V1Header::decode(buf).unwrap().into_parts().unwrap();

        assert_eq!(header.source_ip(), Some("2001:db8::1"));
        assert_eq!(header.target_address(), Some(&Address::new("2001:db8::2", 443)));
        assert!(remaining.is_empty());
    }

    #[test]
    fn test_decode_unknown() {
        let (header, _) = V1Header::decode(b"PROXY UNKNOWN\r\n")
            .unwrap()
            .into_parts()
            .unwrap();
        assert_eq!(header, V1Header::unknown());
        assert_eq!(header.encode(), Bytes::from_static(b"PROXY UNKNOWN\r\n"));

        let line = b"PROXY UNKNOWN ffff::1 ffff::2 65535 65535\r\n";
        let (header, _) = V1Header::decode(line).unwrap().into_parts().unwrap();
        assert_eq!(header.protocol(), Some(V1_UNKNOWN));
        assert_eq!(header.source_address(), None);
        assert_eq!(header.encode(), Bytes::from_static(line));
    }

    #[test_case(b"PROXY UNKNOWN  \r\n", "  "; "trailing spaces")]
    #[test_case(b"PROXY UNKNOWN some-text\r\n", " some-text"; "free text")]
    #[test_case(b"PROXY UNKNOWN unix-sock-info\r\n", " unix-sock-info"; "single token")]
    #[test_case(b"PROXY UNKNOWN a b c\r\n", " a b c"; "partial fields")]
    fn test_decode_unknown_ignores_rest_of_line(line: &[u8], detail: &str) {
        let mut buf = line.to_vec();
        buf.extend_from_slice(b"payload");

        let (header, remaining) = V1Header::decode(&buf).unwrap().into_parts().unwrap();
        assert_eq!(header.protocol(), Some(V1_UNKNOWN));
        assert_eq!(header.unknown_detail(), detail);
        assert!(header.source_address().is_none());
        assert_eq!(header.encode(), Bytes::copy_from_slice(line));
        assert_eq!(remaining, Bytes::from_static(b"payload"));
    }

    #[test]
    fn test_decode_unknown_prefix_is_not_a_family() {
        let err = V1Header::decode(b"PROXY UNKNOWNX 1 2 3 4\r\n").unwrap_err();
        assert!(err.is_invalid());
    }

    #[test_case(b"GET / HTTP/1.1\r\n"; "not proxy")]
    #[test_case(b"PROXY TCP4 192.168.0.1"; "not terminated")]
    #[test_case(b"PROXY TCP4 192.168.0.1 192.168.0.11 056324 443\r\n"; "leading zero port")]
    #[test_case(b"PROXY TCP4 192.168.0.1 192.168.0.11 +80 443\r\n"; "signed port")]
    fn test_decode_no_match(buf: &[u8]) {
        assert_eq!(V1Header::decode(buf).unwrap(), Decoded::NoMatch);
    }

    #[test_case(b"PROXY TCP4 192.168.0.1\r\n"; "missing fields")]
    #[test_case(b"PROXY TCP4 not.an.ip 192.168.0.11 56324 443\r\n"; "bad ip")]
    #[test_case(b"PROXY TCP4 ::1 192.168.0.11 56324 443\r\n"; "ipv6 under tcp4")]
    #[test_case(b"PROXY TCP4 192.168.0.1 192.168.0.11 notaport 443\r\n"; "bad port")]
    #[test_case(b"PROXY TCP4 192.168.0.1 192.168.0.11 70000 443\r\n"; "port out of range")]
    #[test_case(b"PROXY SCTP 192.168.0.1 192.168.0.11 1 2\r\n"; "unknown family")]
    fn test_decode_invalid(buf: &[u8]) {
        assert!(V1Header::decode(buf).unwrap_err().is_invalid());
    }

    #[test]
    fn test_decode_unix_unsupported() {
        let err = V1Header::decode(b"PROXY UNIX_STREAM /a /b 0 0\r\n").unwrap_err();
        assert!(err.is_unsupported());
    }

    #[test]
    fn test_decode_too_long() {
        let mut buf = b"PROXY TCP4 ".to_vec();
        buf.resize(V1_MAX_LENGTH + 10, b'1');
        buf.extend_from_slice(CRLF);

        assert_eq!(
            V1Header::decode(&buf).unwrap_err(),
            ProxyError::invalid("v1 header too long")
        );
    }

    #[test]
    fn test_decode_custom_limit() {
        let buf = b"PROXY TCP4 192.168.0.1 192.168.0.11 56324 443\r\n";
        assert!(V1Header::decode_with_limit(buf, 20).unwrap_err().is_invalid());
        assert!(V1Header::decode_with_limit(buf, buf.len()).unwrap().is_match());
    }

    #[test]
    fn test_put_v1_by_family() {
        let source = Address::new("10.0.0.1", 1);
        let target = Address::new("10.0.0.2", 2);

        let mut buf = BytesMut::new();
        put_v1(&mut buf, AddressFamily::Udp4, Some(&source), Some(&target)).unwrap();
        assert_eq!(&buf[..], b"PROXY UDP4 10.0.0.1 10.0.0.2 1 2\r\n");

        let mut buf = BytesMut::new();
        put_v1(&mut buf, AddressFamily::Unspecified, None, None).unwrap();
        assert_eq!(&buf[..], b"PROXY UNKNOWN\r\n");

        let err =
            put_v1(&mut BytesMut::new(), AddressFamily::UnixStream, None, None).unwrap_err();
        assert!(err.is_unsupported());

        let err =
            put_v1(&mut BytesMut::new(), AddressFamily::Tcp4, None, Some(&target)).unwrap_err();
        assert!(err.is_invalid());
    }
}
