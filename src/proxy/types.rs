//! PROXY Protocol Domain Tags
//!
//! Closed sets of wire values: protocol version, command and the combined
//! address-family/transport byte.

use super::error::ProxyError;

/// PROXY protocol version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ProtocolVersion {
    /// Text framing
    V1 = 1,
    /// Binary framing
    V2 = 2,
}

impl ProtocolVersion {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for ProtocolVersion {
    type Error = ProxyError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ProtocolVersion::V1),
            2 => Ok(ProtocolVersion::V2),
            other => Err(ProxyError::invalid(format!("unknown protocol version: {}", other))),
        }
    }
}

/// PROXY v2 command (low nibble of byte 13)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Connection established by the proxy itself (health checks)
    Local = 0,
    /// Connection relayed on behalf of another node
    Proxy = 1,
}

impl Command {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Command {
    type Error = ProxyError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Command::Local),
            1 => Ok(Command::Proxy),
            other => Err(ProxyError::invalid(format!("unknown command: {:#x}", other))),
        }
    }
}

/// Address family (high nibble) combined with transport protocol (low nibble)
///
/// Family nibble: 1 = AF_INET, 2 = AF_INET6, 3 = AF_UNIX.
/// Transport nibble: 1 = SOCK_STREAM, 2 = SOCK_DGRAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AddressFamily {
    Unspecified = 0x00,
    Tcp4 = 0x11,
    Udp4 = 0x12,
    Tcp6 = 0x21,
    Udp6 = 0x22,
    UnixStream = 0x31,
    UnixDgram = 0x32,
}

/// Symbolic name of every family, in wire order
const FAMILY_NAMES: [(AddressFamily, &str); 7] = [
    (AddressFamily::Unspecified, "UNSPECIFIED"),
    (AddressFamily::Tcp4, "TCP4"),
    (AddressFamily::Udp4, "UDP4"),
    (AddressFamily::Tcp6, "TCP6"),
    (AddressFamily::Udp6, "UDP6"),
    (AddressFamily::UnixStream, "UNIX_STREAM"),
    (AddressFamily::UnixDgram, "UNIX_DGRAM"),
];

impl AddressFamily {
    /// All families, in wire order
    pub const ALL: [AddressFamily; 7] = [
        AddressFamily::Unspecified,
        AddressFamily::Tcp4,
        AddressFamily::Udp4,
        AddressFamily::Tcp6,
        AddressFamily::Udp6,
        AddressFamily::UnixStream,
        AddressFamily::UnixDgram,
    ];

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Symbolic name, e.g. `"TCP4"`
    pub fn name(self) -> &'static str {
        match self {
            AddressFamily::Unspecified => "UNSPECIFIED",
            AddressFamily::Tcp4 => "TCP4",
            AddressFamily::Udp4 => "UDP4",
            AddressFamily::Tcp6 => "TCP6",
            AddressFamily::Udp6 => "UDP6",
            AddressFamily::UnixStream => "UNIX_STREAM",
            AddressFamily::UnixDgram => "UNIX_DGRAM",
        }
    }

    /// Reverse of [`AddressFamily::name`]
    pub fn from_name(name: &str) -> Option<Self> {
        FAMILY_NAMES
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(family, _)| *family)
    }

    pub fn is_ipv4(self) -> bool {
        matches!(self, AddressFamily::Tcp4 | AddressFamily::Udp4)
    }

    pub fn is_ipv6(self) -> bool {
        matches!(self, AddressFamily::Tcp6 | AddressFamily::Udp6)
    }

    pub fn is_ip(self) -> bool {
        self.is_ipv4() || self.is_ipv6()
    }

    pub fn is_unix(self) -> bool {
        matches!(self, AddressFamily::UnixStream | AddressFamily::UnixDgram)
    }
}

impl TryFrom<u8> for AddressFamily {
    type Error = ProxyError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        AddressFamily::ALL
            .into_iter()
            .find(|family| family.as_u8() == value)
            .ok_or_else(|| ProxyError::invalid(format!("unknown address family: {:#04x}", value)))
    }
}

impl std::fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
