//! Header capability contract and decode outcome.

use bytes::Bytes;

use super::address::Address;
use super::types::ProtocolVersion;
use super::v1::V1Header;
use super::v2::V2Header;

/// Operations every PROXY header representation exposes
pub trait ProxyHeader {
    fn version(&self) -> ProtocolVersion;

    fn source_address(&self) -> Option<&Address>;

    fn target_address(&self) -> Option<&Address>;

    fn source_ip(&self) -> Option<&str> {
        self.source_address().map(Address::ip)
    }

    fn source_port(&self) -> Option<u16> {
        self.source_address().map(Address::port)
    }
}

/// A parsed header of either wire version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Header {
    V1(V1Header),
    V2(V2Header),
}

impl ProxyHeader for Header {
    fn version(&self) -> ProtocolVersion {
        match self {
            Header::V1(h) => h.version(),
            Header::V2(h) => h.version(),
        }
    }

    fn source_address(&self) -> Option<&Address> {
        match self {
            Header::V1(h) => h.source_address(),
            Header::V2(h) => h.source_address(),
        }
    }

    fn target_address(&self) -> Option<&Address> {
        match self {
            Header::V1(h) => h.target_address(),
            Header::V2(h) => h.target_address(),
        }
    }
}

impl From<V1Header> for Header {
    fn from(h: V1Header) -> Self {
        Header::V1(h)
    }
}

impl From<V2Header> for Header {
    fn from(h: V2Header) -> Self {
        Header::V2(h)
    }
}

/// Outcome of a decode that did not fail
///
/// `NoMatch` means "this buffer is not a header this codec accepts" and lets
/// the caller fall back to other handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded<T> {
    Match { header: T, remaining: Bytes },
    NoMatch,
}

impl<T> Decoded<T> {
    pub fn is_match(&self) -> bool {
        matches!(self, Decoded::Match { .. })
    }

    /// Header and remaining bytes, if matched
    pub fn into_parts(self) -> Option<(T, Bytes)> {
        match self {
            Decoded::Match { header, remaining } => Some((header, remaining)),
            Decoded::NoMatch => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Decoded<U> {
        match self {
            Decoded::Match { header, remaining } => Decoded::Match {
                header: f(header),
                remaining,
            },
            Decoded::NoMatch => Decoded::NoMatch,
        }
    }
}
