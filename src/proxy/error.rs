//! PROXY Protocol Errors
//!
//! The codec surfaces exactly two failure kinds. A buffer that simply is not a
//! PROXY header is not an error; see [`Decoded::NoMatch`](super::Decoded).

/// Errors that can occur while encoding or decoding a PROXY header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyError {
    /// Malformed or unrecognized protocol data (unknown tag byte, address
    /// that does not parse for its family, missing required field)
    InvalidProtocol(String),
    /// Recognized by the protocol but not implemented here (Unix sockets)
    UnsupportedProtocol(String),
}

impl ProxyError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        ProxyError::InvalidProtocol(msg.into())
    }

    pub(crate) fn unix_unsupported() -> Self {
        ProxyError::UnsupportedProtocol("unix socket addresses are not supported".to_string())
    }

    /// True for [`ProxyError::InvalidProtocol`]
    pub fn is_invalid(&self) -> bool {
        matches!(self, ProxyError::InvalidProtocol(_))
    }

    /// True for [`ProxyError::UnsupportedProtocol`]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, ProxyError::UnsupportedProtocol(_))
    }
}

impl std::fmt::Display for ProxyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProxyError::InvalidProtocol(msg) => write!(f, "invalid PROXY protocol: {}", msg),
            ProxyError::UnsupportedProtocol(msg) => {
                write!(f, "unsupported PROXY protocol: {}", msg)
            }
        }
    }
}

impl std::error::Error for ProxyError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            ProxyError::invalid("unknown address family: 0x44").to_string(),
            "invalid PROXY protocol: unknown address family: 0x44"
        );
        assert_eq!(
            ProxyError::unix_unsupported().to_string(),
            "unsupported PROXY protocol: unix socket addresses are not supported"
        );
    }

    #[test]
    fn test_kinds_are_distinct() {
        let invalid = ProxyError::invalid("x");
        let unsupported = ProxyError::unix_unsupported();

        assert!(invalid.is_invalid() && !invalid.is_unsupported());
        assert!(unsupported.is_unsupported() && !unsupported.is_invalid());
        assert_ne!(invalid, unsupported);
    }

    #[test]
    fn test_is_std_error() {
        let err: Box<dyn std::error::Error> = Box::new(ProxyError::invalid("bad"));
        assert!(err.to_string().contains("bad"));
    }
}
