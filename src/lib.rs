//! HAProxy PROXY protocol header codec.
//!
//! ```
//! use proxy_header::{create_forward, decode_v2, ProxyHeader};
//!
//! let header = create_forward("192.168.0.1", 56324, "192.168.0.11", 443);
//! let mut wire = header.encode().unwrap().to_vec();
//! wire.extend_from_slice(b"payload");
//!
//! let (decoded, rest) = decode_v2(&wire).unwrap().into_parts().unwrap();
//! assert_eq!(decoded.source_port(), Some(56324));
//! assert_eq!(&rest[..], b"payload");
//! ```

pub mod config;
pub mod proxy;

pub use crate::config::{ProxyProtocolConfig, UnknownFamilyPolicy};
pub use crate::proxy::*;
