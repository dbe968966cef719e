//! PROXY Protocol Module
//!
//! Encodes and decodes HAProxy PROXY protocol v1 (text) and v2 (binary)
//! headers. Decoders accept a header only when re-encoding it reproduces the
//! observed bytes, and report `Decoded::NoMatch` rather than an error when a
//! buffer is simply not a header.

mod address;
mod error;
mod header;
mod parser;
mod types;
mod v1;
mod v2;

pub use address::Address;
pub use error::ProxyError;
pub use header::{Decoded, Header, ProxyHeader};
pub use parser::{decode_header, parse_proxy_header, strip_proxy_header, ProxyInfo};
pub use types::{AddressFamily, Command, ProtocolVersion};
pub use v1::{encode_v1, V1Header, V1_MAX_LENGTH, V1_SIGNATURE, V1_UNKNOWN};
pub use v2::{
    address_length, check_round_trip, create_forward, create_forward_with_version, decode_v2,
    encode_v2, header_length, version_command, RoundTrip, V2Header, V2HeaderBuilder,
    V2_PREFIX_LEN, V2_SIGNATURE,
};
