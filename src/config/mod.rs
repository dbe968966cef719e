//! Configuration types.

mod proxy;

pub use proxy::{ProxyProtocolConfig, UnknownFamilyPolicy};
