//! PROXY Protocol Configuration
//!
//! Decode policy for the PROXY v1/v2 codec.

use std::path::Path;

use serde::Deserialize;

use crate::proxy::V1_MAX_LENGTH;

/// How the v2 decoder treats a family byte outside the known set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownFamilyPolicy {
    /// Fail with an invalid-protocol error
    #[default]
    Reject,
    /// Treat the header as UNSPECIFIED. The round-trip check then reports
    /// no match, since the canonical encoding carries 0x00.
    Unspecified,
}

/// PROXY protocol codec configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProxyProtocolConfig {
    /// Handling of unrecognized v2 address family bytes
    pub unknown_family: UnknownFamilyPolicy,

    /// Try the v1 text form when auto-detecting
    pub accept_v1: bool,

    /// Longest v1 line accepted, CRLF included.
    /// Default: 107 bytes
    pub max_v1_length: usize,
}

impl Default for ProxyProtocolConfig {
    fn default() -> Self {
        Self {
            unknown_family: UnknownFamilyPolicy::Reject,
            accept_v1: true,
            max_v1_length: V1_MAX_LENGTH,
        }
    }
}

impl ProxyProtocolConfig {
    /// Environment variable prefix for overrides, e.g. `PROXY_HEADER_ACCEPT_V1`
    pub const ENV_PREFIX: &'static str = "PROXY_HEADER";

    /// Parse from a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Load from a TOML file, then apply `PROXY_HEADER_*` environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ::config::ConfigError> {
        ::config::Config::builder()
            .add_source(::config::File::from(path.as_ref()))
            .add_source(
                ::config::Environment::with_prefix(Self::ENV_PREFIX)
                    .prefix_separator("_")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ProxyProtocolConfig::default();
        assert_eq!(config.unknown_family, UnknownFamilyPolicy::Reject);
        assert!(config.accept_v1);
        assert_eq!(config.max_v1_length, 107);
    }

    #[test]
    fn test_from_toml_partial() {
        let config =
            ProxyProtocolConfig::from_toml_str("unknown_family = \"unspecified\"").unwrap();
        assert_eq!(config.unknown_family, UnknownFamilyPolicy::Unspecified);
        assert!(config.accept_v1);

        let config =
            ProxyProtocolConfig::from_toml_str("accept_v1 = false\nmax_v1_length = 64").unwrap();
        assert!(!config.accept_v1);
        assert_eq!(config.max_v1_length, 64);
    }

    #[test]
    fn test_from_toml_rejects_unknown_policy() {
        assert!(ProxyProtocolConfig::from_toml_str("unknown_family = \"ignore\"").is_err());
    }

    // Environment variables are process-wide, so file loading and env
    // overrides share one test.
    #[test]
    fn test_load_file_with_env_overrides() {
        let path = std::env::temp_dir().join(format!("proxy-header-{}.toml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "unknown_family = \"unspecified\"").unwrap();
        writeln!(file, "max_v1_length = 80").unwrap();
        drop(file);

        let config = ProxyProtocolConfig::load(&path).unwrap();
        assert_eq!(config.unknown_family, UnknownFamilyPolicy::Unspecified);
        assert_eq!(config.max_v1_length, 80);
        assert!(config.accept_v1);

        std::env::set_var("PROXY_HEADER_ACCEPT_V1", "false");
        std::env::set_var("PROXY_HEADER_MAX_V1_LENGTH", "64");
        std::env::set_var("PROXY_HEADER_UNKNOWN_FAMILY", "reject");
        let overridden = ProxyProtocolConfig::load(&path);
        std::env::remove_var("PROXY_HEADER_ACCEPT_V1");
        std::env::remove_var("PROXY_HEADER_MAX_V1_LENGTH");
        std::env::remove_var("PROXY_HEADER_UNKNOWN_FAMILY");
        std::fs::remove_file(&path).unwrap();

        let config = overridden.unwrap();
        assert_eq!(config.unknown_family, UnknownFamilyPolicy::Reject);
        assert_eq!(config.max_v1_length, 64);
        assert!(!config.accept_v1);
    }
}
