//! Connection settings for a sandbox server.

use serde::{Deserialize, Serialize};

use crate::url::ApiFlavor;

pub const DEFAULT_PROTO: &str = "http";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;

/// Where the server lives and which front end it runs.
///
/// Owned by a single `CuckooClient` and never modified after the client is
/// built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub proto: String,
    pub host: String,
    pub port: u16,
    pub flavor: ApiFlavor,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            proto: DEFAULT_PROTO.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            flavor: ApiFlavor::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(proto: &str, host: &str, port: u16, flavor: ApiFlavor) -> Self {
        Self {
            proto: proto.to_string(),
            host: host.to_string(),
            port,
            flavor,
        }
    }

    /// Read `CUCKOO_PROTO`, `CUCKOO_HOST`, `CUCKOO_PORT` and `CUCKOO_FLAVOR`,
    /// falling back to the defaults for unset or unparsable values.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            proto: get_env_or_default("CUCKOO_PROTO", &defaults.proto),
            host: get_env_or_default("CUCKOO_HOST", &defaults.host),
            port: parse_env_or_default("CUCKOO_PORT", defaults.port),
            flavor: parse_env_or_default("CUCKOO_FLAVOR", defaults.flavor),
        }
    }

    /// `proto://host:port`, without any flavor prefix.
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.proto, self.host, self.port)
    }

    /// Absolute URL for an action path under the configured flavor.
    pub fn url_for(&self, action: &str) -> String {
        self.flavor.build(&self.base_url(), action)
    }
}

fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env_or_default<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|e| {
            tracing::warn!(key, value = %raw, error = %e, "ignoring invalid environment value");
            default
        }),
        Err(_) => default,
    }
}
