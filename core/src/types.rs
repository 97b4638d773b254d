//! Value types shared by the client's public surface.

use std::collections::BTreeMap;

/// Decoded JSON object returned by query operations.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Extra submission-form fields (timeout, package, options, ...) passed
/// through verbatim to the create endpoints.
pub type FormFields = BTreeMap<String, String>;

/// The only report format the client decodes.
pub const REPORT_FORMAT_JSON: &str = "json";

/// Digest kinds accepted by the file lookup endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashType {
    Md5,
    Sha1,
    Sha256,
}

impl HashType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "md5" => Some(HashType::Md5),
            "sha1" => Some(HashType::Sha1),
            "sha256" => Some(HashType::Sha256),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HashType::Md5 => "md5",
            HashType::Sha1 => "sha1",
            HashType::Sha256 => "sha256",
        }
    }
}
