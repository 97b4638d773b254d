//! Endpoint URL construction for the two backend flavors.
//!
//! # Design
//! The sandbox ships two incompatible HTTP front ends. The Django web
//! interface mounts its REST API under `/api` and expects a trailing slash;
//! the standalone `api.py` script serves the bare action path. `ApiFlavor`
//! captures that difference once, together with the table of operations
//! each front end exposes, so the client never branches on a boolean.
//!
//! Path segments are interpolated verbatim. Callers pass task IDs, hashes
//! and machine names that are already URL-safe.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which backend front end the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiFlavor {
    /// Django web interface: `proto://host:port/api<action>/`.
    #[default]
    WebInterface,
    /// `api.py` script: `proto://host:port<action>`.
    Script,
}

/// Remote operations whose availability differs between flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    TaskStatus,
    TaskIocs,
    TaskSearch,
    DroppedDownload,
    SurifilesDownload,
    FullMemoryDownload,
    ProcMemoryDownload,
}

impl ApiFlavor {
    /// Join `base` (`proto://host:port`) and an action path.
    pub fn build(self, base: &str, action: &str) -> String {
        match self {
            ApiFlavor::WebInterface => format!("{base}/api{action}/"),
            ApiFlavor::Script => format!("{base}{action}"),
        }
    }

    pub fn supports(self, operation: Operation) -> bool {
        match self {
            ApiFlavor::WebInterface => true,
            // api.py only knows the basic task, machine and file endpoints.
            ApiFlavor::Script => !matches!(
                operation,
                Operation::TaskStatus
                    | Operation::TaskIocs
                    | Operation::TaskSearch
                    | Operation::DroppedDownload
                    | Operation::SurifilesDownload
                    | Operation::FullMemoryDownload
                    | Operation::ProcMemoryDownload
            ),
        }
    }

    /// Extension appended to screenshot and sample archives.
    pub fn archive_extension(self) -> &'static str {
        match self {
            ApiFlavor::WebInterface => ".tar.bz",
            ApiFlavor::Script => ".zip",
        }
    }
}

impl fmt::Display for ApiFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiFlavor::WebInterface => f.write_str("web"),
            ApiFlavor::Script => f.write_str("script"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown API flavor {0:?} (expected \"web\" or \"script\")")]
pub struct UnknownFlavor(pub String);

impl FromStr for ApiFlavor {
    type Err = UnknownFlavor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "web" | "web_interface" | "django" => Ok(ApiFlavor::WebInterface),
            "script" | "api.py" | "apipy" => Ok(ApiFlavor::Script),
            _ => Err(UnknownFlavor(s.to_string())),
        }
    }
}

/// Build an absolute endpoint URL, or `None` when there is no action.
pub fn build_api_url(
    proto: &str,
    host: &str,
    port: u16,
    action: Option<&str>,
    flavor: ApiFlavor,
) -> Option<String> {
    let action = action?;
    Some(flavor.build(&format!("{proto}://{host}:{port}"), action))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn web_interface_prefixes_api_and_appends_slash() {
        let url = build_api_url("http", "127.0.0.1", 8000, Some("/cuckoo/status"), ApiFlavor::WebInterface);
        assert_eq!(url.as_deref(), Some("http://127.0.0.1:8000/api/cuckoo/status/"));
    }

    #[test]
    fn script_uses_bare_action() {
        let url = build_api_url("http", "127.0.0.1", 8000, Some("/cuckoo/status"), ApiFlavor::Script);
        assert_eq!(url.as_deref(), Some("http://127.0.0.1:8000/cuckoo/status"));
    }

    #[test]
    fn missing_action_builds_nothing() {
        assert_eq!(build_api_url("https", "sandbox", 443, None, ApiFlavor::Script), None);
        assert_eq!(build_api_url("https", "sandbox", 443, None, ApiFlavor::WebInterface), None);
    }

    #[test]
    fn script_flavor_lacks_web_only_operations() {
        let web_only = [
            Operation::TaskStatus,
            Operation::TaskIocs,
            Operation::TaskSearch,
            Operation::DroppedDownload,
            Operation::SurifilesDownload,
            Operation::FullMemoryDownload,
            Operation::ProcMemoryDownload,
        ];
        for op in web_only {
            assert!(ApiFlavor::WebInterface.supports(op), "{op:?}");
            assert!(!ApiFlavor::Script.supports(op), "{op:?}");
        }
    }

    #[test]
    fn archive_extension_depends_on_flavor() {
        assert_eq!(ApiFlavor::Script.archive_extension(), ".zip");
        assert_eq!(ApiFlavor::WebInterface.archive_extension(), ".tar.bz");
    }

    #[test]
    fn flavor_parses_from_common_names() {
        assert_eq!("web".parse::<ApiFlavor>(), Ok(ApiFlavor::WebInterface));
        assert_eq!("Django".parse::<ApiFlavor>(), Ok(ApiFlavor::WebInterface));
        assert_eq!("script".parse::<ApiFlavor>(), Ok(ApiFlavor::Script));
        assert_eq!("api.py".parse::<ApiFlavor>(), Ok(ApiFlavor::Script));
        assert!("grpc".parse::<ApiFlavor>().is_err());
    }
}
