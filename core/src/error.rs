//! Error types for the sandbox API client.
//!
//! # Design
//! One closed enum covers every way a call can fail. Validation variants
//! (`InvalidFile`, `NoTaskId`, `NoVm`, `NoHash`, `FileExists`,
//! `NotAvailable`, `NotImplemented`) are produced before any request is
//! dispatched. `TaskNoDelete` and the 404 flavor of `NoTaskId` come from the
//! delete endpoint only. Every other non-200 status, and any transport
//! failure, is a `BadRequest` carrying the attempted URL.

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by `CuckooClient` operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The file to submit is missing or is not a regular file.
    #[error("invalid file {}", .path.display())]
    InvalidFile { path: PathBuf },

    #[error("task ID {task_id} not available or invalid")]
    NoTaskId { task_id: i64 },

    #[error("VM {name:?} not available or invalid")]
    NoVm { name: String },

    #[error("hash {hash:?} of type {hash_type:?} not available or invalid")]
    NoHash { hash: String, hash_type: String },

    /// A download destination already exists or is empty.
    #[error("{} already exists or is invalid", .path.display())]
    FileExists { path: PathBuf },

    /// The endpoint is not exposed by the configured server flavor, or the
    /// requested hash type is unsupported.
    #[error("{url} is not available on this server; is the client configured for the right API flavor?")]
    NotAvailable { url: String },

    #[error("not implemented: {url}")]
    NotImplemented { url: String },

    #[error("task ID {task_id} cannot be deleted")]
    TaskNoDelete { task_id: i64 },

    /// Non-200 status, or no response at all (`status` is `None`).
    #[error("unable to request {url} ({})", describe_status(.status))]
    BadRequest { url: String, status: Option<u16> },

    /// A 200 response whose body is not a JSON object.
    #[error("response from {url} is not a JSON object: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn describe_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!("HTTP {code}"),
        None => "no response".to_string(),
    }
}

impl ApiError {
    /// The endpoint URL involved, for errors raised at or after URL
    /// construction.
    pub fn url(&self) -> Option<&str> {
        match self {
            ApiError::NotAvailable { url }
            | ApiError::NotImplemented { url }
            | ApiError::BadRequest { url, .. }
            | ApiError::Decode { url, .. } => Some(url),
            _ => None,
        }
    }

    /// True for errors detected locally, before any request was sent.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ApiError::InvalidFile { .. }
                | ApiError::NoTaskId { .. }
                | ApiError::NoVm { .. }
                | ApiError::NoHash { .. }
                | ApiError::FileExists { .. }
                | ApiError::NotAvailable { .. }
                | ApiError::NotImplemented { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_request_message_names_url_and_status() {
        let err = ApiError::BadRequest {
            url: "http://127.0.0.1:8000/cuckoo/status".to_string(),
            status: Some(404),
        };
        assert_eq!(
            err.to_string(),
            "unable to request http://127.0.0.1:8000/cuckoo/status (HTTP 404)"
        );
        assert_eq!(err.url(), Some("http://127.0.0.1:8000/cuckoo/status"));
    }

    #[test]
    fn unreachable_host_has_no_status() {
        let err = ApiError::BadRequest {
            url: "http://10.0.0.1:8000/machines/list".to_string(),
            status: None,
        };
        assert!(err.to_string().ends_with("(no response)"));
        assert!(!err.is_validation());
    }

    #[test]
    fn task_errors_render_the_id() {
        assert_eq!(
            ApiError::NoTaskId { task_id: -3 }.to_string(),
            "task ID -3 not available or invalid"
        );
        assert_eq!(
            ApiError::TaskNoDelete { task_id: 9 }.to_string(),
            "task ID 9 cannot be deleted"
        );
    }

    #[test]
    fn validation_errors_carry_no_url_unless_built() {
        let err = ApiError::FileExists {
            path: PathBuf::from("/tmp/report.pcap"),
        };
        assert!(err.is_validation());
        assert_eq!(err.url(), None);
        assert_eq!(err.to_string(), "/tmp/report.pcap already exists or is invalid");
    }
}
