//! Blocking client for the Cuckoo malware sandbox REST API.
//!
//! # Overview
//! Submits files and URLs for analysis, inspects tasks and machines, fetches
//! JSON reports and downloads artifacts (screenshots, samples, pcaps, memory
//! dumps). Both server front ends are supported: the Django web interface
//! and the standalone `api.py` script.
//!
//! # Design
//! - `CuckooClient` holds an immutable `ClientConfig`; it is safe to keep
//!   several clients for different servers side by side.
//! - Each method issues at most one request. Invalid arguments and
//!   operations the selected flavor does not serve fail before dispatch.
//! - Requests are built as plain data (`HttpRequest`) and executed through
//!   the `Transport` trait, with `ReqwestTransport` as the default.
//! - Every failure is an `ApiError` variant returned to the caller; nothing
//!   is retried or swallowed.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod transport;
pub mod types;
pub mod url;

pub use client::{CuckooClient, DOWNLOAD_CHUNK_SIZE};
pub use config::ClientConfig;
pub use error::ApiError;
pub use http::{FormPart, HttpMethod, HttpRequest, HttpResponse, RequestBody};
pub use transport::{ReqwestTransport, Transport, TransportError};
pub use types::{FormFields, HashType, JsonMap, REPORT_FORMAT_JSON};
pub use url::{build_api_url, ApiFlavor, Operation};
