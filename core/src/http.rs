//! Request and response descriptors exchanged with a `Transport`.
//!
//! # Design
//! `HttpRequest` describes a call as plain data: the client builds it, the
//! transport executes it. Multipart bodies are kept as a list of parts and
//! only encoded by the transport, so request construction stays
//! deterministic and can be asserted on in tests.
//!
//! `HttpResponse` carries its body as a reader rather than a buffered
//! string. Query operations decode JSON straight from it; downloads copy it
//! to disk in fixed-size chunks without holding the artifact in memory.

use std::fmt;
use std::io::{Cursor, Read};

/// HTTP method for a request. The remote API only uses these two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// One field of a `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        content: Vec<u8>,
    },
}

impl FormPart {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        FormPart::Text {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FormPart::Text { name, .. } | FormPart::File { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    Multipart(Vec<FormPart>),
}

/// An HTTP request described as plain data.
///
/// Built by `CuckooClient` and consumed within a single method call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub body: Option<RequestBody>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            body: None,
        }
    }

    pub fn post_multipart(url: impl Into<String>, parts: Vec<FormPart>) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            body: Some(RequestBody::Multipart(parts)),
        }
    }

    /// Parts of the multipart body, empty for bodiless requests.
    pub fn form_parts(&self) -> &[FormPart] {
        match &self.body {
            Some(RequestBody::Multipart(parts)) => parts,
            None => &[],
        }
    }
}

/// An HTTP response with a streaming body.
pub struct HttpResponse {
    pub status: u16,
    pub body: Box<dyn Read + Send>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Read + Send + 'static) -> Self {
        Self {
            status,
            body: Box::new(body),
        }
    }

    /// Response backed by an in-memory body.
    pub fn from_bytes(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self::new(status, Cursor::new(body.into()))
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}
