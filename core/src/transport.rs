//! The seam between request construction and network I/O.
//!
//! `CuckooClient` never talks to the network directly. It hands each
//! `HttpRequest` to a `Transport` and interprets the `HttpResponse` it gets
//! back. `ReqwestTransport` is the production implementation; tests swap in
//! a mock to count and inspect dispatched requests.

use reqwest::blocking::multipart::{Form, Part};
use thiserror::Error;

use crate::http::{FormPart, HttpMethod, HttpRequest, HttpResponse, RequestBody};

/// The request never produced a response (DNS, connect, TLS, I/O).
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Executes one blocking HTTP round-trip.
///
/// Implementations must return non-2xx statuses as `Ok` responses; status
/// interpretation belongs to the client.
#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Blocking `reqwest` transport. Timeouts are whatever the wrapped client
/// is configured with.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        let builder = match &request.body {
            Some(RequestBody::Multipart(parts)) => builder.multipart(multipart_form(parts)),
            None => builder,
        };

        let response = builder
            .send()
            .map_err(|e| TransportError::new(e.to_string()))?;
        let status = response.status().as_u16();
        Ok(HttpResponse::new(status, response))
    }
}

fn multipart_form(parts: &[FormPart]) -> Form {
    parts.iter().fold(Form::new(), |form, part| match part {
        FormPart::Text { name, value } => form.text(name.clone(), value.clone()),
        FormPart::File {
            name,
            file_name,
            content,
        } => form.part(
            name.clone(),
            Part::bytes(content.clone()).file_name(file_name.clone()),
        ),
    })
}
