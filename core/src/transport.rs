//! Network execution behind a trait seam.
//!
//! `ApiClient` never talks to the network itself; it hands a finished
//! `HttpRequest` to a `Transport`. Tests substitute a scripted transport,
//! production code uses `UreqTransport`.

use std::time::Duration;

use thiserror::Error;

use crate::config::Timeouts;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Failure to obtain any HTTP response.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("i/o error: {0}")]
    Io(String),

    #[error("{0}")]
    Other(String),
}

/// Executes one HTTP round-trip. Non-2xx statuses are responses, not errors.
pub trait Transport: Send + Sync {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request)
    }
}

/// Blocking transport backed by a `ureq` agent.
///
/// The agent is configured with `http_status_as_error(false)` so 4xx/5xx
/// responses come back as data and status interpretation stays with
/// `ApiClient`.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeouts: Timeouts) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(Duration::from_secs(timeouts.request_secs)))
            .timeout_connect(Some(Duration::from_secs(timeouts.connect_secs)))
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(Timeouts::default())
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
        } = request;

        let result = match method {
            HttpMethod::Get => with_headers(self.agent.get(&url), &headers).call(),
            HttpMethod::Delete => with_headers(self.agent.delete(&url), &headers).call(),
            HttpMethod::Post => send(with_headers(self.agent.post(&url), &headers), body),
            HttpMethod::Put => send(with_headers(self.agent.put(&url), &headers), body),
            HttpMethod::Patch => send(with_headers(self.agent.patch(&url), &headers), body),
        };
        let mut response = result.map_err(map_ureq_error)?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(map_ureq_error)?;

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn send(
    builder: ureq::RequestBuilder<ureq::typestate::WithBody>,
    body: Option<String>,
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    match body {
        Some(body) => builder.send(body.as_bytes()),
        None => builder.send_empty(),
    }
}

fn map_ureq_error(err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::Timeout(t) => TransportError::Timeout(t.to_string()),
        ureq::Error::HostNotFound | ureq::Error::ConnectionFailed => {
            TransportError::Connect(err.to_string())
        }
        ureq::Error::Io(e) => TransportError::Io(e.to_string()),
        other => TransportError::Other(other.to_string()),
    }
}
