//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! Requests and responses are plain data. `ApiClient` builds an `HttpRequest`
//! and parses an `HttpResponse`; a `Transport` executes the round-trip in
//! between. Bodies are resolved once, at build time, from the tagged
//! `RequestBody` so no later stage has to sniff the payload type.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;

pub const AUTHORIZATION: &str = "authorization";
pub const CONTENT_TYPE: &str = "content-type";
pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// An HTTP request described as plain data, ready for a `Transport`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// An HTTP response described as plain data.
///
/// `status_text` is the reason phrase; transports that cannot supply one
/// leave it empty.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// True when the declared content type is `application/json` or any
    /// `+json` subtype.
    pub fn is_json(&self) -> bool {
        self.header(CONTENT_TYPE).is_some_and(is_json_content_type)
    }
}

pub fn is_json_content_type(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    content_type.contains(JSON_CONTENT_TYPE) || content_type.contains("+json")
}

/// Case-insensitive header lookup. Returns the first match.
pub fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Payload of an outgoing request.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    /// Structured value, serialized to JSON at build time.
    Json(Value),
    /// Form fields, url-encoded. Never receives the JSON content type.
    Form(Vec<(String, String)>),
    /// Sent verbatim.
    Text(String),
    #[default]
    Empty,
}

impl RequestBody {
    /// Convert any serializable value into a `Json` body.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, ApiError> {
        serde_json::to_value(value)
            .map(RequestBody::Json)
            .map_err(|e| ApiError::Serialization(e.to_string()))
    }
}

/// Caller-supplied request shape for one logical call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub method: HttpMethod,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl RequestOptions {
    pub fn new(method: HttpMethod) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn get() -> Self {
        Self::new(HttpMethod::Get)
    }

    pub fn post() -> Self {
        Self::new(HttpMethod::Post)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Attach a serializable value as a JSON body.
    pub fn json<T: Serialize>(self, value: &T) -> Result<Self, ApiError> {
        Ok(self.body(RequestBody::json(value)?))
    }
}

/// Decoded success payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    Json(Value),
    Text(String),
    /// `204 No Content`.
    Empty,
}

impl ApiResponse {
    /// Deserialize the payload into a typed value. `Empty` decodes as JSON
    /// `null`, and `Text` as a JSON string.
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        let value = match self {
            ApiResponse::Json(value) => value,
            ApiResponse::Text(text) => Value::String(text),
            ApiResponse::Empty => Value::Null,
        };
        serde_json::from_value(value).map_err(|e| ApiError::Deserialization(e.to_string()))
    }
}
