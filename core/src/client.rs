//! Authenticated fetch client for the riddle API.
//!
//! # Design
//! `ApiClient` keeps a split between pure request building,
//! pure response parsing, and the I/O in between:
//!
//! - `build_request` resolves the URL, attaches the bearer token from the
//!   `SessionStore` and encodes the body.
//! - `parse_response` classifies the status and decodes the body by content
//!   type.
//! - `request` runs both around one `Transport::execute`, plus at most one
//!   refresh-and-retry when the policy asks for it.
//!
//! A caller-supplied `Authorization` header always wins over the session
//! token.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::{AuthPolicyKind, BaseUrl, ClientConfig};
use crate::error::ApiError;
use crate::http::{
    find_header, ApiResponse, HttpRequest, HttpResponse, RequestBody, RequestOptions,
    AUTHORIZATION, CONTENT_TYPE, FORM_CONTENT_TYPE, JSON_CONTENT_TYPE,
};
use crate::refresh::{CredentialRefresher, EndpointRefresher};
use crate::session::SessionStore;
use crate::transport::Transport;

const SESSION_EXPIRED: &str = "session expired or invalid.";

/// Reaction to a 401 response.
#[derive(Clone, Default)]
pub enum AuthPolicy {
    /// Fail with `ApiError::Unauthorized`; no retry.
    #[default]
    Immediate,
    /// Refresh once, retry the original request once.
    RefreshOnce(Arc<dyn CredentialRefresher>),
}

impl std::fmt::Debug for AuthPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthPolicy::Immediate => f.write_str("Immediate"),
            AuthPolicy::RefreshOnce(_) => f.write_str("RefreshOnce"),
        }
    }
}

/// Authenticated client. One call issues one request, plus at most one
/// retry after a successful credential refresh.
pub struct ApiClient<T> {
    base_url: Option<BaseUrl>,
    session: SessionStore,
    transport: Arc<T>,
    auth_policy: AuthPolicy,
}

impl<T> ApiClient<T> {
    pub fn new(base_url: Option<BaseUrl>, session: SessionStore, transport: T) -> Self {
        Self {
            base_url,
            session,
            transport: Arc::new(transport),
            auth_policy: AuthPolicy::Immediate,
        }
    }

    pub fn with_auth_policy(mut self, policy: AuthPolicy) -> Self {
        self.auth_policy = policy;
        self
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn base_url(&self) -> Option<&BaseUrl> {
        self.base_url.as_ref()
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn auth_policy(&self) -> &AuthPolicy {
        &self.auth_policy
    }

    /// Absolute targets (`http://`, `https://`, `//`) pass through; anything
    /// else is joined to the base URL, or left untouched without one.
    pub fn resolve_url(&self, target: &str) -> String {
        if is_absolute(target) {
            return target.to_string();
        }
        match &self.base_url {
            Some(base) => base.join(target),
            None => target.to_string(),
        }
    }

    pub fn build_request(
        &self,
        target: &str,
        options: &RequestOptions,
    ) -> Result<HttpRequest, ApiError> {
        let mut headers = options.headers.clone();

        if find_header(&headers, AUTHORIZATION).is_none() {
            if let Some(token) = self.session.token() {
                headers.push((AUTHORIZATION.to_string(), format!("Bearer {token}")));
            }
        }

        let body = match &options.body {
            RequestBody::Json(value) => {
                set_default_content_type(&mut headers, JSON_CONTENT_TYPE);
                Some(
                    serde_json::to_string(value)
                        .map_err(|e| ApiError::Serialization(e.to_string()))?,
                )
            }
            RequestBody::Form(fields) => {
                set_default_content_type(&mut headers, FORM_CONTENT_TYPE);
                Some(
                    url::form_urlencoded::Serializer::new(String::new())
                        .extend_pairs(fields)
                        .finish(),
                )
            }
            RequestBody::Text(text) => Some(text.clone()),
            RequestBody::Empty => None,
        };

        Ok(HttpRequest {
            method: options.method,
            url: self.resolve_url(target),
            headers,
            body,
        })
    }

    pub fn parse_response(&self, response: HttpResponse) -> Result<ApiResponse, ApiError> {
        if response.status == 401 {
            return Err(ApiError::Unauthorized(SESSION_EXPIRED.into()));
        }

        let is_json = response.is_json();

        if !response.is_success() {
            let body = if is_json {
                serde_json::from_str(&response.body).ok()
            } else {
                Some(Value::String(response.body))
            };
            let status_text = if response.status_text.is_empty() {
                "Unknown error"
            } else {
                response.status_text.as_str()
            };
            return Err(ApiError::Http {
                status: response.status,
                message: format!("API error {}: {status_text}", response.status),
                body,
            });
        }

        if response.status == 204 {
            return Ok(ApiResponse::Empty);
        }
        if is_json {
            return serde_json::from_str(&response.body)
                .map(ApiResponse::Json)
                .map_err(|e| ApiError::Deserialization(e.to_string()));
        }
        Ok(ApiResponse::Text(response.body))
    }
}

impl<T: Transport + 'static> ApiClient<T> {
    /// Build a client from startup config. `AuthPolicyKind::Refresh` wires
    /// an `EndpointRefresher` sharing this client's transport.
    pub fn from_config(config: &ClientConfig, session: SessionStore, transport: T) -> Self {
        let client = Self::new(config.base_url.clone(), session, transport);
        match config.auth_policy {
            AuthPolicyKind::Immediate => client,
            AuthPolicyKind::Refresh => {
                let refresher =
                    EndpointRefresher::new(client.base_url.clone(), Arc::clone(&client.transport));
                client.with_auth_policy(AuthPolicy::RefreshOnce(Arc::new(refresher)))
            }
        }
    }
}

impl<T: Transport> ApiClient<T> {
    /// Perform one logical call.
    pub fn request(&self, target: &str, options: RequestOptions) -> Result<ApiResponse, ApiError> {
        let response = self.send(target, &options)?;
        if response.status != 401 {
            return self.parse_response(response);
        }

        match &self.auth_policy {
            AuthPolicy::Immediate => {
                tracing::warn!(%target, "request unauthorized");
                Err(ApiError::Unauthorized(SESSION_EXPIRED.into()))
            }
            AuthPolicy::RefreshOnce(refresher) => {
                if let Err(e) = refresher.refresh(&self.session) {
                    tracing::warn!(%target, error = %e, "credential refresh failed");
                    return Err(ApiError::Unauthorized(format!("token refresh failed: {e}")));
                }
                let retried = self.send(target, &options)?;
                if retried.status == 401 {
                    tracing::warn!(%target, "request unauthorized after refresh");
                }
                self.parse_response(retried)
            }
        }
    }

    /// `request` followed by a typed decode of the payload.
    pub fn request_json<R: DeserializeOwned>(
        &self,
        target: &str,
        options: RequestOptions,
    ) -> Result<R, ApiError> {
        self.request(target, options)?.into_typed()
    }

    pub fn get_json<R: DeserializeOwned>(&self, target: &str) -> Result<R, ApiError> {
        self.request_json(target, RequestOptions::get())
    }

    fn send(&self, target: &str, options: &RequestOptions) -> Result<HttpResponse, ApiError> {
        let request = self.build_request(target, options)?;
        let method = request.method.as_str();
        let url = request.url.clone();
        let response = self.transport.execute(request).map_err(|e| {
            tracing::debug!(method, %url, error = %e, "transport failure");
            ApiError::Network(e)
        })?;
        tracing::debug!(method, %url, status = response.status, "api response");
        Ok(response)
    }
}

fn is_absolute(target: &str) -> bool {
    target.starts_with("http://") || target.starts_with("https://") || target.starts_with("//")
}

fn set_default_content_type(headers: &mut Vec<(String, String)>, content_type: &str) {
    if find_header(headers, CONTENT_TYPE).is_none() {
        headers.push((CONTENT_TYPE.to_string(), content_type.to_string()));
    }
}
