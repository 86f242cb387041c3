//! Credential refresh used by `AuthPolicy::RefreshOnce`.

use std::sync::Arc;

use serde::Deserialize;

use crate::config::BaseUrl;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, AUTHORIZATION};
use crate::session::SessionStore;
use crate::transport::Transport;

pub const REFRESH_PATH: &str = "/api/auth/refresh";

/// Obtains a fresh credential and stores it in the session.
///
/// On failure the session must be left as it was.
pub trait CredentialRefresher: Send + Sync {
    fn refresh(&self, session: &SessionStore) -> Result<(), ApiError>;
}

impl<F> CredentialRefresher for F
where
    F: Fn(&SessionStore) -> Result<(), ApiError> + Send + Sync,
{
    fn refresh(&self, session: &SessionStore) -> Result<(), ApiError> {
        self(session)
    }
}

#[derive(Deserialize)]
struct RefreshResponse {
    token: String,
}

/// Exchanges the current bearer token at `POST /api/auth/refresh`.
///
/// Talks to the transport directly, never through `ApiClient`, so a 401
/// here cannot trigger another refresh.
pub struct EndpointRefresher<T> {
    base_url: Option<BaseUrl>,
    transport: Arc<T>,
}

impl<T: Transport> EndpointRefresher<T> {
    pub fn new(base_url: Option<BaseUrl>, transport: Arc<T>) -> Self {
        Self { base_url, transport }
    }

    fn url(&self) -> String {
        match &self.base_url {
            Some(base) => base.join(REFRESH_PATH),
            None => REFRESH_PATH.to_string(),
        }
    }
}

impl<T: Transport> CredentialRefresher for EndpointRefresher<T> {
    fn refresh(&self, session: &SessionStore) -> Result<(), ApiError> {
        let token = session
            .token()
            .ok_or_else(|| ApiError::Unauthorized("no session token to refresh".into()))?;
        let request = HttpRequest {
            method: HttpMethod::Post,
            url: self.url(),
            headers: vec![(AUTHORIZATION.to_string(), format!("Bearer {token}"))],
            body: None,
        };
        let response = self.transport.execute(request).map_err(ApiError::Network)?;
        if !response.is_success() {
            return Err(ApiError::Http {
                status: response.status,
                message: format!("token refresh rejected with status {}", response.status),
                body: None,
            });
        }
        let refreshed: RefreshResponse = serde_json::from_str(&response.body)
            .map_err(|e| ApiError::Deserialization(e.to_string()))?;
        if refreshed.token.is_empty() {
            return Err(ApiError::Deserialization("refresh returned an empty token".into()));
        }

        session.set_session(refreshed.token);
        tracing::info!("session token refreshed");
        Ok(())
    }
}
