//! Client configuration parsed from environment variables.
//!
//! Everything here is validated once, at startup. A malformed base URL is a
//! fatal `ApiError::Config`, never deferred to the first request.

use std::path::PathBuf;

use url::Url;

use crate::error::ApiError;
use crate::persistence::PersistenceType;

pub const BASE_URL_VAR: &str = "RIDDLE_API_BASE_URL";
pub const DEFAULT_COOKIE_EXPIRY_DAYS: u32 = 7;
pub const DEFAULT_STORAGE_PATH: &str = "riddle-session.json";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Absolute API base: origin plus path, without a trailing slash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl(String);

impl BaseUrl {
    pub fn parse(raw: &str) -> Result<Self, ApiError> {
        let url = Url::parse(raw.trim())
            .map_err(|e| ApiError::Config(format!("invalid {BASE_URL_VAR}: {e}")))?;
        let origin = url.origin();
        if !origin.is_tuple() {
            return Err(ApiError::Config(format!(
                "invalid {BASE_URL_VAR}: {raw} has no http origin"
            )));
        }
        let path = url.path();
        let path = path.strip_suffix('/').unwrap_or(path);
        Ok(Self(format!("{}{path}", origin.ascii_serialization())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Append a relative target, inserting exactly one `/` between them.
    pub fn join(&self, target: &str) -> String {
        format!("{}/{}", self.0, target.trim_start_matches('/'))
    }
}

/// How the client reacts to a 401 response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthPolicyKind {
    /// Fail with `Unauthorized` immediately.
    #[default]
    Immediate,
    /// Refresh the credential once, then retry the request once.
    Refresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            request_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: Option<BaseUrl>,
    pub auth_policy: AuthPolicyKind,
    pub persistence: PersistenceType,
    pub cookie_name: Option<String>,
    pub cookie_expiry_days: u32,
    pub storage_path: PathBuf,
    pub timeouts: Timeouts,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            auth_policy: AuthPolicyKind::default(),
            persistence: PersistenceType::default(),
            cookie_name: None,
            cookie_expiry_days: DEFAULT_COOKIE_EXPIRY_DAYS,
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            timeouts: Timeouts::default(),
        }
    }
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `RIDDLE_API_BASE_URL`: absolute URL; relative requests when absent
    /// - `RIDDLE_AUTH_POLICY`: `immediate` (default) or `refresh`
    /// - `RIDDLE_SESSION_PERSISTENCE`: `cookie` (default) or `localStorage`
    /// - `RIDDLE_SESSION_COOKIE`: cookie name, default `session_token`
    /// - `RIDDLE_SESSION_COOKIE_DAYS`: default 7
    /// - `RIDDLE_SESSION_STORAGE`: local-storage file, default `riddle-session.json`
    /// - `RIDDLE_REQUEST_TIMEOUT_SECS`: default 30
    /// - `RIDDLE_CONNECT_TIMEOUT_SECS`: default 10
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ApiError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = match lookup(BASE_URL_VAR).filter(|v| !v.trim().is_empty()) {
            Some(raw) => Some(BaseUrl::parse(&raw)?),
            None => {
                tracing::warn!(
                    "{BASE_URL_VAR} not set - using relative URLs (API must be same-origin)"
                );
                None
            }
        };
        let auth_policy = parse_auth_policy(lookup("RIDDLE_AUTH_POLICY").as_deref())?;
        let persistence = match lookup("RIDDLE_SESSION_PERSISTENCE") {
            Some(raw) => raw.parse()?,
            None => PersistenceType::default(),
        };
        let cookie_name = lookup("RIDDLE_SESSION_COOKIE").filter(|v| !v.is_empty());
        let cookie_expiry_days = parse_number(
            &lookup,
            "RIDDLE_SESSION_COOKIE_DAYS",
            DEFAULT_COOKIE_EXPIRY_DAYS,
        )?;
        let storage_path = lookup("RIDDLE_SESSION_STORAGE")
            .filter(|v| !v.is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_STORAGE_PATH), PathBuf::from);
        let timeouts = Timeouts {
            request_secs: parse_number(
                &lookup,
                "RIDDLE_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?,
            connect_secs: parse_number(
                &lookup,
                "RIDDLE_CONNECT_TIMEOUT_SECS",
                DEFAULT_CONNECT_TIMEOUT_SECS,
            )?,
        };

        Ok(Self {
            base_url,
            auth_policy,
            persistence,
            cookie_name,
            cookie_expiry_days,
            storage_path,
            timeouts,
        })
    }
}

fn parse_auth_policy(raw: Option<&str>) -> Result<AuthPolicyKind, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(AuthPolicyKind::Immediate),
        Some(v) if v.eq_ignore_ascii_case("immediate") => Ok(AuthPolicyKind::Immediate),
        Some(v) if v.eq_ignore_ascii_case("refresh") => Ok(AuthPolicyKind::Refresh),
        Some(other) => Err(ApiError::Config(format!(
            "unknown RIDDLE_AUTH_POLICY: {other}"
        ))),
    }
}

fn parse_number<F, N>(lookup: &F, key: &str, default: N) -> Result<N, ApiError>
where
    F: Fn(&str) -> Option<String>,
    N: std::str::FromStr,
    N::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ApiError::Config(format!("invalid {key}: {e}"))),
        None => Ok(default),
    }
}
