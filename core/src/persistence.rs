//! Session token persistence.
//!
//! The session store itself lives in memory. To survive restarts the token
//! is mirrored into a `TokenPersistence` backend: a cookie jar, or a
//! local-storage style JSON file. `PersistentSession` wires one to a
//! `SessionStore`: `restore` seeds the store at startup, `attach` writes on
//! every token transition.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::session::{SessionStore, Subscription};

pub const DEFAULT_COOKIE_NAME: &str = "session_token";
pub const STORAGE_KEY: &str = "session_token";

const COOKIE_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";
const EXPIRED_COOKIE_DATE: &str = "Thu, 01 Jan 1970 00:00:01 GMT";

/// Which backend mirrors the session token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PersistenceType {
    #[default]
    Cookie,
    LocalStorage,
}

impl FromStr for PersistenceType {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "cookie" => Ok(PersistenceType::Cookie),
            "localStorage" | "local_storage" => Ok(PersistenceType::LocalStorage),
            other => Err(ApiError::Config(format!(
                "unknown RIDDLE_SESSION_PERSISTENCE: {other}"
            ))),
        }
    }
}

/// Storage for the bearer token outside process memory.
pub trait TokenPersistence: Send + Sync {
    /// Store `token`. `expires_days` of `None` or `Some(0)` uses the
    /// backend default.
    fn set_token(&self, token: &str, expires_days: Option<u32>) -> Result<(), ApiError>;
    fn get_token(&self) -> Result<Option<String>, ApiError>;
    fn clear_token(&self) -> Result<(), ApiError>;
}

// ---------------------------------------------------------------------------
// Cookie
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct StoredCookie {
    value: String,
    expires: Option<DateTime<Utc>>,
}

/// Cookie-jar backend.
///
/// Every write is also rendered as a `Set-Cookie` line, collected until
/// drained with `take_set_cookie_headers`, so a host can forward them.
#[derive(Debug)]
pub struct CookiePersistence {
    name: String,
    default_expiry_days: u32,
    jar: Mutex<BTreeMap<String, StoredCookie>>,
    pending: Mutex<Vec<String>>,
}

impl CookiePersistence {
    pub fn new(name: Option<String>, default_expiry_days: u32) -> Self {
        let name = name.unwrap_or_else(|| {
            tracing::warn!(
                default = DEFAULT_COOKIE_NAME,
                "no cookie name provided for cookie persistence, using default"
            );
            DEFAULT_COOKIE_NAME.to_string()
        });
        Self {
            name,
            default_expiry_days,
            jar: Mutex::new(BTreeMap::new()),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Seed the jar from an incoming `Cookie:` header value.
    pub fn from_cookie_header(name: Option<String>, default_expiry_days: u32, header: &str) -> Self {
        let persistence = Self::new(name, default_expiry_days);
        {
            let mut jar = persistence.jar.lock();
            for pair in header.split(';') {
                let pair = pair.trim_start_matches(' ');
                if let Some((key, value)) = pair.split_once('=') {
                    jar.entry(key.to_string()).or_insert(StoredCookie {
                        value: value.to_string(),
                        expires: None,
                    });
                }
            }
        }
        persistence
    }

    pub fn cookie_name(&self) -> &str {
        &self.name
    }

    /// Render the live cookies as a `Cookie:` header value.
    pub fn cookie_header(&self) -> String {
        let now = Utc::now();
        self.jar
            .lock()
            .iter()
            .filter(|(_, cookie)| cookie.expires.map_or(true, |at| at > now))
            .map(|(key, cookie)| format!("{key}={}", cookie.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn take_set_cookie_headers(&self) -> Vec<String> {
        std::mem::take(&mut *self.pending.lock())
    }
}

impl TokenPersistence for CookiePersistence {
    fn set_token(&self, token: &str, expires_days: Option<u32>) -> Result<(), ApiError> {
        let days = expires_days
            .filter(|d| *d > 0)
            .unwrap_or(self.default_expiry_days);
        let expires = match days {
            0 => None,
            days => Some(
                TimeDelta::try_days(i64::from(days))
                    .and_then(|delta| Utc::now().checked_add_signed(delta))
                    .ok_or_else(|| {
                        ApiError::Persistence(format!("cookie expiry of {days} days is out of range"))
                    })?,
            ),
        };
        self.jar.lock().insert(
            self.name.clone(),
            StoredCookie {
                value: token.to_string(),
                expires,
            },
        );
        self.pending
            .lock()
            .push(render_set_cookie(&self.name, token, expires));
        tracing::debug!(cookie = %self.name, days, "session cookie written");
        Ok(())
    }

    fn get_token(&self) -> Result<Option<String>, ApiError> {
        Ok(parse_cookie(&self.cookie_header(), &self.name))
    }

    fn clear_token(&self) -> Result<(), ApiError> {
        self.jar.lock().remove(&self.name);
        self.pending.lock().push(render_clear_cookie(&self.name));
        tracing::debug!(cookie = %self.name, "session cookie cleared");
        Ok(())
    }
}

/// `name=value[; expires=<date>]; path=/; Secure; SameSite=Lax`
pub fn render_set_cookie(name: &str, value: &str, expires: Option<DateTime<Utc>>) -> String {
    let expires = expires
        .map(|at| format!("; expires={}", at.format(COOKIE_DATE_FORMAT)))
        .unwrap_or_default();
    format!("{name}={value}{expires}; path=/; Secure; SameSite=Lax")
}

pub fn render_clear_cookie(name: &str) -> String {
    format!("{name}=; Path=/; Expires={EXPIRED_COOKIE_DATE};")
}

/// Find `name` in a `Cookie:` header value. First match wins.
pub fn parse_cookie(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        pair.trim_start_matches(' ')
            .strip_prefix(name)
            .and_then(|rest| rest.strip_prefix('='))
            .map(str::to_string)
    })
}

// ---------------------------------------------------------------------------
// Local storage
// ---------------------------------------------------------------------------

/// Local-storage style backend: a JSON object file holding `session_token`.
/// A missing file reads as empty storage.
#[derive(Debug, Clone)]
pub struct FileStoragePersistence {
    path: PathBuf,
}

impl FileStoragePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Map<String, Value>, ApiError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(persistence_error(&self.path, e)),
        };
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        serde_json::from_str(&raw).map_err(|e| persistence_error(&self.path, e))
    }

    fn store(&self, map: &Map<String, Value>) -> Result<(), ApiError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| persistence_error(parent, e))?;
        }
        let raw = serde_json::to_string_pretty(map).map_err(|e| persistence_error(&self.path, e))?;
        fs::write(&self.path, raw).map_err(|e| persistence_error(&self.path, e))
    }
}

impl TokenPersistence for FileStoragePersistence {
    /// Local storage has no expiry; `expires_days` is ignored.
    fn set_token(&self, token: &str, _expires_days: Option<u32>) -> Result<(), ApiError> {
        let mut map = self.load()?;
        map.insert(STORAGE_KEY.to_string(), Value::String(token.to_string()));
        self.store(&map)
    }

    fn get_token(&self) -> Result<Option<String>, ApiError> {
        let map = self.load()?;
        Ok(map
            .get(STORAGE_KEY)
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    fn clear_token(&self) -> Result<(), ApiError> {
        let mut map = self.load()?;
        if map.remove(STORAGE_KEY).is_some() {
            self.store(&map)?;
        }
        Ok(())
    }
}

fn persistence_error(path: &Path, err: impl std::fmt::Display) -> ApiError {
    ApiError::Persistence(format!("{}: {err}", path.display()))
}

// ---------------------------------------------------------------------------
// Session mirroring
// ---------------------------------------------------------------------------

/// Mirrors a `SessionStore` token into a persistence backend.
#[derive(Clone)]
pub struct PersistentSession {
    session: SessionStore,
    backend: Arc<dyn TokenPersistence>,
    expires_days: Option<u32>,
}

impl PersistentSession {
    pub fn new(session: SessionStore, backend: Arc<dyn TokenPersistence>) -> Self {
        Self {
            session,
            backend,
            expires_days: None,
        }
    }

    /// Pick the backend named by `config`.
    pub fn from_config(config: &ClientConfig, session: SessionStore) -> Self {
        let backend: Arc<dyn TokenPersistence> = match config.persistence {
            PersistenceType::Cookie => Arc::new(CookiePersistence::new(
                config.cookie_name.clone(),
                config.cookie_expiry_days,
            )),
            PersistenceType::LocalStorage => {
                Arc::new(FileStoragePersistence::new(config.storage_path.clone()))
            }
        };
        Self::new(session, backend)
    }

    pub fn with_expiry_days(mut self, days: u32) -> Self {
        self.expires_days = Some(days);
        self
    }

    pub fn backend(&self) -> &Arc<dyn TokenPersistence> {
        &self.backend
    }

    /// Load a stored token into the session. Returns whether one was found.
    /// Call before `attach` to avoid writing the token straight back.
    pub fn restore(&self) -> Result<bool, ApiError> {
        match self.backend.get_token()?.filter(|t| !t.is_empty()) {
            Some(token) => {
                self.session.set_session(token);
                tracing::info!("session restored from persistence");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Write the token on every `set_session` and clear it on `reset`.
    /// Transitions that leave the token unchanged are not written.
    pub fn attach(&self) -> Subscription {
        let backend = Arc::clone(&self.backend);
        let expires_days = self.expires_days;
        let last = Mutex::new(self.session.token());
        self.session.subscribe(move |state| {
            let token = state.token.clone().filter(|t| !t.is_empty());
            let mut last = last.lock();
            if *last == token {
                return;
            }
            let result = match &token {
                Some(token) => backend.set_token(token, expires_days),
                None => backend.clear_token(),
            };
            if let Err(e) = result {
                tracing::warn!(error = %e, "failed to mirror session token");
            }
            *last = token;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn temp_path(label: &str) -> PathBuf {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir()
            .join(format!("riddle-core-{}-{label}-{n}", std::process::id()))
            .join("storage.json")
    }

    #[test]
    fn persistence_type_parses_config_strings() {
        assert_eq!("cookie".parse::<PersistenceType>().unwrap(), PersistenceType::Cookie);
        assert_eq!(
            "localStorage".parse::<PersistenceType>().unwrap(),
            PersistenceType::LocalStorage
        );
        assert_eq!(
            "local_storage".parse::<PersistenceType>().unwrap(),
            PersistenceType::LocalStorage
        );
        assert!(matches!(
            "sessionStorage".parse::<PersistenceType>(),
            Err(ApiError::Config(_))
        ));
    }

    #[test]
    fn set_cookie_line_carries_attributes() {
        let at = Utc.with_ymd_and_hms(2026, 10, 25, 12, 30, 0).unwrap();
        assert_eq!(
            render_set_cookie("session_token", "abc", Some(at)),
            "session_token=abc; expires=Sun, 25 Oct 2026 12:30:00 GMT; path=/; Secure; SameSite=Lax"
        );
        assert_eq!(
            render_set_cookie("session_token", "abc", None),
            "session_token=abc; path=/; Secure; SameSite=Lax"
        );
    }

    #[test]
    fn clear_cookie_line_expires_in_the_past() {
        assert_eq!(
            render_clear_cookie("session_token"),
            "session_token=; Path=/; Expires=Thu, 01 Jan 1970 00:00:01 GMT;"
        );
    }

    #[test]
    fn parse_cookie_finds_first_match() {
        let header = "theme=dark;  session_token=abc; session_token=def";
        assert_eq!(parse_cookie(header, "session_token").as_deref(), Some("abc"));
        assert_eq!(parse_cookie(header, "missing"), None);
        assert_eq!(parse_cookie("session_token_x=1", "session_token"), None);
    }

    #[test]
    fn cookie_backend_round_trips_token() {
        let cookies = CookiePersistence::new(Some("riddle".into()), 7);
        assert_eq!(cookies.get_token().unwrap(), None);

        cookies.set_token("abc", None).unwrap();
        assert_eq!(cookies.get_token().unwrap().as_deref(), Some("abc"));
        assert_eq!(cookies.cookie_header(), "riddle=abc");

        cookies.clear_token().unwrap();
        assert_eq!(cookies.get_token().unwrap(), None);

        let lines = cookies.take_set_cookie_headers();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("riddle=abc; expires="));
        assert!(lines[0].ends_with("; path=/; Secure; SameSite=Lax"));
        assert!(lines[1].contains("Expires=Thu, 01 Jan 1970"));
        assert!(cookies.take_set_cookie_headers().is_empty());
    }

    #[test]
    fn cookie_backend_defaults_name() {
        let cookies = CookiePersistence::new(None, 7);
        assert_eq!(cookies.cookie_name(), DEFAULT_COOKIE_NAME);
    }

    #[test]
    fn zero_day_expiry_falls_back_to_default() {
        let cookies = CookiePersistence::new(None, 7);
        cookies.set_token("abc", Some(0)).unwrap();
        let lines = cookies.take_set_cookie_headers();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("session_token=abc; expires="));
    }

    #[test]
    fn zero_day_default_writes_session_cookie() {
        let cookies = CookiePersistence::new(None, 0);
        cookies.set_token("abc", None).unwrap();
        let lines = cookies.take_set_cookie_headers();
        assert_eq!(lines, vec!["session_token=abc; path=/; Secure; SameSite=Lax".to_string()]);
    }

    #[test]
    fn out_of_range_expiry_is_persistence_error() {
        let cookies = CookiePersistence::new(None, 7);
        let err = cookies.set_token("abc", Some(u32::MAX)).unwrap_err();
        assert!(matches!(err, ApiError::Persistence(_)));
        assert!(cookies.take_set_cookie_headers().is_empty());
        assert_eq!(cookies.get_token().unwrap(), None);
    }

    #[test]
    fn huge_configured_expiry_does_not_panic_on_set_session() {
        let lookup = |key: &str| match key {
            "RIDDLE_API_BASE_URL" => Some("http://localhost:3000".to_string()),
            "RIDDLE_SESSION_COOKIE_DAYS" => Some("4000000000".to_string()),
            _ => None,
        };
        let config = ClientConfig::from_lookup(lookup).unwrap();
        let session = SessionStore::new();
        let persistent = PersistentSession::from_config(&config, session.clone());
        let _sub = persistent.attach();

        session.set_session("abc");
        assert_eq!(session.token().as_deref(), Some("abc"));
        assert_eq!(persistent.backend().get_token().unwrap(), None);
    }

    #[test]
    fn cookie_backend_reads_incoming_header() {
        let cookies =
            CookiePersistence::from_cookie_header(None, 7, "theme=dark; session_token=xyz");
        assert_eq!(cookies.get_token().unwrap().as_deref(), Some("xyz"));
    }

    #[test]
    fn file_backend_round_trips_token() {
        let path = temp_path("roundtrip");
        let storage = FileStoragePersistence::new(&path);
        assert_eq!(storage.get_token().unwrap(), None);

        storage.set_token("abc", None).unwrap();
        assert_eq!(storage.get_token().unwrap().as_deref(), Some("abc"));
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"session_token\""));

        storage.clear_token().unwrap();
        assert_eq!(storage.get_token().unwrap(), None);
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn file_backend_preserves_other_keys() {
        let path = temp_path("other-keys");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, r#"{"theme":"dark"}"#).unwrap();

        let storage = FileStoragePersistence::new(&path);
        storage.set_token("abc", None).unwrap();
        storage.clear_token().unwrap();

        let map: Map<String, Value> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(map.get("theme"), Some(&Value::String("dark".into())));
        assert!(map.get(STORAGE_KEY).is_none());
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn file_backend_reports_corrupt_storage() {
        let path = temp_path("corrupt");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{not json").unwrap();

        let err = FileStoragePersistence::new(&path).get_token().unwrap_err();
        assert!(matches!(err, ApiError::Persistence(_)));
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn attached_session_mirrors_set_and_reset() {
        let session = SessionStore::new();
        let cookies = Arc::new(CookiePersistence::new(None, 7));
        let mirror = PersistentSession::new(session.clone(), cookies.clone());
        let _sub = mirror.attach();

        session.set_session("abc");
        assert_eq!(cookies.get_token().unwrap().as_deref(), Some("abc"));

        session.update_riddle_participation("riddle-1", true);
        session.reset();
        assert_eq!(cookies.get_token().unwrap(), None);

        // set + clear only; the participation update did not rewrite the cookie
        assert_eq!(cookies.take_set_cookie_headers().len(), 2);
    }

    #[test]
    fn restore_seeds_session_from_backend() {
        let session = SessionStore::new();
        let cookies = Arc::new(CookiePersistence::from_cookie_header(
            None,
            7,
            "session_token=restored",
        ));
        let mirror = PersistentSession::new(session.clone(), cookies);

        assert!(mirror.restore().unwrap());
        assert_eq!(session.token().as_deref(), Some("restored"));
        assert!(session.is_authenticated());
    }

    #[test]
    fn restore_without_token_leaves_session_empty() {
        let session = SessionStore::new();
        let mirror =
            PersistentSession::new(session.clone(), Arc::new(CookiePersistence::new(None, 7)));
        assert!(!mirror.restore().unwrap());
        assert!(!session.is_authenticated());
    }

    #[test]
    fn from_config_selects_local_storage() {
        let path = temp_path("config");
        let config = ClientConfig {
            persistence: PersistenceType::LocalStorage,
            storage_path: path.clone(),
            ..ClientConfig::default()
        };
        let session = SessionStore::new();
        let mirror = PersistentSession::from_config(&config, session.clone());
        let _sub = mirror.attach();

        session.set_session("on-disk");
        assert_eq!(
            FileStoragePersistence::new(&path).get_token().unwrap().as_deref(),
            Some("on-disk")
        );
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
