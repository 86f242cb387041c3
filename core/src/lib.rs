//! Authenticated API client core for the daily riddle service.
//!
//! # Overview
//! Two cooperating pieces: a `SessionStore` holding the bearer token as an
//! observable value, and an `ApiClient` that reads the token on every call,
//! resolves URLs against the configured base, negotiates content types and
//! classifies failures. Network I/O sits behind the `Transport` trait.
//!
//! # Design
//! - `ApiClient::build_request` and `ApiClient::parse_response` are pure;
//!   `ApiClient::request` runs them around one transport round-trip.
//! - 401 handling is a policy: fail immediately (default) or refresh the
//!   credential once and retry once. Nothing else is ever retried.
//! - The session is an injected handle, never a global. Persistence to a
//!   cookie jar or local-storage file is mirrored by `PersistentSession`.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod persistence;
pub mod refresh;
pub mod session;
pub mod transport;
pub mod types;

pub use api::short_address;
pub use client::{ApiClient, AuthPolicy};
pub use config::{AuthPolicyKind, BaseUrl, ClientConfig, Timeouts};
pub use error::ApiError;
pub use http::{ApiResponse, HttpMethod, HttpRequest, HttpResponse, RequestBody, RequestOptions};
pub use persistence::{
    CookiePersistence, FileStoragePersistence, PersistenceType, PersistentSession,
    TokenPersistence,
};
pub use refresh::{CredentialRefresher, EndpointRefresher};
pub use session::{SessionState, SessionStore, Subscription};
pub use transport::{Transport, TransportError, UreqTransport};
pub use types::{
    GuessHistoryEntry, GuessResult, GuessSubmission, LeaderboardEntry, LeaderboardKind,
    LeaderboardPage, PaginatedGuessHistory, UserProfile,
};
