use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// Solution to the riddle served by the mock.
pub const ANSWER: &str = "echo";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub wallet_address: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Deserialize)]
pub struct ExpireRequest {
    pub token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuessSubmission {
    pub wallet_address: String,
    pub guess: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuessResult {
    pub is_correct: bool,
    pub recorded_time: Option<String>,
    pub can_retry: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub wallet_address: String,
    pub riddles_solved: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recorded_time: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardWindow {
    pub entries: Vec<LeaderboardEntry>,
    pub total_count: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub wallet_address: String,
    pub total_guesses: u32,
    pub correct_guesses: u32,
    pub riddles_solved: u32,
    pub average_attempts: f64,
    pub rank: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuessHistoryEntry {
    pub riddle_id: String,
    pub guess: String,
    pub is_correct: bool,
    pub submitted_at: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaginatedGuessHistory {
    pub data: Vec<GuessHistoryEntry>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}

#[derive(Deserialize)]
pub struct Window {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct HistoryPage {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

struct Session {
    wallet: String,
    expired: bool,
}

struct DailyWinner {
    wallet: String,
    recorded_time: String,
}

/// In-memory backend state.
#[derive(Default)]
pub struct Backend {
    sessions: HashMap<String, Session>,
    history: HashMap<String, Vec<GuessHistoryEntry>>,
    daily_winners: Vec<DailyWinner>,
    solved: HashMap<String, u32>,
}

impl Backend {
    /// A backend with a populated leaderboard: twelve all-time solvers and
    /// two daily winners.
    pub fn seeded() -> Self {
        let mut backend = Self::default();
        for i in 1..=12u32 {
            backend.solved.insert(format!("0x{i:040x}"), 20 - i);
        }
        for (i, time) in ["2026-10-18T00:01:07Z", "2026-10-18T00:02:31Z"].iter().enumerate() {
            backend.daily_winners.push(DailyWinner {
                wallet: format!("0x{:040x}", i + 1),
                recorded_time: time.to_string(),
            });
        }
        backend
    }

    fn all_time(&self) -> Vec<LeaderboardEntry> {
        let mut solvers: Vec<(&String, &u32)> = self.solved.iter().collect();
        solvers.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        solvers
            .into_iter()
            .enumerate()
            .map(|(i, (wallet, solved))| LeaderboardEntry {
                rank: i as u32 + 1,
                wallet_address: wallet.clone(),
                riddles_solved: *solved,
                recorded_time: None,
            })
            .collect()
    }

    fn daily(&self) -> Vec<LeaderboardEntry> {
        self.daily_winners
            .iter()
            .enumerate()
            .map(|(i, winner)| LeaderboardEntry {
                rank: i as u32 + 1,
                wallet_address: winner.wallet.clone(),
                riddles_solved: self.solved.get(&winner.wallet).copied().unwrap_or(0),
                recorded_time: Some(winner.recorded_time.clone()),
            })
            .collect()
    }
}

pub type Db = Arc<RwLock<Backend>>;

/// JSON error body: `{"error": "..."}`.
pub struct ApiFailure {
    status: StatusCode,
    message: String,
}

impl ApiFailure {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub fn app() -> Router {
    app_with(Backend::seeded())
}

pub fn app_with(backend: Backend) -> Router {
    let db: Db = Arc::new(RwLock::new(backend));
    Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/guesses/submit", post(submit_guess))
        .route("/api/leaderboard/{kind}", get(leaderboard))
        .route("/api/profile", get(profile))
        .route("/api/profile/guess-history", get(guess_history))
        .route("/api/test/expire", post(expire_token))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Resolve the caller's wallet from a live bearer token.
fn authenticate(backend: &Backend, headers: &HeaderMap) -> Result<String, ApiFailure> {
    let token = bearer(headers)
        .ok_or_else(|| ApiFailure::new(StatusCode::UNAUTHORIZED, "missing bearer token"))?;
    match backend.sessions.get(token) {
        Some(session) if !session.expired => Ok(session.wallet.clone()),
        Some(_) => Err(ApiFailure::new(StatusCode::UNAUTHORIZED, "token expired")),
        None => Err(ApiFailure::new(StatusCode::UNAUTHORIZED, "unknown token")),
    }
}

fn issue_token(backend: &mut Backend, wallet: String) -> String {
    let token = Uuid::new_v4().to_string();
    backend.sessions.insert(
        token.clone(),
        Session {
            wallet,
            expired: false,
        },
    );
    token
}

async fn health() -> &'static str {
    "ok"
}

async fn login(
    State(db): State<Db>,
    Json(input): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiFailure> {
    if input.wallet_address.trim().is_empty() {
        return Err(ApiFailure::new(StatusCode::BAD_REQUEST, "walletAddress is required"));
    }
    let token = issue_token(&mut *db.write().await, input.wallet_address);
    Ok(Json(TokenResponse { token }))
}

/// Exchange a known token, expired or not, for a new one.
async fn refresh(
    State(db): State<Db>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, ApiFailure> {
    let old = bearer(&headers)
        .ok_or_else(|| ApiFailure::new(StatusCode::UNAUTHORIZED, "missing bearer token"))?;
    let mut backend = db.write().await;
    let session = backend
        .sessions
        .remove(old)
        .ok_or_else(|| ApiFailure::new(StatusCode::UNAUTHORIZED, "unknown token"))?;
    let token = issue_token(&mut backend, session.wallet);
    tracing::debug!("token refreshed");
    Ok(Json(TokenResponse { token }))
}

async fn expire_token(
    State(db): State<Db>,
    Json(input): Json<ExpireRequest>,
) -> Result<StatusCode, ApiFailure> {
    let mut backend = db.write().await;
    let session = backend
        .sessions
        .get_mut(&input.token)
        .ok_or_else(|| ApiFailure::new(StatusCode::NOT_FOUND, "unknown token"))?;
    session.expired = true;
    Ok(StatusCode::NO_CONTENT)
}

async fn submit_guess(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<GuessSubmission>,
) -> Result<Json<GuessResult>, ApiFailure> {
    let mut backend = db.write().await;
    let wallet = authenticate(&backend, &headers)?;
    if input.wallet_address != wallet {
        return Err(ApiFailure::new(
            StatusCode::FORBIDDEN,
            "walletAddress does not match session",
        ));
    }
    if input.guess.trim().is_empty() {
        return Err(ApiFailure::new(StatusCode::UNPROCESSABLE_ENTITY, "guess is required"));
    }

    let now = chrono::Utc::now();
    let is_correct = input.guess.trim().eq_ignore_ascii_case(ANSWER);
    let recorded_time = is_correct.then(|| now.to_rfc3339());

    backend
        .history
        .entry(wallet.clone())
        .or_default()
        .push(GuessHistoryEntry {
            riddle_id: now.format("%Y-%m-%d").to_string(),
            guess: input.guess,
            is_correct,
            submitted_at: now.to_rfc3339(),
        });

    if let Some(time) = &recorded_time {
        if !backend.daily_winners.iter().any(|w| w.wallet == wallet) {
            backend.daily_winners.push(DailyWinner {
                wallet: wallet.clone(),
                recorded_time: time.clone(),
            });
            *backend.solved.entry(wallet).or_default() += 1;
        }
    }

    Ok(Json(GuessResult {
        is_correct,
        recorded_time,
        can_retry: !is_correct,
    }))
}

/// Plain array without paging parameters, `{entries, totalCount}` with them.
async fn leaderboard(
    State(db): State<Db>,
    Path(kind): Path<String>,
    Query(window): Query<Window>,
) -> Result<Response, ApiFailure> {
    let backend = db.read().await;
    let entries = match kind.as_str() {
        "daily-winners" => backend.daily(),
        "all-time-winners" => backend.all_time(),
        other => {
            return Err(ApiFailure::new(
                StatusCode::NOT_FOUND,
                format!("unknown leaderboard: {other}"),
            ))
        }
    };

    if window.offset.is_none() && window.limit.is_none() {
        return Ok(Json(entries).into_response());
    }
    let total_count = entries.len();
    let offset = window.offset.unwrap_or(0);
    let limit = window.limit.unwrap_or(10);
    let entries = entries.into_iter().skip(offset).take(limit).collect();
    Ok(Json(LeaderboardWindow {
        entries,
        total_count,
    })
    .into_response())
}

async fn profile(
    State(db): State<Db>,
    headers: HeaderMap,
) -> Result<Json<UserProfile>, ApiFailure> {
    let backend = db.read().await;
    let wallet = authenticate(&backend, &headers)?;
    let history = backend.history.get(&wallet).map(Vec::as_slice).unwrap_or(&[]);
    let total_guesses = history.len() as u32;
    let correct_guesses = history.iter().filter(|g| g.is_correct).count() as u32;
    let riddles_solved = backend.solved.get(&wallet).copied().unwrap_or(0);
    let average_attempts = if correct_guesses == 0 {
        0.0
    } else {
        f64::from(total_guesses) / f64::from(correct_guesses)
    };
    let rank = backend
        .all_time()
        .iter()
        .find(|e| e.wallet_address == wallet)
        .map_or(0, |e| e.rank);

    Ok(Json(UserProfile {
        wallet_address: wallet,
        total_guesses,
        correct_guesses,
        riddles_solved,
        average_attempts,
        rank,
    }))
}

async fn guess_history(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(paging): Query<HistoryPage>,
) -> Result<Json<PaginatedGuessHistory>, ApiFailure> {
    let backend = db.read().await;
    let wallet = authenticate(&backend, &headers)?;
    let page = paging.page.unwrap_or(0);
    let limit = paging.limit.unwrap_or(10);
    if limit == 0 {
        return Err(ApiFailure::new(StatusCode::BAD_REQUEST, "limit must be at least 1"));
    }

    let history = backend.history.get(&wallet).map(Vec::as_slice).unwrap_or(&[]);
    let data = history
        .iter()
        .rev()
        .skip(page.saturating_mul(limit))
        .take(limit)
        .cloned()
        .collect();
    Ok(Json(PaginatedGuessHistory {
        data,
        total: history.len(),
        page,
        limit,
    }))
}
