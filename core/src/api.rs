//! Typed wrappers for the riddle backend endpoints.

use url::form_urlencoded;

use crate::client::ApiClient;
use crate::error::ApiError;
use crate::http::RequestOptions;
use crate::transport::Transport;
use crate::types::{
    GuessResult, GuessSubmission, LeaderboardEntry, LeaderboardKind, LeaderboardPage,
    LeaderboardWindow, PaginatedGuessHistory, UserProfile,
};

pub const LEADERBOARD_PAGE_SIZE: u32 = 10;
pub const DEFAULT_HISTORY_LIMIT: u32 = 10;

impl<T: Transport> ApiClient<T> {
    pub fn submit_guess(&self, submission: &GuessSubmission) -> Result<GuessResult, ApiError> {
        self.request_json("/api/guesses/submit", RequestOptions::post().json(submission)?)
    }

    /// Full leaderboard, unpaginated.
    pub fn fetch_leaderboard(
        &self,
        kind: LeaderboardKind,
    ) -> Result<Vec<LeaderboardEntry>, ApiError> {
        self.get_json(&format!("/api/leaderboard/{kind}"))
    }

    /// Zero-indexed page of `LEADERBOARD_PAGE_SIZE` entries.
    pub fn fetch_leaderboard_page(
        &self,
        kind: LeaderboardKind,
        page: u32,
    ) -> Result<LeaderboardPage, ApiError> {
        let offset = u64::from(page) * u64::from(LEADERBOARD_PAGE_SIZE);
        let target = format!(
            "/api/leaderboard/{kind}?{}",
            query(&[
                ("offset", offset.to_string()),
                ("limit", LEADERBOARD_PAGE_SIZE.to_string()),
            ])
        );
        let window: LeaderboardWindow = self.get_json(&target).map_err(|e| {
            tracing::error!(%kind, page, error = %e, "error fetching leaderboard page");
            e
        })?;
        Ok(LeaderboardPage {
            entries: window.entries,
            total_count: window.total_count,
            page_size: LEADERBOARD_PAGE_SIZE,
        })
    }

    pub fn fetch_profile(&self) -> Result<UserProfile, ApiError> {
        self.get_json("/api/profile")
    }

    /// Zero-indexed page of the caller's guess history. `limit` must be at
    /// least 1; no request is issued otherwise.
    pub fn fetch_guess_history(
        &self,
        page: u32,
        limit: u32,
    ) -> Result<PaginatedGuessHistory, ApiError> {
        if limit < 1 {
            return Err(ApiError::InvalidArgument("Limit must be at least 1.".into()));
        }
        let target = format!(
            "/api/profile/guess-history?{}",
            query(&[("page", page.to_string()), ("limit", limit.to_string())])
        );
        self.get_json(&target)
    }
}

fn query(pairs: &[(&str, String)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter().map(|(k, v)| (*k, v.as_str())))
        .finish()
}

/// Abbreviate a wallet address for display: `0x12...5678`. Any non-empty
/// address is abbreviated; for short ones head and tail overlap.
pub fn short_address(address: &str) -> String {
    if address.is_empty() {
        return String::new();
    }
    let chars: Vec<char> = address.chars().collect();
    let head: String = chars.iter().take(4).collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("{head}...{tail}")
}
