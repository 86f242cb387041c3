//! Domain DTOs for the riddle API.
//!
//! # Design
//! These mirror the mock-server's schema but are defined independently;
//! integration tests catch any drift between the two crates. Field names
//! follow the backend's camelCase JSON.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Request payload for `POST /api/guesses/submit`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GuessSubmission {
    pub wallet_address: String,
    pub guess: String,
}

/// Outcome of a submitted guess. `recorded_time` is set only when correct.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GuessResult {
    pub is_correct: bool,
    pub recorded_time: Option<String>,
    pub can_retry: bool,
}

/// Which leaderboard to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LeaderboardKind {
    DailyWinners,
    AllTimeWinners,
}

impl LeaderboardKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LeaderboardKind::DailyWinners => "daily-winners",
            LeaderboardKind::AllTimeWinners => "all-time-winners",
        }
    }
}

impl fmt::Display for LeaderboardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ranked row of a leaderboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub wallet_address: String,
    #[serde(default)]
    pub riddles_solved: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_time: Option<String>,
}

/// Wire shape of a paginated leaderboard response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardWindow {
    pub entries: Vec<LeaderboardEntry>,
    pub total_count: u64,
}

/// A leaderboard page as handed to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardPage {
    pub entries: Vec<LeaderboardEntry>,
    pub total_count: u64,
    pub page_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub wallet_address: String,
    pub total_guesses: u32,
    pub correct_guesses: u32,
    pub riddles_solved: u32,
    pub average_attempts: f64,
    pub rank: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GuessHistoryEntry {
    pub riddle_id: String,
    pub guess: String,
    pub is_correct: bool,
    /// ISO 8601 timestamp.
    pub submitted_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaginatedGuessHistory {
    pub data: Vec<GuessHistoryEntry>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn guess_submission_uses_camel_case() {
        let body = serde_json::to_string(&GuessSubmission {
            wallet_address: "0xabc".into(),
            guess: "echo".into(),
        })
        .unwrap();
        assert_eq!(body, r#"{"walletAddress":"0xabc","guess":"echo"}"#);
    }

    #[test]
    fn guess_result_accepts_null_recorded_time() {
        let result: GuessResult = serde_json::from_value(json!({
            "isCorrect": false,
            "recordedTime": null,
            "canRetry": true
        }))
        .unwrap();
        assert!(!result.is_correct);
        assert!(result.recorded_time.is_none());
        assert!(result.can_retry);
    }

    #[test]
    fn leaderboard_kind_path_segments() {
        assert_eq!(LeaderboardKind::DailyWinners.to_string(), "daily-winners");
        assert_eq!(LeaderboardKind::AllTimeWinners.as_str(), "all-time-winners");
        let kind: LeaderboardKind = serde_json::from_value(json!("all-time-winners")).unwrap();
        assert_eq!(kind, LeaderboardKind::AllTimeWinners);
    }

    #[test]
    fn leaderboard_entry_optional_fields_default() {
        let entry: LeaderboardEntry =
            serde_json::from_value(json!({"rank": 1, "walletAddress": "0x1"})).unwrap();
        assert_eq!(entry.riddles_solved, 0);
        assert!(entry.recorded_time.is_none());
    }

    #[test]
    fn guess_history_page_parses() {
        let page: PaginatedGuessHistory = serde_json::from_value(json!({
            "data": [{
                "riddleId": "2026-10-18",
                "guess": "echo",
                "isCorrect": true,
                "submittedAt": "2026-10-18T09:00:00Z"
            }],
            "total": 1,
            "page": 0,
            "limit": 10
        }))
        .unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].riddle_id, "2026-10-18");
    }
}
