use serde::{Deserialize, Serialize};

/// Upstream lifecycle of a contest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Pre,
    InProgress,
    Final,
}

/// One observation of a contest as reported by the snapshot feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub game_id: String,
    pub status: GameStatus,
    /// Fixed per sport (40 for college basketball).
    pub total_regulation_minutes: f64,
    /// In `[0, total_regulation_minutes]`; never increases while in progress.
    pub minutes_remaining_reg: f64,
    /// Combined score of both teams.
    pub current_total: u32,
    /// Posted total-points line, absent before release.
    pub line: Option<f64>,
    /// Points per minute so far, as supplied by the feed.
    pub current_pace: Option<f64>,
    /// Filled in by the monitor once computable.
    pub required_pace: Option<f64>,
    pub period: u32,
    /// Seconds left in the current period.
    pub clock_seconds: u32,
}

impl GameSnapshot {
    pub fn elapsed_minute(&self) -> f64 {
        self.total_regulation_minutes - self.minutes_remaining_reg
    }
}
