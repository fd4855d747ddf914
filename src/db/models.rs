use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::postgame::PostGameAnalysis;

/// One emitted classification change, as stored in `trigger_changes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerChange {
    pub id: Option<i64>,
    pub game_id: String,
    /// "NONE" | "OVER" | "TRIPLE_DIPPER" | "GOLDEN_ZONE"; absent for the first
    pub previous: Option<String>,
    pub current: String,
    pub elapsed_minute: f64,
    pub minutes_remaining: f64,
    pub current_total: u32,
    pub line: Option<f64>,
    pub current_pace: Option<f64>,
    pub required_pace: Option<f64>,
    pub pace_gap: Option<f64>,
    pub detected_at: DateTime<Utc>,
}

/// A stored post-game analysis row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredAnalysis {
    pub game_id: String,
    pub analysis: PostGameAnalysis,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stats {
    pub trigger_changes: i64,
    pub games_seen: i64,
    pub analyses: i64,
    pub over_triggers: i64,
    pub triple_dipper_triggers: i64,
    pub golden_zone_triggers: i64,
}
