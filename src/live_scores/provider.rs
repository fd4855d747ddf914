use async_trait::async_trait;
use thiserror::Error;

use crate::models::GameSnapshot;
use crate::postgame::RawPlay;

/// Failure talking to an upstream feed. Never fatal to the monitor.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned status {0}")]
    Status(u16),

    #[error("Malformed upstream payload: {0}")]
    Malformed(String),

    #[error("Game not found: {0}")]
    NotFound(String),

    #[error("Fetch timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Latest live observation of a game, including its pre/in-progress/final status.
#[async_trait]
pub trait SnapshotFeed: Send + Sync {
    async fn fetch_snapshot(&self, game_id: &str) -> Result<GameSnapshot, FeedError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

/// Ordered play list of a completed game plus the home-team identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayList {
    pub home_team_id: String,
    pub plays: Vec<RawPlay>,
}

#[async_trait]
pub trait PlayListFeed: Send + Sync {
    async fn fetch_play_list(&self, game_id: &str) -> Result<PlayList, FeedError>;
}

/// Posted total and final combined score, used only by the narrative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostedLine {
    pub line: Option<f64>,
    pub final_total: u32,
}

#[async_trait]
pub trait LineFeed: Send + Sync {
    async fn fetch_line(&self, game_id: &str) -> Result<PostedLine, FeedError>;
}

/// Lists games currently in progress, for automatic tracking.
#[async_trait]
pub trait GameDiscovery: Send + Sync {
    async fn live_game_ids(&self) -> Result<Vec<String>, FeedError>;
}
