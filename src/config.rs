use clap::{Parser, ValueEnum};
use std::time::Duration;

use crate::dashboard::is_valid_game_id;
use crate::live_scores::MonitorSettings;
use crate::pace::{NarrativeThresholds, PaceConfig, SportRules, TriggerThresholds};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sport {
    /// Men's college basketball (two 20-minute halves)
    Ncaab,
    /// NBA (four 12-minute quarters)
    Nba,
}

impl Sport {
    pub fn rules(self) -> SportRules {
        match self {
            Sport::Ncaab => SportRules::ncaab(),
            Sport::Nba => SportRules::nba(),
        }
    }
}

/// Live total-points pace triggers and post-game narratives
#[derive(Parser, Debug, Clone)]
#[command(name = "pace-signals", version, about)]
pub struct Config {
    /// Dashboard listen address
    #[arg(long, env = "DASHBOARD_ADDR", default_value = "0.0.0.0:8080")]
    pub dashboard_addr: String,

    /// SQLite database path
    #[arg(long, env = "DATABASE_PATH", default_value = "pace_signals.db")]
    pub database_path: String,

    /// ESPN site API base URL
    #[arg(
        long,
        env = "ESPN_BASE_URL",
        default_value = "https://site.api.espn.com/apis/site/v2/sports"
    )]
    pub espn_base_url: String,

    /// Sport whose clock layout and feeds are used
    #[arg(long, env = "SPORT", value_enum, default_value = "ncaab")]
    pub sport: Sport,

    /// Game ids to track from startup (comma-separated)
    #[arg(long, env = "GAME_IDS", value_delimiter = ',')]
    pub game_ids: Vec<String>,

    /// Automatically track every game the scoreboard reports in progress
    #[arg(long, env = "DISCOVER", default_value = "false")]
    pub discover: bool,

    /// Scoreboard discovery interval in seconds
    #[arg(long, env = "DISCOVERY_INTERVAL_SECS", default_value = "60")]
    pub discovery_interval_secs: u64,

    /// Per-game snapshot polling interval in seconds
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value = "15")]
    pub poll_interval_secs: u64,

    /// Upstream fetch timeout in seconds
    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value = "5")]
    pub fetch_timeout_secs: u64,

    /// Emit each game's current classification this often (seconds); off when unset
    #[arg(long, env = "HEARTBEAT_SECS")]
    pub heartbeat_secs: Option<u64>,

    /// Maximum random delay before a game's first poll, in milliseconds
    #[arg(long, env = "POLL_JITTER_MS", default_value = "2000")]
    pub poll_jitter_ms: u64,

    // ── Trigger thresholds ────────────────────────────────────────────────────
    #[arg(long, env = "OVER_MIN_ELAPSED", default_value = "20.0")]
    pub over_min_elapsed: f64,

    #[arg(long, env = "OVER_MAX_ELAPSED", default_value = "30.0")]
    pub over_max_elapsed: f64,

    /// Minimum current-minus-required pace for OVER
    #[arg(long, env = "OVER_MIN_PACE_GAP", default_value = "0.3")]
    pub over_min_pace_gap: f64,

    #[arg(long, env = "TRIPLE_DIPPER_MIN_ELAPSED", default_value = "15.0")]
    pub triple_dipper_min_elapsed: f64,

    #[arg(long, env = "TRIPLE_DIPPER_MAX_ELAPSED", default_value = "32.0")]
    pub triple_dipper_max_elapsed: f64,

    #[arg(long, env = "TRIPLE_DIPPER_MIN_REQUIRED_PACE", default_value = "4.5")]
    pub triple_dipper_min_required_pace: f64,

    #[arg(
        long,
        env = "TRIPLE_DIPPER_MAX_PACE_GAP",
        default_value = "-1.0",
        allow_hyphen_values = true
    )]
    pub triple_dipper_max_pace_gap: f64,

    #[arg(long, env = "GOLDEN_ZONE_MIN_ELAPSED", default_value = "4.0")]
    pub golden_zone_min_elapsed: f64,

    /// GOLDEN_ZONE needs strictly more regulation minutes left than this
    #[arg(long, env = "GOLDEN_ZONE_MIN_REMAINING", default_value = "5.0")]
    pub golden_zone_min_remaining: f64,

    #[arg(long, env = "GOLDEN_ZONE_MIN_REQUIRED_PACE", default_value = "4.5")]
    pub golden_zone_min_required_pace: f64,

    #[arg(long, env = "GOLDEN_ZONE_MIN_DEFICIT", default_value = "1.0")]
    pub golden_zone_min_deficit: f64,

    #[arg(long, env = "GOLDEN_ZONE_MAX_DEFICIT", default_value = "1.5")]
    pub golden_zone_max_deficit: f64,

    // ── Narrative thresholds ──────────────────────────────────────────────────
    /// Period pace (points per minute) that counts as high
    #[arg(long, env = "HIGH_PACE_PPM", default_value = "4.0")]
    pub high_pace_ppm: f64,

    #[arg(long, env = "SURGE_MARGIN", default_value = "10")]
    pub surge_margin: u32,

    #[arg(long, env = "LATE_POINTS", default_value = "12")]
    pub late_points: u32,

    #[arg(long, env = "FREE_THROW_FRENZY_POINTS", default_value = "8")]
    pub free_throw_frenzy_points: u32,

    #[arg(long, env = "NOTABLE_RUN_POINTS", default_value = "10")]
    pub notable_run_points: u32,

    #[arg(long, env = "MIN_RUN_POINTS", default_value = "8")]
    pub min_run_points: u32,

    #[arg(long, env = "FINAL_WINDOW_SECS", default_value = "120")]
    pub final_window_secs: u32,

    #[arg(long, env = "FREE_THROW_MARKER", default_value = "free throw")]
    pub free_throw_marker: String,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be positive");
        }
        if self.fetch_timeout_secs == 0 {
            anyhow::bail!("fetch_timeout_secs must be positive");
        }
        if self.heartbeat_secs == Some(0) {
            anyhow::bail!("heartbeat_secs must be positive when set");
        }
        if self.discover && self.discovery_interval_secs == 0 {
            anyhow::bail!("discovery_interval_secs must be positive");
        }
        if self.over_min_elapsed > self.over_max_elapsed {
            anyhow::bail!("over_min_elapsed must not exceed over_max_elapsed");
        }
        if self.triple_dipper_min_elapsed > self.triple_dipper_max_elapsed {
            anyhow::bail!("triple_dipper_min_elapsed must not exceed triple_dipper_max_elapsed");
        }
        if self.golden_zone_min_deficit > self.golden_zone_max_deficit {
            anyhow::bail!("golden_zone_min_deficit must not exceed golden_zone_max_deficit");
        }
        if self.high_pace_ppm <= 0.0 {
            anyhow::bail!("high_pace_ppm must be positive");
        }
        if self.free_throw_marker.trim().is_empty() {
            anyhow::bail!("free_throw_marker must not be empty");
        }
        if let Some(id) = self.game_ids.iter().find(|id| !is_valid_game_id(id)) {
            anyhow::bail!("invalid game id {:?}", id);
        }
        Ok(())
    }

    pub fn pace_config(&self) -> PaceConfig {
        PaceConfig {
            sport: self.sport.rules(),
            triggers: TriggerThresholds {
                over_min_elapsed: self.over_min_elapsed,
                over_max_elapsed: self.over_max_elapsed,
                over_min_pace_gap: self.over_min_pace_gap,
                triple_dipper_min_elapsed: self.triple_dipper_min_elapsed,
                triple_dipper_max_elapsed: self.triple_dipper_max_elapsed,
                triple_dipper_min_required_pace: self.triple_dipper_min_required_pace,
                triple_dipper_max_pace_gap: self.triple_dipper_max_pace_gap,
                golden_zone_min_elapsed: self.golden_zone_min_elapsed,
                golden_zone_min_remaining: self.golden_zone_min_remaining,
                golden_zone_min_required_pace: self.golden_zone_min_required_pace,
                golden_zone_min_deficit: self.golden_zone_min_deficit,
                golden_zone_max_deficit: self.golden_zone_max_deficit,
            },
            narrative: NarrativeThresholds {
                high_pace_ppm: self.high_pace_ppm,
                surge_margin: self.surge_margin,
                late_points: self.late_points,
                free_throw_frenzy_points: self.free_throw_frenzy_points,
                notable_run_points: self.notable_run_points,
                min_run_points: self.min_run_points,
                final_window_seconds: self.final_window_secs,
                free_throw_marker: self.free_throw_marker.clone(),
            },
        }
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            heartbeat_interval: self.heartbeat_secs.map(Duration::from_secs),
            max_start_jitter: Duration::from_millis(self.poll_jitter_ms),
        }
    }
}
