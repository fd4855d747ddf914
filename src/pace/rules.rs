//! Immutable threshold sets for the classifier and the post-game analyzer.
//!
//! Nothing here is global: a `PaceConfig` is built once (from the CLI or from
//! `Default`) and passed by reference into every pure function that needs it,
//! so tests and sports can swap threshold sets freely.

use serde::{Deserialize, Serialize};

/// Clock layout of a sport: how regulation is split and how long overtime is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SportRules {
    /// Short key, e.g. "ncaab".
    pub name: String,
    /// ESPN `sport/league` path segment used by the feeds.
    pub espn_path: String,
    pub total_regulation_minutes: f64,
    pub regulation_periods: u32,
    pub regulation_period_minutes: f64,
    pub overtime_minutes: f64,
}

impl SportRules {
    /// Men's college basketball: two 20-minute halves, 5-minute overtimes.
    pub fn ncaab() -> Self {
        SportRules {
            name: "ncaab".to_string(),
            espn_path: "basketball/mens-college-basketball".to_string(),
            total_regulation_minutes: 40.0,
            regulation_periods: 2,
            regulation_period_minutes: 20.0,
            overtime_minutes: 5.0,
        }
    }

    /// NBA: four 12-minute quarters, 5-minute overtimes.
    pub fn nba() -> Self {
        SportRules {
            name: "nba".to_string(),
            espn_path: "basketball/nba".to_string(),
            total_regulation_minutes: 48.0,
            regulation_periods: 4,
            regulation_period_minutes: 12.0,
            overtime_minutes: 5.0,
        }
    }

    pub fn is_overtime(&self, period: u32) -> bool {
        period > self.regulation_periods
    }

    /// Length of the given period in minutes.
    pub fn period_minutes(&self, period: u32) -> f64 {
        if self.is_overtime(period) {
            self.overtime_minutes
        } else {
            self.regulation_period_minutes
        }
    }

    /// Regulation minutes remaining given the current period and the clock
    /// (seconds left in that period). Overtime counts as zero regulation time.
    pub fn minutes_remaining_reg(&self, period: u32, clock_seconds: u32) -> f64 {
        if period == 0 {
            return self.total_regulation_minutes;
        }
        if self.is_overtime(period) {
            return 0.0;
        }
        let later_periods = (self.regulation_periods - period) as f64;
        let in_period = (clock_seconds as f64 / 60.0).min(self.regulation_period_minutes);
        (later_periods * self.regulation_period_minutes + in_period)
            .clamp(0.0, self.total_regulation_minutes)
    }

    /// Human label for a period: "1st Half", "Q3", "OT2".
    pub fn period_label(&self, period: u32) -> String {
        if self.is_overtime(period) {
            return format!("OT{}", period - self.regulation_periods);
        }
        if self.regulation_periods == 2 {
            match period {
                1 => "1st Half".to_string(),
                _ => "2nd Half".to_string(),
            }
        } else {
            format!("Q{}", period)
        }
    }
}

impl Default for SportRules {
    fn default() -> Self {
        SportRules::ncaab()
    }
}

/// Inclusive trigger boundaries. Field names follow the rule they feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerThresholds {
    pub over_min_elapsed: f64,
    pub over_max_elapsed: f64,
    pub over_min_pace_gap: f64,

    pub triple_dipper_min_elapsed: f64,
    pub triple_dipper_max_elapsed: f64,
    pub triple_dipper_min_required_pace: f64,
    pub triple_dipper_max_pace_gap: f64,

    pub golden_zone_min_elapsed: f64,
    /// Strict: minutes remaining must be greater than this.
    pub golden_zone_min_remaining: f64,
    pub golden_zone_min_required_pace: f64,
    /// Bounds on `-pace_gap` (how far below the required pace the game runs).
    pub golden_zone_min_deficit: f64,
    pub golden_zone_max_deficit: f64,
}

impl Default for TriggerThresholds {
    fn default() -> Self {
        TriggerThresholds {
            over_min_elapsed: 20.0,
            over_max_elapsed: 30.0,
            over_min_pace_gap: 0.3,

            triple_dipper_min_elapsed: 15.0,
            triple_dipper_max_elapsed: 32.0,
            triple_dipper_min_required_pace: 4.5,
            triple_dipper_max_pace_gap: -1.0,

            golden_zone_min_elapsed: 4.0,
            golden_zone_min_remaining: 5.0,
            golden_zone_min_required_pace: 4.5,
            golden_zone_min_deficit: 1.0,
            golden_zone_max_deficit: 1.5,
        }
    }
}

/// Constants for run qualification and narrative factor selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeThresholds {
    /// A period scoring faster than this (points per minute) is a factor.
    pub high_pace_ppm: f64,
    /// Second period must outscore the first by at least this much.
    pub surge_margin: u32,
    /// Final-window points above this are a factor.
    pub late_points: u32,
    /// Final-window free-throw points above this are a factor.
    pub free_throw_frenzy_points: u32,
    /// Biggest run above this is a factor.
    pub notable_run_points: u32,
    /// Closed runs below this are not kept as candidates.
    pub min_run_points: u32,
    /// Seconds left in the final regulation period that count as "late".
    pub final_window_seconds: u32,
    /// Case-insensitive play text marking a free throw.
    pub free_throw_marker: String,
}

impl Default for NarrativeThresholds {
    fn default() -> Self {
        NarrativeThresholds {
            high_pace_ppm: 4.0,
            surge_margin: 10,
            late_points: 12,
            free_throw_frenzy_points: 8,
            notable_run_points: 10,
            min_run_points: 8,
            final_window_seconds: 120,
            free_throw_marker: "free throw".to_string(),
        }
    }
}

/// Everything the pure core needs, passed explicitly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaceConfig {
    pub sport: SportRules,
    pub triggers: TriggerThresholds,
    pub narrative: NarrativeThresholds,
}
