//! Derived pace metrics for a single snapshot.
//!
//! Every function here is pure and O(1). Missing inputs never error: they
//! turn into `None` and flow through to the classifier, which treats them as
//! "no trigger".

use serde::{Deserialize, Serialize};

use crate::models::GameSnapshot;

/// Pace metrics computed from one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    pub elapsed_minute: f64,
    pub minutes_remaining: f64,
    pub current_pace: Option<f64>,
    /// `(line - current_total) / minutes_remaining`.
    pub required_pace: Option<f64>,
    /// `current_pace - required_pace`; negative favours the under.
    pub pace_gap: Option<f64>,
}

pub fn derive_metrics(snapshot: &GameSnapshot) -> DerivedMetrics {
    let total = snapshot.total_regulation_minutes.max(0.0);
    let minutes_remaining = if snapshot.minutes_remaining_reg.is_finite() {
        snapshot.minutes_remaining_reg.clamp(0.0, total)
    } else {
        0.0
    };
    let required_pace = required_pace(snapshot.line, snapshot.current_total, minutes_remaining);
    let current_pace = snapshot.current_pace.filter(|p| p.is_finite());

    DerivedMetrics {
        elapsed_minute: total - minutes_remaining,
        minutes_remaining,
        current_pace,
        required_pace,
        pace_gap: pace_gap(current_pace, required_pace),
    }
}

/// Points per minute needed over the remaining regulation time to land
/// exactly on the line. `None` without a line or once regulation is over.
pub fn required_pace(line: Option<f64>, current_total: u32, minutes_remaining: f64) -> Option<f64> {
    let line = line.filter(|l| l.is_finite())?;
    if minutes_remaining <= 0.0 {
        return None;
    }
    Some((line - current_total as f64) / minutes_remaining)
}

pub fn pace_gap(current_pace: Option<f64>, required_pace: Option<f64>) -> Option<f64> {
    Some(current_pace? - required_pace?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GameStatus;
    use approx::assert_relative_eq;

    fn snapshot(remaining: f64, total: u32, line: Option<f64>, pace: Option<f64>) -> GameSnapshot {
        GameSnapshot {
            game_id: "401".into(),
            status: GameStatus::InProgress,
            total_regulation_minutes: 40.0,
            minutes_remaining_reg: remaining,
            current_total: total,
            line,
            current_pace: pace,
            required_pace: None,
            period: 2,
            clock_seconds: (remaining * 60.0) as u32,
        }
    }

    #[test]
    fn derives_required_pace_and_gap() {
        let m = derive_metrics(&snapshot(15.0, 80, Some(140.0), Some(3.2)));
        assert_relative_eq!(m.elapsed_minute, 25.0);
        assert_relative_eq!(m.required_pace.unwrap(), 4.0);
        assert_relative_eq!(m.pace_gap.unwrap(), -0.8, epsilon = 1e-9);
        assert!(m.pace_gap.is_some());
    }

    #[test]
    fn no_line_means_no_required_pace() {
        let m = derive_metrics(&snapshot(15.0, 80, None, Some(3.2)));
        assert_eq!(m.required_pace, None);
        assert_eq!(m.pace_gap, None);
    }

    #[test]
    fn zero_minutes_remaining_is_indeterminate() {
        let m = derive_metrics(&snapshot(0.0, 150, Some(140.0), Some(3.75)));
        assert_eq!(m.required_pace, None);
        assert!(m.pace_gap.is_none());
    }

    #[test]
    fn missing_current_pace_propagates() {
        let m = derive_metrics(&snapshot(10.0, 100, Some(140.0), None));
        assert_relative_eq!(m.required_pace.unwrap(), 4.0);
        assert_eq!(m.pace_gap, None);
    }

    #[test]
    fn out_of_range_remaining_is_clamped() {
        let m = derive_metrics(&snapshot(55.0, 0, Some(140.0), Some(0.0)));
        assert_relative_eq!(m.minutes_remaining, 40.0);
        assert_relative_eq!(m.elapsed_minute, 0.0);

        let m = derive_metrics(&snapshot(-3.0, 150, Some(140.0), Some(3.0)));
        assert_relative_eq!(m.minutes_remaining, 0.0);
        assert_eq!(m.required_pace, None);
    }
}
