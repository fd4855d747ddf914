//! Rule-based explanation of why a final total landed where it did.
//!
//! Factors are collected independently (all that apply, in a fixed order);
//! the headline summary then walks a priority cascade over them.

use serde::{Deserialize, Serialize};

use super::runs::ScoringBreakdown;
use crate::pace::NarrativeThresholds;

/// A narrative factor, kept typed until rendered so the summary cascade can
/// look at what qualified rather than re-parse strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Factor {
    Overtime { periods: u32, points: u32 },
    HighPacePeriod { label: String, pace: f64, points: u32 },
    SecondHalfSurge { first: u32, second: u32 },
    LateScoring { points: u32 },
    FreeThrowFrenzy { points: u32 },
    BigRun { points: u32, label: String },
}

impl Factor {
    pub fn describe(&self) -> String {
        match self {
            Factor::Overtime { periods, points } => format!(
                "Overtime added {} points across {} extra period{}",
                points,
                periods,
                if *periods == 1 { "" } else { "s" }
            ),
            Factor::HighPacePeriod { label, pace, points } => {
                format!("{} ran at {:.2} points per minute ({} points)", label, pace, points)
            }
            Factor::SecondHalfSurge { first, second } => format!(
                "Second-half surge: {} points after {} in the first",
                second, first
            ),
            Factor::LateScoring { points } => {
                format!("{} points scored in the final two minutes of regulation", points)
            }
            Factor::FreeThrowFrenzy { points } => {
                format!("{} free-throw points in the final two minutes", points)
            }
            Factor::BigRun { points, label } => {
                format!("A {}-point scoring run in the {}", points, label)
            }
        }
    }
}

pub fn collect_factors(breakdown: &ScoringBreakdown, thresholds: &NarrativeThresholds) -> Vec<Factor> {
    let mut factors = Vec::new();

    if breakdown.went_to_ot {
        factors.push(Factor::Overtime {
            periods: breakdown.ot_periods,
            points: breakdown.overtime_points(),
        });
    }

    for split in &breakdown.period_splits {
        if split.pace > thresholds.high_pace_ppm {
            factors.push(Factor::HighPacePeriod {
                label: split.label.clone(),
                pace: split.pace,
                points: split.total_points,
            });
        }
    }

    if let Some((first, second)) = breakdown.regulation_halves() {
        if second >= first.saturating_add(thresholds.surge_margin) {
            factors.push(Factor::SecondHalfSurge { first, second });
        }
    }

    if breakdown.final_two_min_points > thresholds.late_points {
        factors.push(Factor::LateScoring {
            points: breakdown.final_two_min_points,
        });
    }

    if breakdown.final_two_min_ft_points > thresholds.free_throw_frenzy_points {
        factors.push(Factor::FreeThrowFrenzy {
            points: breakdown.final_two_min_ft_points,
        });
    }

    if let Some(run) = &breakdown.biggest_run {
        if run.points > thresholds.notable_run_points {
            let label = breakdown
                .split(run.period)
                .map(|s| s.label.clone())
                .unwrap_or_else(|| format!("period {}", run.period));
            factors.push(Factor::BigRun {
                points: run.points,
                label,
            });
        }
    }

    factors
}

fn margin_phrase(final_total: u32, line: Option<f64>) -> String {
    match line {
        Some(line) => {
            let margin = final_total as f64 - line;
            if margin > 0.0 {
                format!("{:.1} points over the line of {:.1}", margin, line)
            } else if margin < 0.0 {
                format!("{:.1} points under the line of {:.1}", -margin, line)
            } else {
                format!("exactly on the line of {:.1}", line)
            }
        }
        None => "with no posted line".to_string(),
    }
}

/// Render `(summary, factor strings)` for a finished game.
pub fn summarize(
    breakdown: &ScoringBreakdown,
    line: Option<f64>,
    final_total: u32,
    thresholds: &NarrativeThresholds,
) -> (String, Vec<String>) {
    let factors = collect_factors(breakdown, thresholds);
    let margin = margin_phrase(final_total, line);

    let summary = if factors.is_empty() {
        format!(
            "Final total of {} finished {}; no single stretch of the game stood out.",
            final_total, margin
        )
    } else if let Some(Factor::Overtime { periods, points }) =
        factors.iter().find(|f| matches!(f, Factor::Overtime { .. }))
    {
        format!(
            "Overtime decided the total: {} of the {} points came in {} extra period{}, finishing {}.",
            points,
            final_total,
            periods,
            if *periods == 1 { "" } else { "s" },
            margin
        )
    } else if let Some(Factor::FreeThrowFrenzy { points }) =
        factors.iter().find(|f| matches!(f, Factor::FreeThrowFrenzy { .. }))
    {
        format!(
            "A late free-throw frenzy ({} points at the line in the final two minutes) pushed the total to {}, {}.",
            points, final_total, margin
        )
    } else if let Some(Factor::HighPacePeriod { label, pace, .. }) =
        factors.iter().find(|f| matches!(f, Factor::HighPacePeriod { .. }))
    {
        format!(
            "A {:.2} points-per-minute pace in the {} drove the total to {}, {}.",
            pace, label, final_total, margin
        )
    } else {
        format!(
            "{} factor{} shaped a final total of {}, {}.",
            factors.len(),
            if factors.len() == 1 { "" } else { "s" },
            final_total,
            margin
        )
    };

    (summary, factors.iter().map(Factor::describe).collect())
}
