//! Snapshot trigger classification.
//!
//! Rules live in an ordered table and are evaluated top to bottom; the first
//! rule whose condition holds names the trigger. A snapshot therefore reports
//! at most one trigger even when several raw conditions hold at once.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::metrics::DerivedMetrics;
use super::rules::TriggerThresholds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trigger {
    None,
    Over,
    TripleDipper,
    GoldenZone,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::None => "NONE",
            Trigger::Over => "OVER",
            Trigger::TripleDipper => "TRIPLE_DIPPER",
            Trigger::GoldenZone => "GOLDEN_ZONE",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully-determined inputs a rule can look at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleInput {
    pub elapsed_minute: f64,
    pub minutes_remaining: f64,
    pub required_pace: f64,
    pub pace_gap: f64,
}

impl RuleInput {
    /// `None` when any pace operand is missing; no rule may fire then.
    pub fn from_metrics(metrics: &DerivedMetrics) -> Option<RuleInput> {
        Some(RuleInput {
            elapsed_minute: metrics.elapsed_minute,
            minutes_remaining: metrics.minutes_remaining,
            required_pace: metrics.required_pace?,
            pace_gap: metrics.pace_gap?,
        })
    }
}

pub type Condition = fn(&RuleInput, &TriggerThresholds) -> bool;

/// One (predicate, label) pair of the priority table.
#[derive(Clone, Copy)]
pub struct TriggerRule {
    pub trigger: Trigger,
    pub condition: Condition,
}

impl fmt::Debug for TriggerRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerRule")
            .field("trigger", &self.trigger)
            .finish()
    }
}

/// Priority order: OVER, then TRIPLE_DIPPER, then GOLDEN_ZONE.
pub const RULES: [TriggerRule; 3] = [
    TriggerRule {
        trigger: Trigger::Over,
        condition: over,
    },
    TriggerRule {
        trigger: Trigger::TripleDipper,
        condition: triple_dipper,
    },
    TriggerRule {
        trigger: Trigger::GoldenZone,
        condition: golden_zone,
    },
];

fn over(input: &RuleInput, t: &TriggerThresholds) -> bool {
    (t.over_min_elapsed..=t.over_max_elapsed).contains(&input.elapsed_minute)
        && input.pace_gap >= t.over_min_pace_gap
}

fn triple_dipper(input: &RuleInput, t: &TriggerThresholds) -> bool {
    (t.triple_dipper_min_elapsed..=t.triple_dipper_max_elapsed).contains(&input.elapsed_minute)
        && input.required_pace >= t.triple_dipper_min_required_pace
        && input.pace_gap <= t.triple_dipper_max_pace_gap
}

fn golden_zone(input: &RuleInput, t: &TriggerThresholds) -> bool {
    let deficit = -input.pace_gap;
    input.elapsed_minute >= t.golden_zone_min_elapsed
        && input.minutes_remaining > t.golden_zone_min_remaining
        && input.required_pace >= t.golden_zone_min_required_pace
        && (t.golden_zone_min_deficit..=t.golden_zone_max_deficit).contains(&deficit)
}

/// Classify pre-computed metrics against the ordered rule table.
pub fn classify_metrics(metrics: &DerivedMetrics, thresholds: &TriggerThresholds) -> Trigger {
    let Some(input) = RuleInput::from_metrics(metrics) else {
        return Trigger::None;
    };
    RULES
        .iter()
        .find(|rule| (rule.condition)(&input, thresholds))
        .map(|rule| rule.trigger)
        .unwrap_or(Trigger::None)
}
