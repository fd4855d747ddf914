pub mod metrics;
pub mod rules;
pub mod trigger;

pub use metrics::{derive_metrics, DerivedMetrics};
pub use rules::{NarrativeThresholds, PaceConfig, SportRules, TriggerThresholds};
pub use trigger::{classify_metrics, Trigger};

use crate::models::GameSnapshot;

/// Derive metrics for a snapshot and classify them in one pass.
pub fn evaluate(snapshot: &GameSnapshot, thresholds: &TriggerThresholds) -> (DerivedMetrics, Trigger) {
    let metrics = derive_metrics(snapshot);
    let trigger = classify_metrics(&metrics, thresholds);
    (metrics, trigger)
}

/// Synchronous, side-effect-free trigger classification of one snapshot.
pub fn classify(snapshot: &GameSnapshot, thresholds: &TriggerThresholds) -> Trigger {
    evaluate(snapshot, thresholds).1
}
