//! Period splits, scoring runs and late-game concentration.
//!
//! A single pass over the normalised sequence. A run is a streak of
//! consecutive scoring plays (either side); any non-scoring play or a change
//! of period closes it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::plays::{PlayEvent, Side};
use crate::pace::{NarrativeThresholds, SportRules};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodSplit {
    pub period: u32,
    pub label: String,
    pub is_overtime: bool,
    pub home_points: u32,
    pub away_points: u32,
    pub total_points: u32,
    pub length_minutes: f64,
    /// Points per minute over the period length.
    pub pace: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringRun {
    pub points: u32,
    pub home_points: u32,
    pub away_points: u32,
    pub plays: usize,
    pub period: u32,
    pub start_clock_seconds: u32,
    pub end_clock_seconds: u32,
    pub duration_seconds: u32,
    pub start_sequence: usize,
    pub end_sequence: usize,
}

/// Everything the run analyzer extracts from one game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringBreakdown {
    /// Regulation periods of the sport the game was analyzed under.
    pub regulation_periods: u32,
    pub period_splits: Vec<PeriodSplit>,
    pub biggest_run: Option<ScoringRun>,
    pub final_two_min_points: u32,
    pub final_two_min_ft_points: u32,
    pub went_to_ot: bool,
    pub ot_periods: u32,
}

impl ScoringBreakdown {
    pub fn overtime_points(&self) -> u32 {
        self.period_splits
            .iter()
            .filter(|s| s.is_overtime)
            .fold(0u32, |acc, s| acc.saturating_add(s.total_points))
    }

    /// Points in the first and second regulation halves (quarters 1-2 and
    /// 3-4 under four periods). `None` unless both halves have a split.
    pub fn regulation_halves(&self) -> Option<(u32, u32)> {
        let half = self.regulation_periods / 2;
        if half == 0 {
            return None;
        }
        let mut first = None;
        let mut second = None;
        for s in &self.period_splits {
            let slot = match s.period {
                p if p >= 1 && p <= half => &mut first,
                p if p > half && p <= self.regulation_periods => &mut second,
                _ => continue,
            };
            *slot = Some(slot.unwrap_or(0u32).saturating_add(s.total_points));
        }
        Some((first?, second?))
    }

    pub fn split(&self, period: u32) -> Option<&PeriodSplit> {
        self.period_splits.iter().find(|s| s.period == period)
    }
}

struct OpenRun {
    run: ScoringRun,
}

impl OpenRun {
    fn start(play: &PlayEvent) -> Self {
        let mut run = ScoringRun {
            points: 0,
            home_points: 0,
            away_points: 0,
            plays: 0,
            period: play.period,
            start_clock_seconds: play.clock_seconds,
            end_clock_seconds: play.clock_seconds,
            duration_seconds: 0,
            start_sequence: play.sequence,
            end_sequence: play.sequence,
        };
        Self::add_to(&mut run, play);
        OpenRun { run }
    }

    fn extend(&mut self, play: &PlayEvent) {
        Self::add_to(&mut self.run, play);
        self.run.end_clock_seconds = play.clock_seconds;
        self.run.end_sequence = play.sequence;
    }

    fn add_to(run: &mut ScoringRun, play: &PlayEvent) {
        run.points = run.points.saturating_add(play.points);
        run.plays += 1;
        match play.side {
            Side::Home => run.home_points = run.home_points.saturating_add(play.points),
            Side::Away => run.away_points = run.away_points.saturating_add(play.points),
        }
    }

    fn close(mut self) -> ScoringRun {
        self.run.duration_seconds = self
            .run
            .start_clock_seconds
            .saturating_sub(self.run.end_clock_seconds);
        self.run
    }
}

/// Keeps the largest qualifying run; ties go to the earliest.
struct RunTracker {
    min_points: u32,
    best: Option<ScoringRun>,
}

impl RunTracker {
    fn offer(&mut self, open: Option<OpenRun>) {
        let Some(open) = open else { return };
        let run = open.close();
        if run.points < self.min_points {
            return;
        }
        let better = match &self.best {
            Some(best) => run.points > best.points,
            None => true,
        };
        if better {
            self.best = Some(run);
        }
    }
}

pub fn analyze_scoring(
    events: &[PlayEvent],
    sport: &SportRules,
    thresholds: &NarrativeThresholds,
) -> ScoringBreakdown {
    // period -> (home, away)
    let mut per_period: BTreeMap<u32, (u32, u32)> = BTreeMap::new();
    let mut tracker = RunTracker {
        min_points: thresholds.min_run_points,
        best: None,
    };
    let mut current: Option<OpenRun> = None;
    let mut final_two_min_points = 0u32;
    let mut final_two_min_ft_points = 0u32;
    let mut max_period = 0u32;

    for play in events {
        max_period = max_period.max(play.period);
        if play.period > 0 {
            per_period.entry(play.period).or_insert((0, 0));
        }

        if !play.is_scoring {
            tracker.offer(current.take());
            continue;
        }

        if let Some(bucket) = per_period.get_mut(&play.period) {
            match play.side {
                Side::Home => bucket.0 = bucket.0.saturating_add(play.points),
                Side::Away => bucket.1 = bucket.1.saturating_add(play.points),
            }
        }

        let same_period = current
            .as_ref()
            .is_some_and(|open| open.run.period == play.period);
        match current.as_mut() {
            Some(open) if same_period => open.extend(play),
            _ => {
                tracker.offer(current.take());
                current = Some(OpenRun::start(play));
            }
        }

        if play.period == sport.regulation_periods
            && play.clock_seconds <= thresholds.final_window_seconds
        {
            final_two_min_points = final_two_min_points.saturating_add(play.points);
            if play.is_free_throw(&thresholds.free_throw_marker) {
                final_two_min_ft_points = final_two_min_ft_points.saturating_add(play.points);
            }
        }
    }
    tracker.offer(current.take());

    let period_splits = per_period
        .into_iter()
        .map(|(period, (home_points, away_points))| {
            let length_minutes = sport.period_minutes(period);
            let total_points = home_points.saturating_add(away_points);
            PeriodSplit {
                period,
                label: sport.period_label(period),
                is_overtime: sport.is_overtime(period),
                home_points,
                away_points,
                total_points,
                length_minutes,
                pace: if length_minutes > 0.0 {
                    total_points as f64 / length_minutes
                } else {
                    0.0
                },
            }
        })
        .collect();

    let ot_periods = max_period.saturating_sub(sport.regulation_periods);
    ScoringBreakdown {
        regulation_periods: sport.regulation_periods,
        period_splits,
        biggest_run: tracker.best,
        final_two_min_points,
        final_two_min_ft_points,
        went_to_ot: ot_periods > 0,
        ot_periods,
    }
}
