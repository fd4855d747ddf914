//! Normalisation of a provider's raw play list.
//!
//! A bad record never sinks the sequence: an unparseable clock becomes zero
//! seconds, a missing period or point value becomes zero.

use serde::{Deserialize, Serialize};

/// A play record as handed over by the play-list feed, before normalisation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawPlay {
    pub period: Option<u32>,
    /// "mm:ss" remaining in the period.
    pub clock: String,
    pub scoring_play: bool,
    pub score_value: Option<u32>,
    pub team_id: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Home,
    Away,
}

/// One normalised entry of a game's event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayEvent {
    /// Position in the provider's emitted order.
    pub sequence: usize,
    pub period: u32,
    /// Seconds remaining in `period`.
    pub clock_seconds: u32,
    pub is_scoring: bool,
    /// Zero for non-scoring plays.
    pub points: u32,
    pub team_id: Option<String>,
    pub side: Side,
    pub text: String,
}

impl PlayEvent {
    pub fn is_free_throw(&self, marker: &str) -> bool {
        !marker.is_empty() && self.text.to_lowercase().contains(&marker.to_lowercase())
    }
}

/// Parse "mm:ss" (or a bare seconds value such as "45.3") into whole seconds.
/// Anything malformed yields zero.
pub fn parse_clock(clock: &str) -> u32 {
    let clock = clock.trim();
    match clock.split_once(':') {
        Some((mins, secs)) => {
            let (Ok(mins), Some(secs)) = (mins.trim().parse::<u32>(), parse_seconds(secs)) else {
                return 0;
            };
            if secs >= 60 {
                return 0;
            }
            mins.checked_mul(60)
                .and_then(|s| s.checked_add(secs))
                .unwrap_or(0)
        }
        None => parse_seconds(clock).unwrap_or(0),
    }
}

fn parse_seconds(s: &str) -> Option<u32> {
    let v = s.trim().parse::<f64>().ok()?;
    if !v.is_finite() || v < 0.0 {
        return None;
    }
    Some(v.floor() as u32)
}

/// Largest value a single play can score (and-one on a three). Anything
/// above is a malformed feed value and counts as zero.
pub const MAX_PLAY_POINTS: u32 = 4;

/// Normalise a raw play list, tagging each play's side against `home_team_id`.
pub fn parse_play_sequence(raw: &[RawPlay], home_team_id: &str) -> Vec<PlayEvent> {
    raw.iter()
        .enumerate()
        .map(|(sequence, play)| {
            let points = play
                .score_value
                .filter(|p| *p <= MAX_PLAY_POINTS)
                .unwrap_or(0);
            let is_scoring = play.scoring_play && points > 0;
            let side = match play.team_id.as_deref() {
                Some(id) if id == home_team_id => Side::Home,
                _ => Side::Away,
            };
            PlayEvent {
                sequence,
                period: play.period.unwrap_or(0),
                clock_seconds: parse_clock(&play.clock),
                is_scoring,
                points: if is_scoring { points } else { 0 },
                team_id: play.team_id.clone(),
                side,
                text: play.text.clone(),
            }
        })
        .collect()
}
