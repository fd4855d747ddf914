//! Post-game path: play list -> normalised sequence -> scoring breakdown ->
//! narrative. One synchronous pass per completed game, deterministic for a
//! given input.

pub mod narrative;
pub mod plays;
pub mod runs;

pub use narrative::{collect_factors, summarize, Factor};
pub use plays::{parse_clock, parse_play_sequence, PlayEvent, RawPlay, Side};
pub use runs::{analyze_scoring, PeriodSplit, ScoringBreakdown, ScoringRun};

use serde::{Deserialize, Serialize};

use crate::pace::PaceConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostGameAnalysis {
    pub game_id: String,
    pub line: Option<f64>,
    pub final_total: u32,
    /// `final_total - line`, when a line was posted.
    pub margin: Option<f64>,
    pub went_to_ot: bool,
    pub ot_periods: u32,
    pub period_splits: Vec<PeriodSplit>,
    pub biggest_run: Option<ScoringRun>,
    pub final_two_min_points: u32,
    pub final_two_min_ft_points: u32,
    pub narrative: String,
    pub factors: Vec<String>,
}

pub fn analyze_completed_game(
    game_id: &str,
    play_list: &[RawPlay],
    home_team_id: &str,
    line: Option<f64>,
    final_total: u32,
    config: &PaceConfig,
) -> PostGameAnalysis {
    let events = parse_play_sequence(play_list, home_team_id);
    let breakdown = analyze_scoring(&events, &config.sport, &config.narrative);
    let (narrative, factors) = summarize(&breakdown, line, final_total, &config.narrative);

    PostGameAnalysis {
        game_id: game_id.to_string(),
        line,
        final_total,
        margin: line.map(|l| final_total as f64 - l),
        went_to_ot: breakdown.went_to_ot,
        ot_periods: breakdown.ot_periods,
        period_splits: breakdown.period_splits,
        biggest_run: breakdown.biggest_run,
        final_two_min_points: breakdown.final_two_min_points,
        final_two_min_ft_points: breakdown.final_two_min_ft_points,
        narrative,
        factors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn play(period: u32, clock: &str, points: u32, team: &str, text: &str) -> RawPlay {
        RawPlay {
            period: Some(period),
            clock: clock.into(),
            scoring_play: points > 0,
            score_value: Some(points),
            team_id: Some(team.into()),
            text: text.into(),
        }
    }

    fn overtime_game() -> Vec<RawPlay> {
        let mut plays = Vec::new();
        // Regulation: alternating scores broken by misses.
        for i in 0..30u32 {
            let clock = format!("{}:{:02}", 19 - (i % 19), (i * 7) % 60);
            plays.push(play(1, &clock, 2, if i % 2 == 0 { "H" } else { "A" }, "Layup"));
            plays.push(play(1, &clock, 0, "A", "Missed Jumper"));
        }
        for i in 0..30u32 {
            let clock = format!("{}:{:02}", 19 - (i % 19), (i * 11) % 60);
            plays.push(play(2, &clock, 2, if i % 2 == 0 { "A" } else { "H" }, "Jumper"));
            plays.push(play(2, &clock, 0, "H", "Defensive Rebound"));
        }
        plays.push(play(2, "0:30", 1, "H", "Jones made Free Throw."));
        plays.push(play(2, "0:30", 1, "H", "Jones made Free Throw."));
        // Overtime burst.
        plays.push(play(3, "4:30", 3, "A", "Three Pointer"));
        plays.push(play(3, "4:00", 3, "H", "Three Pointer"));
        plays.push(play(3, "3:30", 3, "A", "Three Pointer"));
        plays.push(play(3, "3:00", 3, "H", "Three Pointer"));
        plays.push(play(3, "2:30", 0, "A", "Turnover"));
        plays
    }

    #[test]
    fn overtime_game_analysis() {
        let plays = overtime_game();
        let a = analyze_completed_game("401", &plays, "H", Some(120.5), 134, &PaceConfig::default());
        assert!(a.went_to_ot);
        assert_eq!(a.ot_periods, 1);
        assert_eq!(a.period_splits.len(), 3);
        assert_eq!(a.period_splits[2].total_points, 12);
        assert_eq!(a.final_two_min_ft_points, 2);
        let run = a.biggest_run.as_ref().expect("overtime burst qualifies");
        assert_eq!(run.points, 12);
        assert_eq!(run.period, 3);
        assert!(a.narrative.starts_with("Overtime decided the total"));
        assert_eq!(a.margin, Some(13.5));
    }

    #[test]
    fn analysis_is_idempotent() {
        let plays = overtime_game();
        let config = PaceConfig::default();
        let a = analyze_completed_game("401", &plays, "H", Some(120.5), 134, &config);
        let b = analyze_completed_game("401", &plays, "H", Some(120.5), 134, &config);
        assert_eq!(a, b);
        let ja = serde_json::to_string(&a).unwrap();
        let jb = serde_json::to_string(&b).unwrap();
        assert_eq!(ja, jb);
    }

    #[test]
    fn malformed_point_values_do_not_abort_the_batch() {
        let plays = vec![
            play(1, "10:00", u32::MAX, "H", "Layup"),
            play(1, "9:30", u32::MAX, "A", "Layup"),
            play(1, "99999999:00", 2, "H", "Jumper"),
        ];
        let a = analyze_completed_game("401", &plays, "H", Some(140.0), 2, &PaceConfig::default());
        assert_eq!(a.period_splits[0].total_points, 2);
        assert_eq!(a.final_total, 2);
    }
}
