//! Glue between the live monitor and the post-game analyzer: once a game
//! reports final, pull its play list and posted line and run the analysis.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::live_scores::{LineFeed, PlayListFeed};
use crate::models::GameSnapshot;
use crate::pace::PaceConfig;
use crate::postgame::{analyze_completed_game, PostGameAnalysis};

/// Analyze a completed game. A missing play list is an error; a missing line
/// only drops the margin from the narrative, and the final snapshot's total
/// stands in when the line feed cannot supply one.
pub async fn analyze_final_game(
    final_snapshot: &GameSnapshot,
    plays: &dyn PlayListFeed,
    lines: &dyn LineFeed,
    config: &PaceConfig,
) -> Result<PostGameAnalysis> {
    let game_id = final_snapshot.game_id.as_str();
    let play_list = plays
        .fetch_play_list(game_id)
        .await
        .with_context(|| format!("fetching play list for {}", game_id))?;

    let (line, final_total) = match lines.fetch_line(game_id).await {
        Ok(posted) if posted.final_total > 0 => (posted.line, posted.final_total),
        Ok(posted) => (posted.line, final_snapshot.current_total),
        Err(e) => {
            warn!("[{}] Line unavailable, analyzing without it: {}", game_id, e);
            (final_snapshot.line, final_snapshot.current_total)
        }
    };

    let analysis = analyze_completed_game(
        game_id,
        &play_list.plays,
        &play_list.home_team_id,
        line,
        final_total,
        config,
    );
    info!(
        "[{}] Post-game: {} plays, final {} ({})",
        game_id,
        play_list.plays.len(),
        final_total,
        analysis.narrative
    );
    Ok(analysis)
}
