use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex, MutexGuard};

pub mod models;
use models::*;

use crate::live_scores::MonitorEvent;
use crate::postgame::PostGameAnalysis;

/// Thread-safe SQLite connection pool (single connection with mutex)
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the SQLite database at the given path
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path).with_context(|| format!("opening {}", path))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::from_connection(conn)
    }

    /// Private in-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database mutex poisoned"))
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> Result<()> {
        self.conn()?.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    // ── Trigger changes ───────────────────────────────────────────────────────

    /// Append a classification change. Other monitor events are ignored.
    pub fn record_monitor_event(&self, event: &MonitorEvent) -> Result<Option<i64>> {
        let MonitorEvent::ClassificationChanged {
            game_id,
            previous,
            current,
            snapshot,
            metrics,
        } = event
        else {
            return Ok(None);
        };
        let change = TriggerChange {
            id: None,
            game_id: game_id.clone(),
            previous: previous.map(|t| t.as_str().to_string()),
            current: current.as_str().to_string(),
            elapsed_minute: metrics.elapsed_minute,
            minutes_remaining: metrics.minutes_remaining,
            current_total: snapshot.current_total,
            line: snapshot.line,
            current_pace: metrics.current_pace,
            required_pace: metrics.required_pace,
            pace_gap: metrics.pace_gap,
            detected_at: Utc::now(),
        };
        self.insert_trigger_change(&change).map(Some)
    }

    pub fn insert_trigger_change(&self, change: &TriggerChange) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO trigger_changes (
                game_id, previous, current, elapsed_minute, minutes_remaining,
                current_total, line, current_pace, required_pace, pace_gap, detected_at
             ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)",
            params![
                change.game_id,
                change.previous,
                change.current,
                change.elapsed_minute,
                change.minutes_remaining,
                change.current_total,
                change.line,
                change.current_pace,
                change.required_pace,
                change.pace_gap,
                change.detected_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Most recent changes across all games
    pub fn list_recent_trigger_changes(&self, limit: i64) -> Result<Vec<TriggerChange>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, game_id, previous, current, elapsed_minute, minutes_remaining,
                    current_total, line, current_pace, required_pace, pace_gap, detected_at
             FROM trigger_changes ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit], map_trigger_change)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Latest change per game
    pub fn latest_trigger_per_game(&self) -> Result<Vec<TriggerChange>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, game_id, previous, current, elapsed_minute, minutes_remaining,
                    current_total, line, current_pace, required_pace, pace_gap, detected_at
             FROM trigger_changes
             WHERE id IN (SELECT MAX(id) FROM trigger_changes GROUP BY game_id)
             ORDER BY game_id",
        )?;
        let rows = stmt
            .query_map([], map_trigger_change)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ── Post-game analyses ────────────────────────────────────────────────────

    /// Upsert the analysis for a game (re-runs replace the earlier row)
    pub fn upsert_analysis(&self, analysis: &PostGameAnalysis) -> Result<()> {
        let body = serde_json::to_string(analysis)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO postgame_analyses (game_id, line, final_total, narrative, body, created_at)
             VALUES (?1,?2,?3,?4,?5,?6)
             ON CONFLICT(game_id) DO UPDATE SET
                line=excluded.line,
                final_total=excluded.final_total,
                narrative=excluded.narrative,
                body=excluded.body,
                created_at=excluded.created_at",
            params![
                analysis.game_id,
                analysis.line,
                analysis.final_total,
                analysis.narrative,
                body,
                Utc::now(),
            ],
        )?;
        Ok(())
    }

    pub fn get_analysis(&self, game_id: &str) -> Result<Option<StoredAnalysis>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT game_id, body, created_at FROM postgame_analyses WHERE game_id = ?1",
        )?;
        let mut rows = stmt.query_map(params![game_id], map_raw_analysis)?;
        match rows.next() {
            Some(row) => Ok(Some(decode_analysis(row?)?)),
            None => Ok(None),
        }
    }

    pub fn list_analyses(&self, limit: i64) -> Result<Vec<StoredAnalysis>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT game_id, body, created_at FROM postgame_analyses
             ORDER BY created_at DESC LIMIT ?1",
        )?;
        let raw = stmt
            .query_map(params![limit], map_raw_analysis)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raw.into_iter().map(decode_analysis).collect()
    }

    // ── Stats ─────────────────────────────────────────────────────────────────

    pub fn get_stats(&self) -> Result<Stats> {
        let conn = self.conn()?;
        let count = |sql: &str| -> rusqlite::Result<i64> { conn.query_row(sql, [], |r| r.get(0)) };
        Ok(Stats {
            trigger_changes: count("SELECT COUNT(*) FROM trigger_changes")?,
            games_seen: count("SELECT COUNT(DISTINCT game_id) FROM trigger_changes")?,
            analyses: count("SELECT COUNT(*) FROM postgame_analyses")?,
            over_triggers: count("SELECT COUNT(*) FROM trigger_changes WHERE current='OVER'")?,
            triple_dipper_triggers: count(
                "SELECT COUNT(*) FROM trigger_changes WHERE current='TRIPLE_DIPPER'",
            )?,
            golden_zone_triggers: count(
                "SELECT COUNT(*) FROM trigger_changes WHERE current='GOLDEN_ZONE'",
            )?,
        })
    }
}

// ── SQL helpers ────────────────────────────────────────────────────────────────

fn map_trigger_change(row: &rusqlite::Row) -> rusqlite::Result<TriggerChange> {
    Ok(TriggerChange {
        id: row.get(0)?,
        game_id: row.get(1)?,
        previous: row.get(2)?,
        current: row.get(3)?,
        elapsed_minute: row.get(4)?,
        minutes_remaining: row.get(5)?,
        current_total: row.get(6)?,
        line: row.get(7)?,
        current_pace: row.get(8)?,
        required_pace: row.get(9)?,
        pace_gap: row.get(10)?,
        detected_at: row.get(11)?,
    })
}

type RawAnalysis = (String, String, chrono::DateTime<Utc>);

fn map_raw_analysis(row: &rusqlite::Row) -> rusqlite::Result<RawAnalysis> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn decode_analysis((game_id, body, created_at): RawAnalysis) -> Result<StoredAnalysis> {
    let analysis = serde_json::from_str(&body)
        .with_context(|| format!("decoding stored analysis for {}", game_id))?;
    Ok(StoredAnalysis {
        game_id,
        analysis,
        created_at,
    })
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS trigger_changes (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    game_id           TEXT    NOT NULL,
    previous          TEXT,
    current           TEXT    NOT NULL,
    elapsed_minute    REAL    NOT NULL,
    minutes_remaining REAL    NOT NULL,
    current_total     INTEGER NOT NULL,
    line              REAL,
    current_pace      REAL,
    required_pace     REAL,
    pace_gap          REAL,
    detected_at       TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS postgame_analyses (
    game_id     TEXT    PRIMARY KEY,
    line        REAL,
    final_total INTEGER NOT NULL,
    narrative   TEXT    NOT NULL,
    body        TEXT    NOT NULL,
    created_at  TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_trigger_changes_game ON trigger_changes(game_id);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GameSnapshot, GameStatus};
    use crate::pace::{derive_metrics, PaceConfig, Trigger};
    use crate::postgame::{analyze_completed_game, RawPlay};

    fn change_event(game_id: &str, current: Trigger, previous: Option<Trigger>) -> MonitorEvent {
        let snapshot = GameSnapshot {
            game_id: game_id.into(),
            status: GameStatus::InProgress,
            total_regulation_minutes: 40.0,
            minutes_remaining_reg: 20.0,
            current_total: 50,
            line: Some(145.0),
            current_pace: Some(2.5),
            required_pace: Some(4.75),
            period: 2,
            clock_seconds: 1200,
        };
        MonitorEvent::ClassificationChanged {
            game_id: game_id.into(),
            previous,
            current,
            metrics: derive_metrics(&snapshot),
            snapshot,
        }
    }

    #[test]
    fn records_changes_and_latest_per_game() {
        let db = Database::open_in_memory().unwrap();
        db.record_monitor_event(&change_event("a", Trigger::GoldenZone, None)).unwrap();
        db.record_monitor_event(&change_event("a", Trigger::TripleDipper, Some(Trigger::GoldenZone)))
            .unwrap();
        db.record_monitor_event(&change_event("b", Trigger::Over, None)).unwrap();
        let skipped = db
            .record_monitor_event(&MonitorEvent::FeedError {
                game_id: "a".into(),
                error: "boom".into(),
            })
            .unwrap();
        assert!(skipped.is_none());

        let recent = db.list_recent_trigger_changes(10).unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].game_id, "b");

        let latest = db.latest_trigger_per_game().unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].current, "TRIPLE_DIPPER");
        assert_eq!(latest[0].previous.as_deref(), Some("GOLDEN_ZONE"));
        assert_eq!(latest[1].current, "OVER");

        let stats = db.get_stats().unwrap();
        assert_eq!(stats.trigger_changes, 3);
        assert_eq!(stats.games_seen, 2);
        assert_eq!(stats.triple_dipper_triggers, 1);
    }

    #[test]
    fn analyses_upsert_and_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let plays = vec![RawPlay {
            period: Some(1),
            clock: "10:00".into(),
            scoring_play: true,
            score_value: Some(2),
            team_id: Some("H".into()),
            text: "Layup".into(),
        }];
        let config = PaceConfig::default();
        let first = analyze_completed_game("g1", &plays, "H", Some(140.0), 130, &config);
        db.upsert_analysis(&first).unwrap();
        let second = analyze_completed_game("g1", &plays, "H", Some(135.0), 130, &config);
        db.upsert_analysis(&second).unwrap();

        let stored = db.get_analysis("g1").unwrap().expect("stored");
        assert_eq!(stored.analysis.line, Some(135.0));
        assert_eq!(stored.analysis.final_total, 130);
        assert_eq!(stored.analysis.narrative, second.narrative);
        assert_eq!(db.list_analyses(10).unwrap().len(), 1);
        assert!(db.get_analysis("missing").unwrap().is_none());
    }
}
