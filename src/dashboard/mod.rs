use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::db::Database;
use crate::live_scores::MonitorHandle;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub monitor: MonitorHandle,
    /// Sport key shown in the page header.
    pub sport: String,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

impl LimitQuery {
    fn limit_or(&self, default: i64) -> i64 {
        self.limit.unwrap_or(default).clamp(1, 500)
    }
}

/// Build the Axum router for the dashboard.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/stats", get(stats_handler))
        .route("/api/triggers", get(triggers_handler))
        .route("/api/triggers/latest", get(latest_triggers_handler))
        .route("/api/analyses", get(analyses_handler))
        .route("/api/analyses/:game_id", get(analysis_handler))
        .route("/api/games", get(tracked_games_handler))
        .route(
            "/api/games/:game_id/track",
            post(track_handler).delete(untrack_handler),
        )
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

async fn index_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let html = DASHBOARD_HTML.replace(
        r#"<body>"#,
        &format!(r#"<body data-sport="{}">"#, state.sport),
    );
    Html(html)
}

/// GET /api/stats
async fn stats_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .db
        .get_stats()
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// GET /api/triggers?limit=100
async fn triggers_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .db
        .list_recent_trigger_changes(query.limit_or(100))
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// GET /api/triggers/latest
async fn latest_triggers_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .db
        .latest_trigger_per_game()
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// GET /api/analyses?limit=50
async fn analyses_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .db
        .list_analyses(query.limit_or(50))
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// GET /api/analyses/:game_id
async fn analysis_handler(
    State(state): State<Arc<AppState>>,
    Path(game_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match state.db.get_analysis(&game_id) {
        Ok(Some(analysis)) => Ok(Json(analysis)),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            format!("no analysis for game {}", game_id),
        )),
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

/// GET /api/games
async fn tracked_games_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .monitor
        .tracked_games()
        .await
        .map(Json)
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
}

/// POST /api/games/:game_id/track
async fn track_handler(
    State(state): State<Arc<AppState>>,
    Path(game_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if !is_valid_game_id(&game_id) {
        return Err((StatusCode::BAD_REQUEST, format!("invalid game id {:?}", game_id)));
    }
    state
        .monitor
        .start_monitoring([game_id])
        .await
        .map(|_| StatusCode::ACCEPTED)
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
}

/// Upstream ids are short ASCII tokens ("401638579"); anything else is refused
/// before it can reach the monitor or the page.
pub fn is_valid_game_id(game_id: &str) -> bool {
    !game_id.is_empty()
        && game_id.len() <= 64
        && game_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// DELETE /api/games/:game_id/track
async fn untrack_handler(
    State(state): State<Arc<AppState>>,
    Path(game_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .monitor
        .stop_monitoring(&game_id)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
}

/// Embedded single-file dashboard (HTML + CSS + JS)
const DASHBOARD_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Pace Signals</title>
<style>
  :root {
    --bg: #0f1117;
    --card: #1a1d27;
    --border: #2a2d3a;
    --accent: #6c63ff;
    --green: #00c896;
    --amber: #ffb020;
    --red: #ff4f6a;
    --text: #e0e0e0;
    --muted: #8888aa;
  }
  * { box-sizing: border-box; margin: 0; padding: 0; }
  body { background: var(--bg); color: var(--text); font-family: 'Segoe UI', system-ui, sans-serif; }
  header { display: flex; align-items: center; gap: 1rem; padding: 1rem 2rem; border-bottom: 1px solid var(--border); }
  header h1 { font-size: 1.4rem; font-weight: 700; }
  .badge { padding: .2rem .6rem; border-radius: 4px; font-size: .75rem; font-weight: 700; text-transform: uppercase; background: var(--accent); }
  main { padding: 1.5rem 2rem; display: grid; gap: 1.5rem; }
  .stats-grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(180px, 1fr)); gap: 1rem; }
  .stat-card { background: var(--card); border: 1px solid var(--border); border-radius: 10px; padding: 1.2rem; }
  .stat-card .label { color: var(--muted); font-size: .8rem; text-transform: uppercase; margin-bottom: .4rem; }
  .stat-card .value { font-size: 1.7rem; font-weight: 700; }
  .panel { background: var(--card); border: 1px solid var(--border); border-radius: 10px; overflow: hidden; }
  .panel-header { padding: .9rem 1.2rem; border-bottom: 1px solid var(--border); font-weight: 600; display: flex; justify-content: space-between; align-items: center; }
  table { width: 100%; border-collapse: collapse; }
  th { padding: .7rem 1rem; text-align: left; font-size: .75rem; text-transform: uppercase; color: var(--muted); border-bottom: 1px solid var(--border); }
  td { padding: .65rem 1rem; font-size: .88rem; border-bottom: 1px solid #1e2130; }
  tr:last-child td { border-bottom: none; }
  .OVER { color: var(--green); font-weight: 700; }
  .TRIPLE_DIPPER { color: var(--red); font-weight: 700; }
  .GOLDEN_ZONE { color: var(--amber); font-weight: 700; }
  .NONE { color: var(--muted); }
  form { display: flex; gap: .5rem; }
  input, button { background: var(--bg); color: var(--text); border: 1px solid var(--border); border-radius: 6px; padding: .35rem .6rem; }
  button { cursor: pointer; }
</style>
</head>
<body>
<header>
  <h1>Pace Signals</h1>
  <span class="badge" id="sport"></span>
</header>
<main>
  <div class="stats-grid" id="stats"></div>

  <div class="panel">
    <div class="panel-header">
      <span>Tracked games</span>
      <form id="track-form"><input id="track-id" placeholder="game id"><button>Track</button></form>
    </div>
    <table><thead><tr><th>Game</th><th>Classification</th><th>Elapsed</th><th>Total</th><th>Line</th><th>Pace</th><th>Required</th><th></th></tr></thead>
    <tbody id="latest"></tbody></table>
  </div>

  <div class="panel">
    <div class="panel-header">Recent changes</div>
    <table><thead><tr><th>Time</th><th>Game</th><th>From</th><th>To</th><th>Gap</th></tr></thead>
    <tbody id="changes"></tbody></table>
  </div>

  <div class="panel">
    <div class="panel-header">Post-game narratives</div>
    <table><thead><tr><th>Game</th><th>Final</th><th>Line</th><th>Narrative</th></tr></thead>
    <tbody id="analyses"></tbody></table>
  </div>
</main>
<script>
const esc = (v) => String(v ?? '').replace(/[&<>"']/g, ch => ({ '&': '&amp;', '<': '&lt;', '>': '&gt;', '"': '&quot;', "'": '&#39;' }[ch]));
const fmt = (v, d = 2) => v === null || v === undefined ? '-' : Number(v).toFixed(d);
document.getElementById('sport').textContent = document.body.dataset.sport || '';

async function getJson(path) {
  const res = await fetch(path);
  return res.ok ? res.json() : [];
}

async function untrack(id) {
  await fetch(`/api/games/${encodeURIComponent(id)}/track`, { method: 'DELETE' });
  refresh();
}

document.getElementById('latest').addEventListener('click', (e) => {
  const id = e.target.dataset.untrack;
  if (id) untrack(id);
});

document.getElementById('track-form').addEventListener('submit', async (e) => {
  e.preventDefault();
  const id = document.getElementById('track-id').value.trim();
  if (!id) return;
  await fetch(`/api/games/${encodeURIComponent(id)}/track`, { method: 'POST' });
  document.getElementById('track-id').value = '';
  refresh();
});

async function refresh() {
  const [stats, latest, changes, analyses, tracked] = await Promise.all([
    getJson('/api/stats'), getJson('/api/triggers/latest'), getJson('/api/triggers?limit=50'),
    getJson('/api/analyses?limit=20'), getJson('/api/games'),
  ]);

  document.getElementById('stats').innerHTML = [
    ['Tracked', tracked.length], ['Changes', stats.trigger_changes], ['Games seen', stats.games_seen],
    ['Over', stats.over_triggers], ['Triple dipper', stats.triple_dipper_triggers],
    ['Golden zone', stats.golden_zone_triggers], ['Analyses', stats.analyses],
  ].map(([l, v]) => `<div class="stat-card"><div class="label">${l}</div><div class="value">${v ?? 0}</div></div>`).join('');

  const byGame = Object.fromEntries(latest.map(c => [c.game_id, c]));
  document.getElementById('latest').innerHTML = tracked.map(id => {
    const c = byGame[id];
    const cls = esc(c ? c.current : 'NONE');
    return `<tr><td>${esc(id)}</td><td class="${cls}">${c ? cls : 'pending'}</td>
      <td>${c ? fmt(c.elapsed_minute, 1) : '-'}</td><td>${c ? c.current_total : '-'}</td>
      <td>${c ? fmt(c.line, 1) : '-'}</td><td>${c ? fmt(c.current_pace) : '-'}</td><td>${c ? fmt(c.required_pace) : '-'}</td>
      <td><button data-untrack="${esc(id)}">Stop</button></td></tr>`;
  }).join('');

  document.getElementById('changes').innerHTML = changes.map(c =>
    `<tr><td>${new Date(c.detected_at).toLocaleTimeString()}</td><td>${esc(c.game_id)}</td>
      <td class="${esc(c.previous || 'NONE')}">${esc(c.previous || '-')}</td><td class="${esc(c.current)}">${esc(c.current)}</td>
      <td>${fmt(c.pace_gap)}</td></tr>`).join('');

  document.getElementById('analyses').innerHTML = analyses.map(a =>
    `<tr><td>${esc(a.game_id)}</td><td>${a.analysis.final_total}</td><td>${fmt(a.analysis.line, 1)}</td>
      <td>${esc(a.analysis.narrative)}</td></tr>`).join('');
}

refresh();
setInterval(refresh, 5000);
</script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live_scores::{start_pace_monitor, FeedError, MonitorSettings, SnapshotFeed};
    use crate::models::GameSnapshot;
    use crate::pace::TriggerThresholds;
    use async_trait::async_trait;
    use axum::response::IntoResponse;

    struct NeverFeed;

    #[async_trait]
    impl SnapshotFeed for NeverFeed {
        async fn fetch_snapshot(&self, game_id: &str) -> Result<GameSnapshot, FeedError> {
            Err(FeedError::NotFound(game_id.to_string()))
        }

        fn name(&self) -> &str {
            "never"
        }
    }

    fn state() -> (Arc<AppState>, tokio::sync::mpsc::Receiver<crate::live_scores::MonitorEvent>) {
        let (monitor, events) = start_pace_monitor(
            Arc::new(NeverFeed),
            TriggerThresholds::default(),
            MonitorSettings::default(),
        );
        let state = AppState {
            db: Database::open_in_memory().unwrap(),
            monitor,
            sport: "ncaab".to_string(),
        };
        (Arc::new(state), events)
    }

    #[tokio::test]
    async fn track_and_untrack_through_handlers() {
        let (state, _events) = state();

        let res = track_handler(State(state.clone()), Path("401".to_string()))
            .await
            .into_response();
        assert_eq!(res.status(), StatusCode::ACCEPTED);
        assert_eq!(state.monitor.tracked_games().await.unwrap(), vec!["401"]);

        let res = untrack_handler(State(state.clone()), Path("401".to_string()))
            .await
            .into_response();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert!(state.monitor.tracked_games().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn track_rejects_markup_in_game_id() {
        let (state, _events) = state();
        let res = track_handler(
            State(state.clone()),
            Path("<script>alert(1)</script>".to_string()),
        )
        .await
        .into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(state.monitor.tracked_games().await.unwrap().is_empty());
    }

    #[test]
    fn game_id_validation() {
        assert!(is_valid_game_id("401638579"));
        assert!(is_valid_game_id("nba-0042_3"));
        assert!(!is_valid_game_id(""));
        assert!(!is_valid_game_id("1' onmouseover='x"));
        assert!(!is_valid_game_id(&"9".repeat(65)));
    }

    #[tokio::test]
    async fn missing_analysis_is_not_found() {
        let (state, _events) = state();
        let res = analysis_handler(State(state), Path("nope".to_string()))
            .await
            .into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
