//! Live monitor: one polling task per tracked game, coordinated by a single
//! supervisor task over channels.
//!
//! ```text
//!  MonitorHandle ──Command──▶ supervisor ──spawn/abort──▶ poll_game (per game)
//!                                 ▲                            │
//!                                 └──────(generation, event)───┘
//!                                 │
//!                                 ▼ only if still tracked
//!                        Receiver<MonitorEvent>
//! ```
//!
//! Each game task fetches sequentially, so there is never more than one
//! outstanding fetch per game. The supervisor owns the tracked-game table; no
//! state is shared between tasks.

pub mod espn;
pub mod provider;

pub use espn::EspnFeed;
pub use provider::{
    FeedError, GameDiscovery, LineFeed, PlayList, PlayListFeed, PostedLine, SnapshotFeed,
};

use anyhow::{anyhow, Result};
use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::models::{GameSnapshot, GameStatus};
use crate::pace::{self, DerivedMetrics, Trigger, TriggerThresholds};

/// Snapshots may report the same clock twice; only a real increase is a reset.
const CLOCK_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Minimum re-fetch interval per game.
    pub poll_interval: Duration,
    pub fetch_timeout: Duration,
    /// When set, every game reports its current classification this often.
    pub heartbeat_interval: Option<Duration>,
    /// Upper bound of the random delay before a game's first fetch.
    pub max_start_jitter: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        MonitorSettings {
            poll_interval: Duration::from_secs(15),
            fetch_timeout: Duration::from_secs(5),
            heartbeat_interval: None,
            max_start_jitter: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorEvent {
    ClassificationChanged {
        game_id: String,
        previous: Option<Trigger>,
        current: Trigger,
        snapshot: GameSnapshot,
        metrics: DerivedMetrics,
    },
    Heartbeat {
        game_id: String,
        classification: Option<Trigger>,
    },
    /// Upstream fetch failed; the previous classification still stands.
    FeedError { game_id: String, error: String },
    /// Game reported final and is no longer tracked.
    Final { game_id: String, snapshot: GameSnapshot },
}

impl MonitorEvent {
    pub fn game_id(&self) -> &str {
        match self {
            MonitorEvent::ClassificationChanged { game_id, .. }
            | MonitorEvent::Heartbeat { game_id, .. }
            | MonitorEvent::FeedError { game_id, .. }
            | MonitorEvent::Final { game_id, .. } => game_id,
        }
    }
}

/// Per-game classification state: applies snapshots in arrival order and
/// reports edges.
#[derive(Debug)]
pub struct GameTracker {
    game_id: String,
    thresholds: TriggerThresholds,
    last_trigger: Option<Trigger>,
    last_remaining: Option<f64>,
}

impl GameTracker {
    pub fn new(game_id: impl Into<String>, thresholds: TriggerThresholds) -> Self {
        GameTracker {
            game_id: game_id.into(),
            thresholds,
            last_trigger: None,
            last_remaining: None,
        }
    }

    pub fn classification(&self) -> Option<Trigger> {
        self.last_trigger
    }

    /// Apply the next snapshot. Returns an event only on a classification
    /// change or when the game goes final.
    pub fn apply(&mut self, mut snapshot: GameSnapshot) -> Option<MonitorEvent> {
        match snapshot.status {
            GameStatus::Final => {
                return Some(MonitorEvent::Final {
                    game_id: self.game_id.clone(),
                    snapshot,
                })
            }
            GameStatus::Pre => return None,
            GameStatus::InProgress => {}
        }

        if let Some(prev) = self.last_remaining {
            if snapshot.minutes_remaining_reg > prev + CLOCK_EPSILON {
                warn!(
                    "[{}] Rejecting snapshot: minutes remaining went from {:.2} to {:.2}",
                    self.game_id, prev, snapshot.minutes_remaining_reg
                );
                return None;
            }
        }
        self.last_remaining = Some(snapshot.minutes_remaining_reg);

        let (metrics, trigger) = pace::evaluate(&snapshot, &self.thresholds);
        snapshot.required_pace = metrics.required_pace;

        if self.last_trigger == Some(trigger) {
            return None;
        }
        let previous = self.last_trigger.replace(trigger);
        info!(
            "[{}] Trigger {} -> {} (elapsed={:.1}, total={}, gap={:?})",
            self.game_id,
            previous.map(|t| t.as_str()).unwrap_or("-"),
            trigger,
            metrics.elapsed_minute,
            snapshot.current_total,
            metrics.pace_gap
        );
        Some(MonitorEvent::ClassificationChanged {
            game_id: self.game_id.clone(),
            previous,
            current: trigger,
            snapshot,
            metrics,
        })
    }
}

enum Command {
    Track(Vec<String>),
    Untrack(String),
    Tracked(oneshot::Sender<Vec<String>>),
}

/// Cheap, cloneable control surface of a running monitor. Dropping every
/// handle shuts the monitor down.
#[derive(Clone)]
pub struct MonitorHandle {
    commands: mpsc::Sender<Command>,
}

impl MonitorHandle {
    pub async fn start_monitoring<I, S>(&self, game_ids: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: Vec<String> = game_ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            return Ok(());
        }
        self.commands
            .send(Command::Track(ids))
            .await
            .map_err(|_| anyhow!("pace monitor is shut down"))
    }

    pub async fn stop_monitoring(&self, game_id: &str) -> Result<()> {
        self.commands
            .send(Command::Untrack(game_id.to_string()))
            .await
            .map_err(|_| anyhow!("pace monitor is shut down"))
    }

    /// Currently tracked game ids, sorted.
    pub async fn tracked_games(&self) -> Result<Vec<String>> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Tracked(tx))
            .await
            .map_err(|_| anyhow!("pace monitor is shut down"))?;
        rx.await.map_err(|_| anyhow!("pace monitor is shut down"))
    }
}

struct GameEntry {
    generation: u64,
    task: AbortHandle,
}

/// What per-game tasks send back to the supervisor.
enum Report {
    Event(MonitorEvent),
    /// The polling task ended without being untracked (it panicked).
    Exited { game_id: String, reason: String },
}

/// Spawn the supervisor and return its handle plus the outward event stream.
pub fn start_pace_monitor(
    feed: Arc<dyn SnapshotFeed>,
    thresholds: TriggerThresholds,
    settings: MonitorSettings,
) -> (MonitorHandle, mpsc::Receiver<MonitorEvent>) {
    let (command_tx, mut command_rx) = mpsc::channel::<Command>(64);
    let (event_tx, event_rx) = mpsc::channel::<MonitorEvent>(1024);

    tokio::spawn(async move {
        info!(
            "Pace monitor started (feed={}, interval={:?}, heartbeat={:?})",
            feed.name(),
            settings.poll_interval,
            settings.heartbeat_interval
        );

        let (report_tx, mut report_rx) = mpsc::channel::<(u64, Report)>(1024);
        let mut games: HashMap<String, GameEntry> = HashMap::new();
        let mut next_generation = 0u64;

        loop {
            tokio::select! {
                cmd = command_rx.recv() => match cmd {
                    Some(Command::Track(ids)) => {
                        for game_id in ids {
                            if games.contains_key(&game_id) {
                                debug!("Game already tracked: {}", game_id);
                                continue;
                            }
                            next_generation += 1;
                            info!("Tracking game {}", game_id);
                            let poller = tokio::spawn(poll_game(
                                game_id.clone(),
                                next_generation,
                                Arc::clone(&feed),
                                thresholds.clone(),
                                settings.clone(),
                                report_tx.clone(),
                            ));
                            let task = poller.abort_handle();
                            tokio::spawn(watch_poller(
                                game_id.clone(),
                                next_generation,
                                poller,
                                report_tx.clone(),
                            ));
                            games.insert(game_id, GameEntry { generation: next_generation, task });
                        }
                    }
                    Some(Command::Untrack(game_id)) => {
                        if let Some(entry) = games.remove(&game_id) {
                            entry.task.abort();
                            info!("Stopped tracking game {}", game_id);
                        }
                    }
                    Some(Command::Tracked(reply)) => {
                        let mut ids: Vec<String> = games.keys().cloned().collect();
                        ids.sort();
                        let _ = reply.send(ids);
                    }
                    None => break,
                },
                Some((generation, report)) = report_rx.recv() => {
                    let event = match report {
                        Report::Event(event) => event,
                        Report::Exited { game_id, reason } => {
                            if games.get(&game_id).map(|e| e.generation) != Some(generation) {
                                continue;
                            }
                            games.remove(&game_id);
                            error!("Polling task for {} died ({}); game untracked", game_id, reason);
                            MonitorEvent::FeedError {
                                game_id,
                                error: format!("polling task stopped: {}", reason),
                            }
                        }
                    };
                    let game_id = event.game_id().to_string();
                    if games.get(&game_id).map(|e| e.generation) != Some(generation) {
                        debug!("Dropping event for untracked game {}", game_id);
                        continue;
                    }
                    if matches!(event, MonitorEvent::Final { .. }) {
                        games.remove(&game_id);
                        info!("Game {} is final; handing off to post-game analysis", game_id);
                    }
                    if event_tx.send(event).await.is_err() {
                        warn!("Monitor event receiver dropped; shutting down");
                        break;
                    }
                }
            }
        }

        for (_, entry) in games.drain() {
            entry.task.abort();
        }
        info!("Pace monitor stopped");
    });

    (
        MonitorHandle {
            commands: command_tx,
        },
        event_rx,
    )
}

/// Waits on a polling task and reports it if it ends by panicking. Aborts
/// (untrack, shutdown) and normal returns stay silent.
async fn watch_poller(
    game_id: String,
    generation: u64,
    poller: tokio::task::JoinHandle<()>,
    report: mpsc::Sender<(u64, Report)>,
) {
    if let Err(e) = poller.await {
        if e.is_panic() {
            let reason = panic_message(e.into_panic());
            let _ = report
                .send((generation, Report::Exited { game_id, reason }))
                .await;
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic".to_string())
}

async fn tick_heartbeat(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn poll_game(
    game_id: String,
    generation: u64,
    feed: Arc<dyn SnapshotFeed>,
    thresholds: TriggerThresholds,
    settings: MonitorSettings,
    report: mpsc::Sender<(u64, Report)>,
) {
    let jitter_ms = settings.max_start_jitter.as_millis() as u64;
    if jitter_ms > 0 {
        let delay = rand::thread_rng().gen_range(0..=jitter_ms);
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let mut interval = tokio::time::interval(settings.poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut heartbeat = settings.heartbeat_interval.map(|period| {
        let mut hb = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        hb.set_missed_tick_behavior(MissedTickBehavior::Skip);
        hb
    });
    let mut tracker = GameTracker::new(game_id.clone(), thresholds);

    loop {
        let event = tokio::select! {
            _ = interval.tick() => {
                let fetched = tokio::time::timeout(settings.fetch_timeout, feed.fetch_snapshot(&game_id))
                    .await
                    .unwrap_or(Err(FeedError::Timeout(settings.fetch_timeout)));
                match fetched {
                    Ok(snapshot) => tracker.apply(snapshot),
                    Err(e) => {
                        warn!("[{}] Snapshot fetch from {} failed: {}", game_id, feed.name(), e);
                        Some(MonitorEvent::FeedError { game_id: game_id.clone(), error: e.to_string() })
                    }
                }
            }
            _ = tick_heartbeat(&mut heartbeat) => Some(MonitorEvent::Heartbeat {
                game_id: game_id.clone(),
                classification: tracker.classification(),
            }),
        };

        let Some(event) = event else { continue };
        let is_final = matches!(event, MonitorEvent::Final { .. });
        if report.send((generation, Report::Event(event))).await.is_err() || is_final {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn snap(status: GameStatus, remaining: f64, total: u32, line: Option<f64>) -> GameSnapshot {
        let elapsed = 40.0 - remaining;
        GameSnapshot {
            game_id: "g1".into(),
            status,
            total_regulation_minutes: 40.0,
            minutes_remaining_reg: remaining,
            current_total: total,
            line,
            current_pace: (elapsed > 0.0).then(|| total as f64 / elapsed),
            required_pace: None,
            period: if remaining > 20.0 { 1 } else { 2 },
            clock_seconds: 0,
        }
    }

    /// 20 minutes in at 2.5 ppm against a 145 line.
    fn triple_dipper(remaining: f64) -> GameSnapshot {
        let elapsed = 40.0 - remaining;
        snap(GameStatus::InProgress, remaining, (elapsed * 2.5) as u32, Some(145.0))
    }

    #[test]
    fn tracker_emits_only_on_change() {
        let mut t = GameTracker::new("g1", TriggerThresholds::default());
        assert!(t.apply(snap(GameStatus::Pre, 40.0, 0, Some(145.0))).is_none());

        match t.apply(triple_dipper(20.0)) {
            Some(MonitorEvent::ClassificationChanged { previous, current, snapshot, .. }) => {
                assert_eq!(previous, None);
                assert_eq!(current, Trigger::TripleDipper);
                assert_eq!(snapshot.required_pace, Some(4.75));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(t.apply(triple_dipper(19.0)).is_none());
        assert_eq!(t.classification(), Some(Trigger::TripleDipper));

        // line pulled: falls back to NONE
        match t.apply(snap(GameStatus::InProgress, 18.0, 55, None)) {
            Some(MonitorEvent::ClassificationChanged { previous, current, .. }) => {
                assert_eq!(previous, Some(Trigger::TripleDipper));
                assert_eq!(current, Trigger::None);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn tracker_rejects_clock_resets() {
        let mut t = GameTracker::new("g1", TriggerThresholds::default());
        assert!(t.apply(triple_dipper(20.0)).is_some());
        assert!(t.apply(snap(GameStatus::InProgress, 25.0, 50, None)).is_none());
        assert_eq!(t.classification(), Some(Trigger::TripleDipper));
    }

    #[test]
    fn tracker_reports_final() {
        let mut t = GameTracker::new("g1", TriggerThresholds::default());
        let ev = t.apply(snap(GameStatus::Final, 0.0, 139, Some(141.5)));
        assert!(matches!(ev, Some(MonitorEvent::Final { .. })));
    }

    /// Replays scripted responses per game; repeats the last one forever.
    struct ScriptedFeed {
        scripts: Mutex<HashMap<String, VecDeque<Result<GameSnapshot, FeedError>>>>,
        last: Mutex<HashMap<String, GameSnapshot>>,
        calls: AtomicUsize,
    }

    impl ScriptedFeed {
        fn new(scripts: Vec<(&str, Vec<Result<GameSnapshot, FeedError>>)>) -> Self {
            ScriptedFeed {
                scripts: Mutex::new(
                    scripts
                        .into_iter()
                        .map(|(id, s)| (id.to_string(), s.into_iter().collect()))
                        .collect(),
                ),
                last: Mutex::new(HashMap::new()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SnapshotFeed for ScriptedFeed {
        async fn fetch_snapshot(&self, game_id: &str) -> Result<GameSnapshot, FeedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self
                .scripts
                .lock()
                .unwrap()
                .get_mut(game_id)
                .and_then(|q| q.pop_front());
            match next {
                Some(Ok(mut s)) => {
                    s.game_id = game_id.to_string();
                    self.last.lock().unwrap().insert(game_id.to_string(), s.clone());
                    Ok(s)
                }
                Some(Err(e)) => Err(e),
                None => self
                    .last
                    .lock()
                    .unwrap()
                    .get(game_id)
                    .cloned()
                    .ok_or_else(|| FeedError::NotFound(game_id.to_string())),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn fast_settings() -> MonitorSettings {
        MonitorSettings {
            poll_interval: Duration::from_millis(10),
            fetch_timeout: Duration::from_millis(500),
            heartbeat_interval: None,
            max_start_jitter: Duration::ZERO,
        }
    }

    async fn next_event(rx: &mut mpsc::Receiver<MonitorEvent>) -> MonitorEvent {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("event within timeout")
            .expect("channel open")
    }

    #[tokio::test]
    async fn monitor_emits_changes_then_final() {
        let feed = Arc::new(ScriptedFeed::new(vec![(
            "g1",
            vec![
                Ok(snap(GameStatus::Pre, 40.0, 0, Some(145.0))),
                Ok(triple_dipper(20.0)),
                Ok(triple_dipper(19.5)),
                Ok(snap(GameStatus::Final, 0.0, 139, Some(145.0))),
            ],
        )]));
        let (handle, mut rx) =
            start_pace_monitor(feed, TriggerThresholds::default(), fast_settings());
        handle.start_monitoring(["g1"]).await.unwrap();

        match next_event(&mut rx).await {
            MonitorEvent::ClassificationChanged { game_id, current, .. } => {
                assert_eq!(game_id, "g1");
                assert_eq!(current, Trigger::TripleDipper);
            }
            other => panic!("unexpected {:?}", other),
        }
        match next_event(&mut rx).await {
            MonitorEvent::Final { game_id, snapshot } => {
                assert_eq!(game_id, "g1");
                assert_eq!(snapshot.current_total, 139);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(handle.tracked_games().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fetch_failure_keeps_classification() {
        let feed = Arc::new(ScriptedFeed::new(vec![(
            "g1",
            vec![
                Ok(triple_dipper(20.0)),
                Err(FeedError::Status(503)),
                Ok(triple_dipper(19.0)),
                Ok(snap(GameStatus::Final, 0.0, 139, Some(145.0))),
            ],
        )]));
        let (handle, mut rx) =
            start_pace_monitor(feed, TriggerThresholds::default(), fast_settings());
        handle.start_monitoring(vec!["g1".to_string()]).await.unwrap();

        assert!(matches!(
            next_event(&mut rx).await,
            MonitorEvent::ClassificationChanged { current: Trigger::TripleDipper, .. }
        ));
        match next_event(&mut rx).await {
            MonitorEvent::FeedError { error, .. } => assert!(error.contains("503")),
            other => panic!("unexpected {:?}", other),
        }
        // unchanged classification after recovery: next event is the final
        assert!(matches!(next_event(&mut rx).await, MonitorEvent::Final { .. }));
    }

    #[tokio::test]
    async fn games_are_independent() {
        let feed = Arc::new(ScriptedFeed::new(vec![
            ("bad", vec![Err(FeedError::Status(500))]),
            (
                "good",
                vec![
                    Ok(triple_dipper(20.0)),
                    Ok(snap(GameStatus::Final, 0.0, 139, Some(145.0))),
                ],
            ),
        ]));
        let (handle, mut rx) =
            start_pace_monitor(feed, TriggerThresholds::default(), fast_settings());
        handle.start_monitoring(["bad", "good"]).await.unwrap();

        let mut saw_good_final = false;
        for _ in 0..50 {
            if let MonitorEvent::Final { game_id, .. } = next_event(&mut rx).await {
                assert_eq!(game_id, "good");
                saw_good_final = true;
                break;
            }
        }
        assert!(saw_good_final);
        assert_eq!(handle.tracked_games().await.unwrap(), vec!["bad".to_string()]);
    }

    #[tokio::test]
    async fn stop_monitoring_silences_game() {
        // Alternate between a triggering and a non-triggering snapshot so the
        // game keeps emitting changes while tracked.
        let mut script = Vec::new();
        for i in 0..1000 {
            let s = if i % 2 == 0 {
                triple_dipper(20.0)
            } else {
                snap(GameStatus::InProgress, 20.0, 50, None)
            };
            script.push(Ok(s));
        }
        let feed = Arc::new(ScriptedFeed::new(vec![("g1", script)]));
        let (handle, mut rx) = start_pace_monitor(
            Arc::clone(&feed) as Arc<dyn SnapshotFeed>,
            TriggerThresholds::default(),
            fast_settings(),
        );
        handle.start_monitoring(["g1"]).await.unwrap();
        next_event(&mut rx).await;

        handle.stop_monitoring("g1").await.unwrap();
        assert!(handle.tracked_games().await.unwrap().is_empty());
        while rx.try_recv().is_ok() {}

        tokio::time::sleep(Duration::from_millis(30)).await;
        let calls = feed.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(feed.calls.load(Ordering::SeqCst), calls);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn heartbeat_reports_current_classification() {
        let feed = Arc::new(ScriptedFeed::new(vec![("g1", vec![Ok(triple_dipper(20.0))])]));
        let settings = MonitorSettings {
            heartbeat_interval: Some(Duration::from_millis(30)),
            ..fast_settings()
        };
        let (handle, mut rx) = start_pace_monitor(feed, TriggerThresholds::default(), settings);
        handle.start_monitoring(["g1"]).await.unwrap();

        loop {
            if let MonitorEvent::Heartbeat { classification, .. } = next_event(&mut rx).await {
                assert_eq!(classification, Some(Trigger::TripleDipper));
                break;
            }
        }
    }

    struct PanickingFeed;

    #[async_trait]
    impl SnapshotFeed for PanickingFeed {
        async fn fetch_snapshot(&self, game_id: &str) -> Result<GameSnapshot, FeedError> {
            panic!("bad payload for {}", game_id);
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    #[tokio::test]
    async fn panicking_poller_is_reported_and_untracked() {
        let (handle, mut rx) = start_pace_monitor(
            Arc::new(PanickingFeed),
            TriggerThresholds::default(),
            fast_settings(),
        );
        handle.start_monitoring(["g1"]).await.unwrap();

        match next_event(&mut rx).await {
            MonitorEvent::FeedError { game_id, error } => {
                assert_eq!(game_id, "g1");
                assert!(error.contains("bad payload for g1"), "{}", error);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(handle.tracked_games().await.unwrap().is_empty());
    }
}
