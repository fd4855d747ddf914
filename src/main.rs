use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use pace_signals::config::Config;
use pace_signals::dashboard::{self, AppState};
use pace_signals::db::Database;
use pace_signals::handoff::analyze_final_game;
use pace_signals::live_scores::{
    start_pace_monitor, EspnFeed, GameDiscovery, MonitorEvent, MonitorHandle, SnapshotFeed,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;
    let pace_config = Arc::new(config.pace_config());
    info!(
        "Sport {} ({} regulation minutes), tracking {} game(s) from startup, discovery {}",
        pace_config.sport.name,
        pace_config.sport.total_regulation_minutes,
        config.game_ids.len(),
        if config.discover { "on" } else { "off" }
    );

    // Open database
    let db = Database::open(&config.database_path)?;
    info!("Database opened: {}", config.database_path);

    let feed = Arc::new(EspnFeed::new(
        Some(&config.espn_base_url),
        pace_config.sport.clone(),
    )?);

    let (monitor, mut events) = start_pace_monitor(
        feed.clone() as Arc<dyn SnapshotFeed>,
        pace_config.triggers.clone(),
        config.monitor_settings(),
    );
    monitor.start_monitoring(config.game_ids.clone()).await?;

    if config.discover {
        let interval = Duration::from_secs(config.discovery_interval_secs);
        tokio::spawn(discovery_loop(feed.clone(), monitor.clone(), interval));
    }

    // Event loop: persist changes, hand finished games to the post-game path
    {
        let db = db.clone();
        let feed = feed.clone();
        let pace_config = pace_config.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let Err(e) = db.record_monitor_event(&event) {
                    error!("[{}] Failed to store trigger change: {}", event.game_id(), e);
                }
                match event {
                    MonitorEvent::Heartbeat {
                        game_id,
                        classification,
                    } => debug!("[{}] Heartbeat: {:?}", game_id, classification),
                    MonitorEvent::FeedError { game_id, error } => {
                        warn!("[{}] Feed error: {}", game_id, error)
                    }
                    MonitorEvent::Final { game_id, snapshot } => {
                        info!(
                            "[{}] Final ({} points), starting post-game analysis",
                            game_id, snapshot.current_total
                        );
                        let db = db.clone();
                        let feed = feed.clone();
                        let pace_config = pace_config.clone();
                        tokio::spawn(async move {
                            match analyze_final_game(&snapshot, &*feed, &*feed, &pace_config).await {
                                Ok(analysis) => {
                                    if let Err(e) = db.upsert_analysis(&analysis) {
                                        error!("[{}] Failed to store analysis: {}", game_id, e);
                                    }
                                }
                                Err(e) => warn!("[{}] Post-game analysis skipped: {:#}", game_id, e),
                            }
                        });
                    }
                    MonitorEvent::ClassificationChanged { .. } => {}
                }
            }
            warn!("Monitor event stream closed");
        });
    }

    // Start the dashboard HTTP server
    let app = dashboard::router(AppState {
        db: db.clone(),
        monitor: monitor.clone(),
        sport: pace_config.sport.name.clone(),
    });
    let addr: SocketAddr = config.dashboard_addr.parse()?;
    info!("Dashboard listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Run dashboard server (blocks until shutdown)
    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically track every game the scoreboard lists as in progress.
async fn discovery_loop(discovery: Arc<EspnFeed>, monitor: MonitorHandle, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        match discovery.live_game_ids().await {
            Ok(ids) => {
                debug!("Discovered {} live game(s)", ids.len());
                if let Err(e) = monitor.start_monitoring(ids).await {
                    warn!("Discovery stopped: {}", e);
                    return;
                }
            }
            Err(e) => warn!("Game discovery failed: {}", e),
        }
    }
}
