use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::provider::{
    FeedError, GameDiscovery, LineFeed, PlayList, PlayListFeed, PostedLine, SnapshotFeed,
};
use crate::models::{GameSnapshot, GameStatus};
use crate::pace::SportRules;
use crate::postgame::{parse_clock, RawPlay};

pub const DEFAULT_BASE_URL: &str = "https://site.api.espn.com/apis/site/v2/sports";

/// Snapshot, play-list, line and discovery feeds backed by ESPN's public
/// site API (`summary` and `scoreboard` endpoints).
pub struct EspnFeed {
    http: Client,
    /// Base URL for overriding in tests
    base_url: String,
    sport: SportRules,
}

impl EspnFeed {
    pub fn new(base_url: Option<&str>, sport: SportRules) -> Result<Self, FeedError> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(EspnFeed {
            http,
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            sport,
        })
    }

    fn endpoint(&self, name: &str, query: &[(&str, &str)]) -> Result<Url, FeedError> {
        let raw = format!("{}/{}/{}", self.base_url, self.sport.espn_path, name);
        let mut url = Url::parse(&raw).map_err(|e| FeedError::Malformed(format!("{}: {}", raw, e)))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    async fn get_json(&self, url: Url) -> Result<Value, FeedError> {
        debug!("Fetching {}", url);
        let resp = self.http.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(FeedError::Status(resp.status().as_u16()));
        }
        Ok(resp.json().await?)
    }

    async fn fetch_summary(&self, game_id: &str) -> Result<Value, FeedError> {
        let url = self.endpoint("summary", &[("event", game_id)])?;
        self.get_json(url).await
    }

    fn status_from_state(state: &str) -> GameStatus {
        match state.to_lowercase().as_str() {
            "pre" | "scheduled" => GameStatus::Pre,
            "post" | "final" => GameStatus::Final,
            _ => GameStatus::InProgress,
        }
    }
}

#[async_trait]
impl SnapshotFeed for EspnFeed {
    fn name(&self) -> &str {
        "ESPN"
    }

    async fn fetch_snapshot(&self, game_id: &str) -> Result<GameSnapshot, FeedError> {
        let raw = self.fetch_summary(game_id).await?;
        parse_summary_snapshot(&raw, game_id, &self.sport)
    }
}

#[async_trait]
impl PlayListFeed for EspnFeed {
    async fn fetch_play_list(&self, game_id: &str) -> Result<PlayList, FeedError> {
        let raw = self.fetch_summary(game_id).await?;
        parse_summary_plays(&raw)
    }
}

#[async_trait]
impl LineFeed for EspnFeed {
    async fn fetch_line(&self, game_id: &str) -> Result<PostedLine, FeedError> {
        let raw = self.fetch_summary(game_id).await?;
        parse_posted_line(&raw)
    }
}

#[async_trait]
impl GameDiscovery for EspnFeed {
    async fn live_game_ids(&self) -> Result<Vec<String>, FeedError> {
        let url = self.endpoint("scoreboard", &[])?;
        let raw = self.get_json(url).await?;
        Ok(parse_scoreboard_live_ids(&raw))
    }
}

/// Numbers show up both as JSON numbers and as strings ("71").
fn as_u32_lenient(v: &Value) -> Option<u32> {
    v.as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}

fn as_f64_lenient(v: &Value) -> Option<f64> {
    v.as_f64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
        .filter(|f: &f64| f.is_finite())
}

fn competition(raw: &Value) -> Result<&Value, FeedError> {
    let comp = &raw["header"]["competitions"][0];
    if comp.is_null() {
        return Err(FeedError::Malformed("summary has no competition".into()));
    }
    Ok(comp)
}

fn combined_score(comp: &Value) -> u32 {
    comp["competitors"]
        .as_array()
        .map(|cs| {
            cs.iter()
                .filter_map(|c| as_u32_lenient(&c["score"]))
                .fold(0u32, u32::saturating_add)
        })
        .unwrap_or(0)
}

fn posted_total(raw: &Value) -> Option<f64> {
    raw["pickcenter"]
        .as_array()
        .into_iter()
        .chain(raw["odds"].as_array())
        .flatten()
        .find_map(|p| as_f64_lenient(&p["overUnder"]))
}

/// Points per regulation minute played so far; `None` before the tip.
pub fn observed_pace(current_total: u32, elapsed_minutes: f64) -> Option<f64> {
    if elapsed_minutes > 0.0 {
        Some(current_total as f64 / elapsed_minutes)
    } else {
        None
    }
}

pub fn parse_summary_snapshot(
    raw: &Value,
    game_id: &str,
    sport: &SportRules,
) -> Result<GameSnapshot, FeedError> {
    let comp = competition(raw)?;
    let status_obj = &comp["status"];
    let state = status_obj["type"]["state"].as_str().unwrap_or("pre");
    let mut status = EspnFeed::status_from_state(state);
    if status_obj["type"]["completed"].as_bool() == Some(true) {
        status = GameStatus::Final;
    }

    let period = as_u32_lenient(&status_obj["period"]).unwrap_or(0);
    let clock_seconds = status_obj["displayClock"]
        .as_str()
        .map(parse_clock)
        .or_else(|| status_obj["clock"].as_f64().map(|c| c.max(0.0) as u32))
        .unwrap_or(0);

    let minutes_remaining_reg = match status {
        GameStatus::Pre => sport.total_regulation_minutes,
        GameStatus::Final => 0.0,
        GameStatus::InProgress => sport.minutes_remaining_reg(period, clock_seconds),
    };
    let current_total = combined_score(comp);
    let elapsed = sport.total_regulation_minutes - minutes_remaining_reg;

    Ok(GameSnapshot {
        game_id: game_id.to_string(),
        status,
        total_regulation_minutes: sport.total_regulation_minutes,
        minutes_remaining_reg,
        current_total,
        line: posted_total(raw),
        current_pace: observed_pace(current_total, elapsed),
        required_pace: None,
        period,
        clock_seconds,
    })
}

pub fn parse_summary_plays(raw: &Value) -> Result<PlayList, FeedError> {
    let comp = competition(raw)?;
    let home_team_id = comp["competitors"]
        .as_array()
        .and_then(|cs| cs.iter().find(|c| c["homeAway"].as_str() == Some("home")))
        .and_then(|c| c["id"].as_str().or_else(|| c["team"]["id"].as_str()))
        .ok_or_else(|| FeedError::Malformed("summary has no home competitor".into()))?
        .to_string();

    let plays = raw["plays"]
        .as_array()
        .map(|plays| plays.iter().map(raw_play_from_json).collect())
        .unwrap_or_default();

    Ok(PlayList {
        home_team_id,
        plays,
    })
}

fn raw_play_from_json(p: &Value) -> RawPlay {
    RawPlay {
        period: as_u32_lenient(&p["period"]["number"]).or_else(|| as_u32_lenient(&p["period"])),
        clock: p["clock"]["displayValue"]
            .as_str()
            .or_else(|| p["clock"].as_str())
            .unwrap_or("")
            .to_string(),
        scoring_play: p["scoringPlay"].as_bool().unwrap_or(false),
        score_value: as_u32_lenient(&p["scoreValue"]),
        team_id: p["team"]["id"]
            .as_str()
            .map(str::to_string)
            .or_else(|| p["team"]["id"].as_u64().map(|n| n.to_string())),
        text: p["text"].as_str().unwrap_or("").to_string(),
    }
}

pub fn parse_posted_line(raw: &Value) -> Result<PostedLine, FeedError> {
    let comp = competition(raw)?;
    Ok(PostedLine {
        line: posted_total(raw),
        final_total: combined_score(comp),
    })
}

pub fn parse_scoreboard_live_ids(raw: &Value) -> Vec<String> {
    let events = match raw["events"].as_array() {
        Some(a) => a,
        None => return vec![],
    };
    events
        .iter()
        .filter(|ev| ev["status"]["type"]["state"].as_str() == Some("in"))
        .filter_map(|ev| ev["id"].as_str().map(str::to_string))
        .collect()
}
