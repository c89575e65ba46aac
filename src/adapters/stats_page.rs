//! Game stats page scraper
//!
//! The stats site embeds a `var gameData = {...};` literal in a script tag.
//! We locate the marker, parse the trailing literal as JSON, label the two
//! matchup tables with team names, and normalise numeric strings.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::error::{PicksError, Result};

const GAME_DATA_MARKER: &str = "var gameData = ";
const GAME_DATA_TERMINATOR: &str = ";\n";

/// Structured stats for one game
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScrapedGame {
    pub home: String,
    pub away: String,
    /// `matchup` object with `team[0]` = away and `team[1]` = home
    pub matchup: Value,
}

/// Source of structured per-game stats
#[async_trait]
pub trait StatsSource: Send + Sync {
    async fn fetch_game(&self, url: &str) -> Result<ScrapedGame>;
}

/// HTTP implementation of [`StatsSource`]
pub struct StatsPageClient {
    http: reqwest::Client,
}

impl StatsPageClient {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| PicksError::Internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl StatsSource for StatsPageClient {
    async fn fetch_game(&self, url: &str) -> Result<ScrapedGame> {
        debug!(url, "Fetching stats page");
        let html = self.http.get(url).send().await?.error_for_status()?.text().await?;
        parse_stats_page(&html)
    }
}

/// Extract the raw `gameData` literal from page HTML.
pub fn extract_game_data(html: &str) -> Result<Value> {
    let start = html
        .find(GAME_DATA_MARKER)
        .ok_or_else(|| PicksError::MarkerNotFound(GAME_DATA_MARKER.trim().to_string()))?
        + GAME_DATA_MARKER.len();
    let rest = &html[start..];
    let literal = match rest.find(GAME_DATA_TERMINATOR) {
        Some(end) => &rest[..end],
        None => rest.split("</script>").next().unwrap_or(rest).trim_end().trim_end_matches(';'),
    };
    Ok(serde_json::from_str(literal)?)
}

/// Parse a full stats page into a labelled, normalised matchup.
pub fn parse_stats_page(html: &str) -> Result<ScrapedGame> {
    let mut data = extract_game_data(html)?;

    let display_name = |idx: usize| -> Result<String> {
        data.pointer(&format!("/gameInfo/competitors/{idx}/team/displayName"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| PicksError::InvalidStats(format!("competitor {idx} has no displayName")))
    };
    let home = display_name(0)?;
    let away = display_name(1)?;

    let mut matchup = data
        .get_mut("matchup")
        .map(Value::take)
        .ok_or_else(|| PicksError::InvalidStats("missing matchup".to_string()))?;

    for (idx, name) in [(0usize, &away), (1usize, &home)] {
        let slot = matchup
            .pointer_mut(&format!("/team/{idx}"))
            .and_then(Value::as_object_mut)
            .ok_or_else(|| PicksError::InvalidStats(format!("missing matchup team {idx}")))?;
        slot.insert("team".to_string(), Value::String(name.clone()));
    }

    Ok(ScrapedGame {
        home,
        away,
        matchup: normalize_numbers(matchup),
    })
}

/// Numeric strings become integers when whole, otherwise four-decimal strings.
pub fn normalize_numbers(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, normalize_numbers(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_numbers).collect()),
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(f) if f.is_finite() => {
                let formatted = format!("{:.4}", f);
                if formatted.ends_with(".0000") {
                    Value::from(f as i64)
                } else {
                    Value::String(formatted)
                }
            }
            _ => Value::String(s),
        },
        other => other,
    }
}
