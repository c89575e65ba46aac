//! Per-game evidence bundle
//!
//! An ordered set of named channels handed verbatim to every expert. The
//! bundle is assembled by the collector and only read afterwards.

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::domain::Sport;

/// Sentinel recorded when no odds could be obtained
pub const ODDS_UNAVAILABLE: &str = "N/A";

pub const GAME_ODDS: &str = "Game Odds";
pub const STARTING_LINEUP: &str = "Starting Lineup Analysis";

/// Channel carrying the reasoning model's read of the scraped stats
pub fn stats_channel(sport: Sport) -> &'static str {
    match sport {
        Sport::Cfb => "Quantitative Analysis",
        Sport::Nfl => "Game Analysis",
    }
}

/// Channel carrying the retrieval-augmented narrative
pub fn search_channel(sport: Sport) -> &'static str {
    match sport {
        Sport::Cfb => "Qualitative Analysis",
        Sport::Nfl => "Perplexity Analysis",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvidenceBundle {
    channels: Vec<(String, String)>,
}

impl EvidenceBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a channel, keeping its original position when it already exists
    pub fn insert(&mut self, channel: impl Into<String>, content: impl Into<String>) {
        let channel = channel.into();
        let content = content.into();
        match self.channels.iter_mut().find(|(name, _)| *name == channel) {
            Some(slot) => slot.1 = content,
            None => self.channels.push((channel, content)),
        }
    }

    pub fn get(&self, channel: &str) -> Option<&str> {
        self.channels
            .iter()
            .find(|(name, _)| name == channel)
            .map(|(_, content)| content.as_str())
    }

    /// Odds text, never empty
    pub fn odds(&self) -> &str {
        match self.get(GAME_ODDS) {
            Some(odds) if !odds.trim().is_empty() => odds,
            _ => ODDS_UNAVAILABLE,
        }
    }

    pub fn channels(&self) -> impl Iterator<Item = (&str, &str)> {
        self.channels.iter().map(|(n, c)| (n.as_str(), c.as_str()))
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// `[Channel]` sections in insertion order, odds last
    pub fn render(&self) -> String {
        let mut sections: Vec<String> = self
            .channels
            .iter()
            .filter(|(name, _)| name != GAME_ODDS)
            .map(|(name, content)| format!("[{}]\n{}", name, content))
            .collect();
        sections.push(format!("[{}]\n{}", GAME_ODDS, self.odds()));
        sections.join("\n\n")
    }
}

impl Serialize for EvidenceBundle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.channels.len()))?;
        for (name, content) in &self.channels {
            map.serialize_entry(name, content)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_puts_odds_last_with_sentinel() {
        let mut bundle = EvidenceBundle::new();
        bundle.insert(GAME_ODDS, "  ");
        bundle.insert(stats_channel(Sport::Cfb), "stats view");
        bundle.insert(search_channel(Sport::Cfb), "narrative");

        let rendered = bundle.render();
        assert!(rendered.starts_with("[Quantitative Analysis]\nstats view"));
        assert!(rendered.ends_with("[Game Odds]\nN/A"));
        assert_eq!(bundle.len(), 3);
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut bundle = EvidenceBundle::new();
        bundle.insert("A", "1");
        bundle.insert("B", "2");
        bundle.insert("A", "3");
        let names: Vec<_> = bundle.channels().map(|(n, c)| format!("{n}={c}")).collect();
        assert_eq!(names, vec!["A=3", "B=2"]);
    }
}
