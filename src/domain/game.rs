use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Sport variant; selects prompt wording, publish channel and ledger location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sport {
    #[serde(alias = "college_football")]
    Cfb,
    Nfl,
}

impl Sport {
    /// Short identifier used in paths and config keys
    pub fn slug(&self) -> &'static str {
        match self {
            Sport::Cfb => "cfb",
            Sport::Nfl => "nfl",
        }
    }

    /// League wording used in prompts
    pub fn league(&self) -> &'static str {
        match self {
            Sport::Cfb => "college football",
            Sport::Nfl => "NFL",
        }
    }

    /// Default chat channel for official picks
    pub fn default_channel(&self) -> &'static str {
        match self {
            Sport::Cfb => "cfb-official-picks",
            Sport::Nfl => "nfl-official-picks",
        }
    }
}

impl std::fmt::Display for Sport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.slug())
    }
}

impl FromStr for Sport {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "cfb" | "ncaaf" | "college" | "college_football" => Ok(Sport::Cfb),
            "nfl" => Ok(Sport::Nfl),
            other => Err(format!("unknown sport '{}'; expected cfb|nfl", other)),
        }
    }
}

/// The two teams of a game
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Matchup {
    pub home: String,
    pub away: String,
}

impl Matchup {
    pub fn new(home: impl Into<String>, away: impl Into<String>) -> Self {
        Self {
            home: home.into(),
            away: away.into(),
        }
    }
}

impl std::fmt::Display for Matchup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}", self.away, self.home)
    }
}
