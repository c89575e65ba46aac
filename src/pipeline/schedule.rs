//! Game schedule
//!
//! One TOML file per sport and week:
//!
//! ```toml
//! [[games]]
//! home = "Ohio State"
//! away = "Michigan"
//! kickoff = "2024-11-30 12:00"
//! stats_url = "https://gameonpaper.com/cfb/game/401628525"
//! lineup_file = "lineups/osu_um.txt"   # optional
//! ignore = false                        # optional
//! home_rank = 2                         # optional, omit when unranked
//! away_rank = 13
//! home_conference = "B1G"               # optional
//! away_conference = "B1G"
//! ```
//!
//! Listings that carry rank or conference data are held to the featured-game
//! rule: both teams ranked, or a power-conference meeting on Saturday (Notre
//! Dame counts as one against a power or ranked opponent). Midweek games only
//! need two FBS conferences. Listings without that data always run.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};

use crate::domain::Matchup;
use crate::error::{PicksError, Result};

const KICKOFF_FORMAT: &str = "%Y-%m-%d %H:%M";

const POWER_CONFERENCES: [&str; 6] = ["SEC", "B1G", "Big Ten", "Big 12", "ACC", "Pac-12"];
const GROUP_OF_FIVE: [&str; 6] = ["AAC", "American", "MWC", "Mountain West", "MAC", "Sun Belt"];
const OTHER_FBS: [&str; 3] = ["C-USA", "Conference USA", "Independent"];

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GameListing {
    pub home: String,
    pub away: String,
    /// Eastern local time
    #[serde(deserialize_with = "deserialize_kickoff")]
    pub kickoff: NaiveDateTime,
    pub stats_url: String,
    #[serde(default)]
    pub lineup_file: Option<PathBuf>,
    #[serde(default)]
    pub ignore: bool,
    #[serde(default)]
    pub home_rank: Option<u32>,
    #[serde(default)]
    pub away_rank: Option<u32>,
    #[serde(default)]
    pub home_conference: Option<String>,
    #[serde(default)]
    pub away_conference: Option<String>,
}

impl GameListing {
    pub fn matchup(&self) -> Matchup {
        Matchup::new(self.home.clone(), self.away.clone())
    }

    /// Whether the game clears the featured-game bar
    pub fn is_featured(&self) -> bool {
        let has_metadata = self.home_rank.is_some()
            || self.away_rank.is_some()
            || self.home_conference.is_some()
            || self.away_conference.is_some();
        if !has_metadata {
            return true;
        }

        let both_ranked = self.home_rank.is_some() && self.away_rank.is_some();
        let home_power = in_conferences(self.home_conference.as_deref(), &POWER_CONFERENCES);
        let away_power = in_conferences(self.away_conference.as_deref(), &POWER_CONFERENCES);

        if self.kickoff.weekday() == Weekday::Sat {
            let notre_dame = (is_notre_dame(&self.away) && (home_power || self.home_rank.is_some()))
                || (is_notre_dame(&self.home) && (away_power || self.away_rank.is_some()));
            both_ranked || (home_power && away_power) || notre_dame
        } else {
            let home_fbs = is_fbs(self.home_conference.as_deref());
            let away_fbs = is_fbs(self.away_conference.as_deref());
            both_ranked || (home_fbs && away_fbs)
        }
    }

    /// Kickoff as shown in published messages, e.g. "07:30 PM EST"
    pub fn kickoff_display(&self) -> String {
        self.kickoff.format("%I:%M %p EST").to_string()
    }
}

fn in_conferences(conference: Option<&str>, names: &[&str]) -> bool {
    conference
        .map(str::trim)
        .is_some_and(|c| names.iter().any(|name| c.eq_ignore_ascii_case(name)))
}

fn is_fbs(conference: Option<&str>) -> bool {
    in_conferences(conference, &POWER_CONFERENCES)
        || in_conferences(conference, &GROUP_OF_FIVE)
        || in_conferences(conference, &OTHER_FBS)
}

fn is_notre_dame(team: &str) -> bool {
    team.eq_ignore_ascii_case("Notre Dame") || team.eq_ignore_ascii_case("ND")
}

fn deserialize_kickoff<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<NaiveDateTime, D::Error> {
    let raw = String::deserialize(deserializer)?;
    NaiveDateTime::parse_from_str(raw.trim(), KICKOFF_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%d %H:%M:%S"))
        .map_err(|e| serde::de::Error::custom(format!("kickoff '{}': {}", raw, e)))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Schedule {
    #[serde(default)]
    pub games: Vec<GameListing>,
}

impl Schedule {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PicksError::Schedule(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&raw)
            .map_err(|e| PicksError::Schedule(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| PicksError::Schedule(e.to_string()))
    }

    /// Featured games to process in kickoff order; `today` keeps only that date's games.
    pub fn games_to_run(&self, today: Option<NaiveDate>) -> Vec<GameListing> {
        let mut games: Vec<GameListing> = self
            .games
            .iter()
            .filter(|g| !g.ignore)
            .filter(|g| g.is_featured())
            .filter(|g| today.map_or(true, |day| g.kickoff.date() == day))
            .cloned()
            .collect();
        games.sort_by_key(|g| g.kickoff);
        games
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEEK: &str = r#"
[[games]]
home = "Ohio State"
away = "Michigan"
kickoff = "2024-11-30 12:00"
stats_url = "https://stats.test/1"

[[games]]
home = "Alabama"
away = "Auburn"
kickoff = "2024-11-30 19:30"
stats_url = "https://stats.test/2"
lineup_file = "lineups/bama.txt"

[[games]]
home = "Georgia"
away = "Georgia Tech"
kickoff = "2024-11-29 19:30"
stats_url = "https://stats.test/3"

[[games]]
home = "Navy"
away = "Army"
kickoff = "2024-11-30 09:00"
stats_url = "https://stats.test/4"
ignore = true
"#;

    #[test]
    fn test_today_filter_and_order() {
        let schedule = Schedule::from_toml(WEEK).unwrap();
        assert_eq!(schedule.games.len(), 4);

        let day = NaiveDate::from_ymd_opt(2024, 11, 30).unwrap();
        let today = schedule.games_to_run(Some(day));
        let homes: Vec<_> = today.iter().map(|g| g.home.as_str()).collect();
        assert_eq!(homes, vec!["Ohio State", "Alabama"]);
        assert_eq!(today[1].lineup_file.as_deref(), Some(Path::new("lineups/bama.txt")));

        let all = schedule.games_to_run(None);
        assert_eq!(all[0].home, "Georgia");
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_kickoff_display() {
        let schedule = Schedule::from_toml(WEEK).unwrap();
        assert_eq!(schedule.games[0].kickoff_display(), "12:00 PM EST");
        assert_eq!(schedule.games[1].kickoff_display(), "07:30 PM EST");
    }

    // 2024-11-30 is a Saturday, 2024-11-29 a Friday
    const FEATURED: &str = r#"
[[games]]
home = "Texas"
away = "Texas A&M"
kickoff = "2024-11-30 19:30"
stats_url = "https://stats.test/10"
home_conference = "SEC"
away_conference = "SEC"

[[games]]
home = "Ohio State"
away = "Akron"
kickoff = "2024-11-30 12:00"
stats_url = "https://stats.test/11"
home_rank = 2
home_conference = "B1G"
away_conference = "MAC"

[[games]]
home = "USC"
away = "Notre Dame"
kickoff = "2024-11-30 19:30"
stats_url = "https://stats.test/12"
away_rank = 5
home_conference = "Big Ten"
away_conference = "Independent"

[[games]]
home = "Boise State"
away = "Oregon State"
kickoff = "2024-11-29 15:30"
stats_url = "https://stats.test/13"
home_rank = 12
home_conference = "MWC"
away_conference = "Pac-12"

[[games]]
home = "Tulane"
away = "Memphis"
kickoff = "2024-11-30 15:30"
stats_url = "https://stats.test/14"
home_rank = 17
away_rank = 25
home_conference = "AAC"
away_conference = "AAC"

[[games]]
home = "Duke"
away = "Wake Forest"
kickoff = "2024-11-30 12:00"
stats_url = "https://stats.test/15"
home_conference = "ACC"
away_conference = "FCS Independent"
"#;

    #[test]
    fn test_featured_game_rule() {
        let schedule = Schedule::from_toml(FEATURED).unwrap();
        let featured: Vec<_> = schedule.games.iter().map(GameListing::is_featured).collect();
        // power meeting, ranked vs MAC, Notre Dame vs power, midweek FBS, both ranked, non-FBS
        assert_eq!(featured, vec![true, false, true, true, true, false]);

        let homes: Vec<_> = schedule
            .games_to_run(None)
            .into_iter()
            .map(|g| g.home)
            .collect();
        assert_eq!(homes, vec!["Boise State", "Tulane", "Texas", "USC"]);
    }

    #[test]
    fn test_listings_without_rankings_always_run() {
        let schedule = Schedule::from_toml(WEEK).unwrap();
        assert!(schedule.games.iter().all(GameListing::is_featured));
        assert_eq!(schedule.games[0].home_rank, None);
    }

    #[test]
    fn test_bad_kickoff_is_schedule_error() {
        let err = Schedule::from_toml(
            "[[games]]\nhome = \"A\"\naway = \"B\"\nkickoff = \"Saturday\"\nstats_url = \"x\"\n",
        )
        .unwrap_err();
        assert!(matches!(err, PicksError::Schedule(_)));
    }
}
