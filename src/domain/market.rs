use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Pick text meaning "no wager in this market"
pub const NO_BET: &str = "No Bet";

/// Betting market covered by every opinion and decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Market {
    Moneyline,
    Spread,
    Total,
}

impl Market {
    pub const ALL: [Market; 3] = [Market::Moneyline, Market::Spread, Market::Total];

    /// Key used in opinion and decision documents
    pub fn as_str(&self) -> &'static str {
        match self {
            Market::Moneyline => "Moneyline",
            Market::Spread => "Spread",
            Market::Total => "Total",
        }
    }
}

impl std::fmt::Display for Market {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Market {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "moneyline" | "ml" => Ok(Market::Moneyline),
            "spread" | "ats" => Ok(Market::Spread),
            "total" | "totals" | "over/under" | "ou" => Ok(Market::Total),
            other => Err(format!("unknown market '{}'", other)),
        }
    }
}

/// Whether a pick string means "no wager"
///
/// Accepts the variants models produce: "No Bet", "no bet", "NO_BET", "None",
/// "Pass" and blank.
pub fn is_no_bet(pick: &str) -> bool {
    let normalized: String = pick
        .trim()
        .trim_matches(|c: char| c == '.' || c == '"')
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    matches!(normalized.as_str(), "" | "nobet" | "none" | "pass" | "na")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_parsing() {
        assert_eq!("moneyline".parse::<Market>().unwrap(), Market::Moneyline);
        assert_eq!(" Spread ".parse::<Market>().unwrap(), Market::Spread);
        assert_eq!("Over/Under".parse::<Market>().unwrap(), Market::Total);
        assert!("parlay".parse::<Market>().is_err());
    }

    #[test]
    fn test_no_bet_variants() {
        assert!(is_no_bet("No Bet"));
        assert!(is_no_bet("no bet."));
        assert!(is_no_bet("NO_BET"));
        assert!(is_no_bet("  "));
        assert!(!is_no_bet("Michigan +3.5"));
        assert!(!is_no_bet("Under 45.5"));
    }
}
