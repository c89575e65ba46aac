//! Current betting lines
//!
//! The search model is asked for a fixed `[Current Odds]` block. The reply is
//! parsed section by section; anything missing falls back to the house
//! convention of -110 for spread and total prices and "N/A" for moneylines.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

use crate::domain::Matchup;

/// Implied vig used when a spread or total price is missing
pub const DEFAULT_PRICE: i32 = -110;

/// One side of a spread: the line and its price
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SideLine {
    pub line: Option<String>,
    pub price: i32,
}

impl Default for SideLine {
    fn default() -> Self {
        Self {
            line: None,
            price: DEFAULT_PRICE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameOdds {
    pub matchup: Matchup,
    pub away_moneyline: Option<i32>,
    pub home_moneyline: Option<i32>,
    pub away_spread: SideLine,
    pub home_spread: SideLine,
    pub total: Option<String>,
    pub over_price: i32,
    pub under_price: i32,
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    None,
    Moneyline,
    Spread,
    Total,
}

#[derive(Clone, Copy)]
enum Side {
    Away,
    Home,
}

fn moneyline_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|[\s(])([+-]?\d{3,}|EVEN|EV)\b").expect("static regex"))
}

/// Point spread anywhere in the value, so "Michigan +6.5" reads as +6.5
fn spread_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:^|\s)([+-]?\d{1,2}(?:\.\d+)?|pk|pick)(?:[\s,;]|$)").expect("static regex")
    })
}

fn bracketed_price_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(\s*([+-]?\d{3,})\s*\)").expect("static regex"))
}

fn bare_price_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|\s)([+-]\d{3,})(?:\s|$)").expect("static regex"))
}

fn total_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(over|under)\s*(\d+(?:\.\d+)?)?\s*:?\s*\(?\s*([+-]?\d{3,})?")
            .expect("static regex")
    })
}

impl GameOdds {
    /// Empty lines for a matchup; every price at its fallback
    pub fn unavailable(matchup: &Matchup) -> Self {
        Self {
            matchup: matchup.clone(),
            away_moneyline: None,
            home_moneyline: None,
            away_spread: SideLine::default(),
            home_spread: SideLine::default(),
            total: None,
            over_price: DEFAULT_PRICE,
            under_price: DEFAULT_PRICE,
        }
    }

    /// Parse a `[Current Odds]` reply. Lines that cannot be read keep their
    /// fallback, so a reply without any numbers is the same as `unavailable`.
    pub fn parse(text: &str, matchup: &Matchup) -> Self {
        let mut odds = Self::unavailable(matchup);
        let mut section = Section::None;
        let mut position = 0usize;

        for raw in text.lines() {
            let cleaned = clean_line(raw);
            let line = cleaned.as_str();
            if line.is_empty() || line.eq_ignore_ascii_case("[current odds]") {
                continue;
            }

            if let Some(next) = section_header(line) {
                section = next;
                position = 0;
                continue;
            }

            match section {
                Section::Moneyline | Section::Spread => {
                    let Some((label, value)) = line.split_once(':') else {
                        continue;
                    };
                    let side = odds.side_for(label, position);
                    position += 1;
                    if section == Section::Moneyline {
                        if let Some(price) = parse_moneyline(value) {
                            match side {
                                Side::Away => odds.away_moneyline = Some(price),
                                Side::Home => odds.home_moneyline = Some(price),
                            }
                        }
                    } else {
                        let parsed = parse_spread(value);
                        match side {
                            Side::Away => odds.away_spread = parsed,
                            Side::Home => odds.home_spread = parsed,
                        }
                    }
                }
                Section::Total => {
                    let Some(caps) = total_re().captures(line) else {
                        continue;
                    };
                    let is_over = caps[1].eq_ignore_ascii_case("over");
                    if let Some(total) = caps.get(2) {
                        odds.total.get_or_insert_with(|| total.as_str().to_string());
                    }
                    let price = caps
                        .get(3)
                        .and_then(|m| m.as_str().parse().ok())
                        .unwrap_or(DEFAULT_PRICE);
                    if is_over {
                        odds.over_price = price;
                    } else {
                        odds.under_price = price;
                    }
                }
                Section::None => {}
            }
        }

        odds
    }

    /// True when the reply carried at least one number
    pub fn has_lines(&self) -> bool {
        self.away_moneyline.is_some()
            || self.home_moneyline.is_some()
            || self.away_spread.line.is_some()
            || self.home_spread.line.is_some()
            || self.total.is_some()
    }

    fn side_for(&self, label: &str, position: usize) -> Side {
        let label = label.trim();
        if label.eq_ignore_ascii_case(&self.matchup.home) {
            Side::Home
        } else if label.eq_ignore_ascii_case(&self.matchup.away) {
            Side::Away
        } else if position == 0 {
            Side::Away
        } else {
            Side::Home
        }
    }

    /// The canonical `[Current Odds]` block
    pub fn render(&self) -> String {
        let away = &self.matchup.away;
        let home = &self.matchup.home;
        let ml = |price: Option<i32>| price.map(format_price).unwrap_or_else(|| "N/A".to_string());
        let line = |s: &SideLine| s.line.clone().unwrap_or_else(|| "N/A".to_string());
        let total = self.total.as_deref().unwrap_or("N/A");

        format!(
            "[Current Odds]\n\
             Moneyline:\n\
             {away}: {}\n\
             {home}: {}\n\
             \n\
             Spread:\n\
             {away}: {} ({})\n\
             {home}: {} ({})\n\
             \n\
             Total (Over/Under):\n\
             Over {total}: {}\n\
             Under {total}: {}",
            ml(self.away_moneyline),
            ml(self.home_moneyline),
            line(&self.away_spread),
            format_price(self.away_spread.price),
            line(&self.home_spread),
            format_price(self.home_spread.price),
            format_price(self.over_price),
            format_price(self.under_price),
        )
    }
}

/// Drop list markers and markdown emphasis around a reply line
fn clean_line(raw: &str) -> String {
    let unstyled: String = raw.chars().filter(|c| *c != '*').collect();
    unstyled
        .trim()
        .trim_start_matches(['-', '•', '#'])
        .trim_matches('_')
        .trim()
        .to_string()
}

fn section_header(line: &str) -> Option<Section> {
    let lower = line.to_ascii_lowercase();
    let head = lower.split(':').next().unwrap_or_default().trim();
    let tail_empty = lower.split_once(':').map_or(true, |(_, rest)| rest.trim().is_empty());
    if !tail_empty {
        return None;
    }
    if head.starts_with("moneyline") {
        Some(Section::Moneyline)
    } else if head.starts_with("spread") {
        Some(Section::Spread)
    } else if head.starts_with("total") {
        Some(Section::Total)
    } else {
        None
    }
}

fn parse_moneyline(value: &str) -> Option<i32> {
    let caps = moneyline_re().captures(value.trim())?;
    match &caps[1] {
        "EVEN" | "EV" => Some(100),
        number => number.parse().ok(),
    }
}

fn parse_spread(value: &str) -> SideLine {
    let bracketed = bracketed_price_re().captures(value);
    let rest = match bracketed.as_ref().and_then(|caps| caps.get(0)) {
        Some(m) => format!("{} {}", &value[..m.start()], &value[m.end()..]),
        None => value.to_string(),
    };

    let line_match = spread_line_re().captures(&rest).and_then(|caps| caps.get(1));
    let line = line_match.map(|m| {
        let text = m.as_str();
        if text.eq_ignore_ascii_case("pk") || text.eq_ignore_ascii_case("pick") {
            "PK".to_string()
        } else {
            text.to_string()
        }
    });

    let price = match bracketed {
        Some(caps) => caps[1].parse().ok(),
        None => {
            let after_line = line_match.map_or(0, |m| m.end());
            bare_price_re()
                .captures(&rest[after_line..])
                .and_then(|caps| caps[1].parse().ok())
        }
    };
    SideLine {
        line,
        price: price.unwrap_or(DEFAULT_PRICE),
    }
}

/// American odds with an explicit plus sign for underdogs
pub fn format_price(price: i32) -> String {
    if price > 0 {
        format!("+{}", price)
    } else {
        price.to_string()
    }
}
