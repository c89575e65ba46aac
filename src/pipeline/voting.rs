//! Deterministic synthesis
//!
//! Reads each opinion's per-market Pick/Units/Summary, takes the plurality
//! pick, averages the supporting experts' units and keeps only the factors
//! that at least two supporters mention. No model call is made.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::domain::{is_no_bet, Market, Matchup};
use crate::error::Result;

use super::consensus::{
    clean_consensus_text, extract_json_object, round_units, value_text, value_units,
    BetPreference, ConsensusDecision, MarketAnalysis, Markets, OfficialPick, Synthesizer,
};
use super::panel::{ExpertOpinion, ExpertPanel};

const MAX_FACTORS: usize = 5;
const PHRASE_WORDS: usize = 3;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "have", "in", "is", "it",
    "its", "of", "on", "or", "s", "that", "the", "their", "this", "to", "was", "will", "with",
];

/// One expert's stance on one market
#[derive(Debug, Clone, PartialEq)]
pub struct MarketVote {
    pub expert: String,
    pub pick: String,
    pub units: f64,
    pub rationale: String,
}

/// Lenient read of an opinion document; `None` when it holds no JSON object.
pub fn read_votes(opinion: &ExpertOpinion) -> Option<Markets<Option<MarketVote>>> {
    let cleaned = clean_consensus_text(&opinion.text);
    let root: Value = serde_json::from_str(extract_json_object(&cleaned)?).ok()?;

    let vote = |market: Market| -> Option<MarketVote> {
        let node = root.get(market.as_str())?;
        let analysis = node.get("Analysis").filter(|a| a.is_object()).unwrap_or(node);
        let field = |key: &str| analysis.get(key).or_else(|| node.get(key));

        let pick = value_text(field("Pick")?);
        let units = field("Units").map(value_units).unwrap_or(0.0);
        let rationale = ["Summary", "Market Efficiency", "Reasoning"]
            .iter()
            .filter_map(|key| field(*key))
            .map(value_text)
            .collect::<Vec<_>>()
            .join(" ");
        Some(MarketVote {
            expert: opinion.expert.clone(),
            pick,
            units,
            rationale,
        })
    };

    Some(Markets {
        moneyline: vote(Market::Moneyline),
        spread: vote(Market::Spread),
        total: vote(Market::Total),
    })
}

fn pick_key(pick: &str) -> String {
    if is_no_bet(pick) {
        return "no bet".to_string();
    }
    pick.to_ascii_lowercase()
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '.' || c == '+' || c == '-'))
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn trim_stopwords(words: &[String]) -> &[String] {
    let is_stop = |w: &String| STOPWORDS.contains(&w.as_str());
    let start = words.iter().position(|w| !is_stop(w)).unwrap_or(words.len());
    let end = words.iter().rposition(|w| !is_stop(w)).map_or(start, |i| i + 1);
    &words[start..end.max(start)]
}

/// Phrases that appear in at least two of the given texts, longest runs first seen
pub fn shared_factors(texts: &[&str]) -> Vec<String> {
    let tokenized: Vec<Vec<String>> = texts.iter().map(|t| tokens(t)).collect();

    let mut seen_in: HashMap<&[String], usize> = HashMap::new();
    for words in &tokenized {
        let mut local: Vec<&[String]> = words.windows(PHRASE_WORDS).collect();
        local.sort();
        local.dedup();
        for gram in local {
            *seen_in.entry(gram).or_insert(0) += 1;
        }
    }

    let mut factors: Vec<String> = Vec::new();
    for words in &tokenized {
        if words.len() < PHRASE_WORDS {
            continue;
        }
        let shared: Vec<bool> = words
            .windows(PHRASE_WORDS)
            .map(|gram| seen_in.get(gram).copied().unwrap_or(0) >= 2)
            .collect();

        let mut i = 0;
        while i < shared.len() {
            if !shared[i] {
                i += 1;
                continue;
            }
            let start = i;
            while i < shared.len() && shared[i] {
                i += 1;
            }
            let span = trim_stopwords(&words[start..i - 1 + PHRASE_WORDS]);
            if span.len() < 2 {
                continue;
            }
            let phrase = span.join(" ");
            if factors.iter().any(|f| f.contains(&phrase)) {
                continue;
            }
            factors.retain(|f| !phrase.contains(f.as_str()));
            factors.push(phrase);
        }
    }
    factors.truncate(MAX_FACTORS);
    factors
}

struct Ballot<'a> {
    display: &'a str,
    no_bet: bool,
    voters: Vec<&'a MarketVote>,
}

fn decide_market(
    market: Market,
    votes: &[&MarketVote],
    panel_size: usize,
) -> (MarketAnalysis, OfficialPick) {
    let mut ballots: Vec<(String, Ballot<'_>)> = Vec::new();
    for vote in votes {
        let key = pick_key(&vote.pick);
        match ballots.iter_mut().find(|(k, _)| *k == key) {
            Some((_, ballot)) => ballot.voters.push(*vote),
            None => ballots.push((
                key,
                Ballot {
                    display: vote.pick.trim(),
                    no_bet: is_no_bet(&vote.pick),
                    voters: vec![*vote],
                },
            )),
        }
    }
    ballots.sort_by(|a, b| b.1.voters.len().cmp(&a.1.voters.len()));

    let dissent = |winner: Option<&str>| -> Vec<String> {
        votes
            .iter()
            .filter(|v| Some(pick_key(&v.pick).as_str()) != winner)
            .map(|v| format!("{}: {}", v.expert, v.pick.trim()))
            .collect()
    };

    let Some((winner_key, winner)) = ballots.first() else {
        let summary = format!("No expert offered a {} pick.", market);
        return (
            MarketAnalysis {
                summary: summary.clone(),
                ..MarketAnalysis::default()
            },
            OfficialPick::no_bet(summary),
        );
    };

    let tied = ballots
        .get(1)
        .map_or(false, |(_, next)| next.voters.len() == winner.voters.len());
    if tied || winner.no_bet {
        let summary = if tied {
            format!("Experts were split on the {}.", market)
        } else {
            format!(
                "{} of {} experts passed on the {}.",
                winner.voters.len(),
                panel_size,
                market
            )
        };
        let analysis = MarketAnalysis {
            summary: summary.clone(),
            key_insights: Vec::new(),
            risk_factors: dissent(if tied { None } else { Some(winner_key.as_str()) }),
        };
        return (analysis, OfficialPick::no_bet(summary));
    }

    let average = winner.voters.iter().map(|v| v.units).sum::<f64>() / winner.voters.len() as f64;
    let units = round_units(average);
    let rationales: Vec<&str> = winner.voters.iter().map(|v| v.rationale.as_str()).collect();
    let factors = shared_factors(&rationales);

    let summary = format!(
        "{} of {} experts picked {}.",
        winner.voters.len(),
        panel_size,
        winner.display
    );
    let reasoning = if factors.is_empty() {
        summary.clone()
    } else {
        format!("{} Shared factors: {}.", summary, factors.join("; "))
    };

    let analysis = MarketAnalysis {
        summary,
        key_insights: factors,
        risk_factors: dissent(Some(winner_key.as_str())),
    };
    let pick = if units > 0.0 {
        OfficialPick::new(winner.display, reasoning, units)
    } else {
        OfficialPick::no_bet(format!("{} Average size rounds to zero units.", reasoning))
    };
    (analysis, pick)
}

/// Plurality-vote synthesizer
#[derive(Debug, Clone, Default)]
pub struct VotingSynthesizer;

impl VotingSynthesizer {
    pub fn new() -> Self {
        Self
    }

    pub fn decide(&self, panel: &ExpertPanel) -> ConsensusDecision {
        let ballots: Vec<Markets<Option<MarketVote>>> = panel
            .iter()
            .filter_map(|opinion| {
                let votes = read_votes(opinion);
                if votes.is_none() {
                    debug!(expert = %opinion.expert, "opinion unreadable, abstaining");
                }
                votes
            })
            .collect();

        let mut analysis = Markets::<MarketAnalysis>::default();
        let mut decide = |market: Market| -> OfficialPick {
            let votes: Vec<&MarketVote> = ballots
                .iter()
                .filter_map(|b| b.get(market).as_ref())
                .collect();
            let (market_analysis, pick) = decide_market(market, &votes, panel.len());
            *analysis.get_mut(market) = market_analysis;
            pick
        };
        let moneyline = decide(Market::Moneyline);
        let spread = decide(Market::Spread);
        let total = decide(Market::Total);

        let moneyline_vs_spread = match (moneyline.is_bet(), spread.is_bet()) {
            (true, true) => {
                let keep = if moneyline.units > spread.units {
                    Market::Moneyline
                } else {
                    Market::Spread
                };
                Some(BetPreference {
                    preferred_bet: keep.to_string(),
                    justification: format!("{} carried the larger average unit size.", keep),
                })
            }
            (true, false) => Some(BetPreference {
                preferred_bet: Market::Moneyline.to_string(),
                justification: "Only the Moneyline reached consensus.".to_string(),
            }),
            (false, true) => Some(BetPreference {
                preferred_bet: Market::Spread.to_string(),
                justification: "Only the Spread reached consensus.".to_string(),
            }),
            (false, false) => None,
        };

        let mut decision = ConsensusDecision {
            analysis,
            official_picks: Markets {
                moneyline,
                spread,
                total,
            },
            moneyline_vs_spread,
        };
        decision.finalize();
        decision
    }
}

#[async_trait]
impl Synthesizer for VotingSynthesizer {
    async fn synthesize(&self, panel: &ExpertPanel, matchup: &Matchup) -> Result<ConsensusDecision> {
        let decision = self.decide(panel);
        info!(
            game = %matchup,
            moneyline = %decision.official_picks.moneyline.ledger_label(),
            spread = %decision.official_picks.spread.ledger_label(),
            total = %decision.official_picks.total.ledger_label(),
            "consensus voted"
        );
        Ok(decision)
    }

    fn name(&self) -> &'static str {
        "voting"
    }
}
