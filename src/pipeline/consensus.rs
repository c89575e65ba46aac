//! Consensus decision and synthesis
//!
//! A [`ConsensusDecision`] carries per-market analysis, one official pick per
//! market, and the moneyline-vs-spread preference. Whatever produced it, a
//! decision leaves this module with at most one of Moneyline and Spread
//! carrying a bet.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::agent::{GenerationRequest, ReasoningModel, SamplingPreset};
use crate::coordination::{retry_text, RetryPolicy};
use crate::domain::{is_no_bet, Market, Matchup, Sport, NO_BET};
use crate::error::{PicksError, Result};

use super::panel::ExpertPanel;
use super::prompts;

/// Largest unit size on the scale
pub const MAX_UNITS: f64 = 5.0;

/// Average-to-units rule: below 0.5 is no bet, otherwise the nearest half unit.
pub fn round_units(avg: f64) -> f64 {
    if !avg.is_finite() || avg < 0.5 {
        0.0
    } else {
        ((avg * 2.0).round() / 2.0).min(MAX_UNITS)
    }
}

/// "2" for whole units, "2.5" otherwise
pub fn format_units(units: f64) -> String {
    if units.fract() == 0.0 {
        format!("{:.0}", units)
    } else {
        format!("{}", units)
    }
}

/// One value per market
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Markets<T> {
    #[serde(rename = "Moneyline")]
    pub moneyline: T,
    #[serde(rename = "Spread")]
    pub spread: T,
    #[serde(rename = "Total")]
    pub total: T,
}

impl<T> Markets<T> {
    pub fn get(&self, market: Market) -> &T {
        match market {
            Market::Moneyline => &self.moneyline,
            Market::Spread => &self.spread,
            Market::Total => &self.total,
        }
    }

    pub fn get_mut(&mut self, market: Market) -> &mut T {
        match market {
            Market::Moneyline => &mut self.moneyline,
            Market::Spread => &mut self.spread,
            Market::Total => &mut self.total,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketAnalysis {
    #[serde(rename = "Summary", default, deserialize_with = "lenient_text")]
    pub summary: String,
    #[serde(
        rename = "Key_Insights",
        alias = "Key Insights",
        default,
        deserialize_with = "text_list"
    )]
    pub key_insights: Vec<String>,
    #[serde(
        rename = "Risk_Factors",
        alias = "Risk Factors",
        default,
        deserialize_with = "text_list"
    )]
    pub risk_factors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficialPick {
    #[serde(rename = "Pick", deserialize_with = "lenient_text")]
    pub pick: String,
    #[serde(rename = "Reasoning", default, deserialize_with = "lenient_text")]
    pub reasoning: String,
    #[serde(rename = "Units", default, deserialize_with = "lenient_units")]
    pub units: f64,
}

impl OfficialPick {
    pub fn new(pick: impl Into<String>, reasoning: impl Into<String>, units: f64) -> Self {
        Self {
            pick: pick.into(),
            reasoning: reasoning.into(),
            units,
        }
    }

    pub fn no_bet(reasoning: impl Into<String>) -> Self {
        Self::new(NO_BET, reasoning, 0.0)
    }

    /// A real wager: a named pick with a positive size
    pub fn is_bet(&self) -> bool {
        !is_no_bet(&self.pick) && self.units > 0.0
    }

    /// Ledger column text, e.g. "Michigan ML (2 units)"
    pub fn ledger_label(&self) -> String {
        format!("{} ({} units)", self.pick, format_units(self.units))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetPreference {
    #[serde(rename = "Preferred Bet", alias = "Preferred_Bet", deserialize_with = "lenient_text")]
    pub preferred_bet: String,
    #[serde(rename = "Justification", default, deserialize_with = "lenient_text")]
    pub justification: String,
}

impl BetPreference {
    /// The side market this preference names, if any
    pub fn market(&self) -> Option<Market> {
        let lower = self.preferred_bet.trim().to_ascii_lowercase();
        if lower.contains("moneyline") || lower.contains("money line") || lower == "ml" {
            Some(Market::Moneyline)
        } else if lower.contains("spread") || lower == "ats" {
            Some(Market::Spread)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusDecision {
    #[serde(default)]
    pub analysis: Markets<MarketAnalysis>,
    pub official_picks: Markets<OfficialPick>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moneyline_vs_spread: Option<BetPreference>,
}

impl ConsensusDecision {
    /// Strict parse of a synthesis reply after cleanup.
    ///
    /// `official_picks` and `moneyline_vs_spread` are accepted at the top
    /// level or nested under `analysis`; per-market analysis is optional.
    pub fn parse(raw: &str) -> Result<Self> {
        let cleaned = clean_consensus_text(raw);
        let body = extract_json_object(&cleaned)
            .ok_or_else(|| PicksError::MalformedConsensus("no JSON object in reply".to_string()))?;
        let root: Value = serde_json::from_str(body)
            .map_err(|e| PicksError::MalformedConsensus(format!("invalid JSON: {}", e)))?;
        Self::from_value(&root)
    }

    fn from_value(root: &Value) -> Result<Self> {
        if !root.is_object() {
            return Err(PicksError::MalformedConsensus("reply is not an object".to_string()));
        }
        let analysis_node = ["analysis", "Expert_Analysis", "Analysis"]
            .iter()
            .find_map(|key| root.get(*key))
            .filter(|node| node.is_object());

        let picks_node = root
            .get("official_picks")
            .or_else(|| analysis_node.and_then(|a| a.get("official_picks")))
            .ok_or_else(|| PicksError::MalformedConsensus("missing official_picks".to_string()))?;
        let official_picks: Markets<OfficialPick> = serde_json::from_value(picks_node.clone())
            .map_err(|e| PicksError::MalformedConsensus(format!("official_picks: {}", e)))?;

        let mut analysis = Markets::<MarketAnalysis>::default();
        if let Some(node) = analysis_node {
            for market in Market::ALL {
                if let Some(section) = node.get(market.as_str()) {
                    *analysis.get_mut(market) = serde_json::from_value(section.clone()).map_err(
                        |e| PicksError::MalformedConsensus(format!("analysis.{}: {}", market, e)),
                    )?;
                }
            }
        }

        let moneyline_vs_spread = root
            .get("moneyline_vs_spread")
            .or_else(|| analysis_node.and_then(|a| a.get("moneyline_vs_spread")))
            .or_else(|| picks_node.get("moneyline_vs_spread"))
            .map(|node| serde_json::from_value(node.clone()))
            .transpose()
            .map_err(|e| PicksError::MalformedConsensus(format!("moneyline_vs_spread: {}", e)))?;

        Ok(Self {
            analysis,
            official_picks,
            moneyline_vs_spread,
        })
    }

    /// Normalise unit sizes and no-bet spellings, then enforce exclusivity.
    pub fn finalize(&mut self) {
        for market in Market::ALL {
            let pick = self.official_picks.get_mut(market);
            pick.units = round_units(pick.units);
            if is_no_bet(&pick.pick) || pick.units == 0.0 {
                pick.pick = NO_BET.to_string();
                pick.units = 0.0;
            }
        }
        if let Some(dropped) = self.enforce_exclusivity() {
            debug!(market = %dropped, "exclusive pick demoted to No Bet");
        }
    }

    /// Keep only one of Moneyline and Spread as a bet; returns the demoted market.
    ///
    /// The named preferred bet wins, then the larger unit size, then Spread.
    pub fn enforce_exclusivity(&mut self) -> Option<Market> {
        let ml = &self.official_picks.moneyline;
        let spread = &self.official_picks.spread;
        if !(ml.is_bet() && spread.is_bet()) {
            return None;
        }

        let keep = self
            .moneyline_vs_spread
            .as_ref()
            .and_then(BetPreference::market)
            .unwrap_or(if ml.units > spread.units {
                Market::Moneyline
            } else {
                Market::Spread
            });
        let drop = match keep {
            Market::Moneyline => Market::Spread,
            _ => Market::Moneyline,
        };

        *self.official_picks.get_mut(drop) =
            OfficialPick::no_bet(format!("The panel preferred the {} bet.", keep));
        if self.moneyline_vs_spread.is_none() {
            self.moneyline_vs_spread = Some(BetPreference {
                preferred_bet: keep.to_string(),
                justification: format!("{} carried the larger unit size.", keep),
            });
        }
        Some(drop)
    }

    pub fn pick(&self, market: Market) -> &OfficialPick {
        self.official_picks.get(market)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Literal cleanup applied to raw synthesis text before parsing
pub fn clean_consensus_text(raw: &str) -> String {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        text = rest.split_once('\n').map_or("", |(_, body)| body);
    }
    let text = text.trim_end().trim_end_matches("```");
    text.replace("\\n", "\n")
        .replace("\\'", "'")
        .replace("  ", "")
        .replace(['\r', '\n'], " ")
}

/// Slice from the first `{` to the last `}`
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .map(value_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}

/// Units from a number, a numeric string ("2.5 units") or a one-element list
pub(crate) fn value_units(value: &Value) -> f64 {
    let units = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => leading_number(s).unwrap_or(0.0),
        Value::Array(items) => items.first().map(value_units).unwrap_or(0.0),
        _ => 0.0,
    };
    units.clamp(0.0, MAX_UNITS)
}

fn leading_number(text: &str) -> Option<f64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let rest = &text[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    rest[..end].trim_end_matches('.').parse().ok()
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    Ok(value_text(&Value::deserialize(deserializer)?))
}

fn text_list<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .iter()
            .map(value_text)
            .filter(|s| !s.is_empty())
            .collect(),
        other => {
            let text = value_text(&other);
            if text.is_empty() {
                Vec::new()
            } else {
                vec![text]
            }
        }
    })
}

fn lenient_units<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    Ok(value_units(&Value::deserialize(deserializer)?))
}

/// Turns a complete panel into one decision
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, panel: &ExpertPanel, matchup: &Matchup) -> Result<ConsensusDecision>;

    fn name(&self) -> &'static str;
}

/// Model-driven synthesis
pub struct LlmSynthesizer {
    sport: Sport,
    model: Arc<dyn ReasoningModel>,
    policy: RetryPolicy,
    include_critical_analysis: bool,
    max_tokens: u32,
}

impl LlmSynthesizer {
    pub fn new(sport: Sport, model: Arc<dyn ReasoningModel>, policy: RetryPolicy) -> Self {
        Self {
            sport,
            model,
            policy,
            include_critical_analysis: false,
            max_tokens: SamplingPreset::Synthesis.default_max_tokens(),
        }
    }

    pub fn with_critical_analysis(mut self, include: bool) -> Self {
        self.include_critical_analysis = include;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl Synthesizer for LlmSynthesizer {
    async fn synthesize(&self, panel: &ExpertPanel, matchup: &Matchup) -> Result<ConsensusDecision> {
        let prompt = prompts::consensus_prompt(
            self.sport,
            matchup,
            &panel.render()?,
            self.include_critical_analysis,
        );
        let request = GenerationRequest::from_prompt(SamplingPreset::Synthesis, prompt)
            .with_max_tokens(self.max_tokens);

        let raw = retry_text(&self.policy, "synthesis", || self.model.generate(request.clone())).await?;
        let mut decision = ConsensusDecision::parse(&raw).map_err(|e| {
            warn!(game = %matchup, error = %e, "synthesis reply rejected");
            e
        })?;
        decision.finalize();

        info!(
            game = %matchup,
            moneyline = %decision.official_picks.moneyline.ledger_label(),
            spread = %decision.official_picks.spread.ledger_label(),
            total = %decision.official_picks.total.ledger_label(),
            "consensus reached"
        );
        Ok(decision)
    }

    fn name(&self) -> &'static str {
        "llm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::traits::MockReasoningModel;
    use crate::pipeline::panel::ExpertOpinion;

    const NESTED: &str = r#"{"analysis": {"Moneyline": {"Summary": "Underdog value", "Key_Insights": ["defensive line depth"], "Risk_Factors": "Road crowd"},
"Spread": {"Summary": "Split"}, "Total": {"Summary": "Lean under"},
"official_picks": {"Moneyline": {"Pick": "Michigan ML", "Reasoning": "defensive line depth", "Units": "2 units"},
"Spread": {"Pick": "Michigan +6.5", "Reasoning": "same edge", "Units": 1.5},
"Total": {"Pick": "Under 44.5", "Reasoning": "weather", "Units": 1},
"moneyline_vs_spread": {"Preferred Bet": "Moneyline", "Justification": "plus money"}}}}"#;

    #[test]
    fn test_round_units() {
        assert_eq!(round_units((2.0 + 3.0 + 4.0) / 3.0), 3.0);
        assert_eq!(round_units(0.5), 0.5);
        assert_eq!(round_units(0.0), 0.0);
        assert_eq!(round_units(0.49), 0.0);
        assert_eq!(round_units(1.74), 1.5);
        assert_eq!(round_units(1.75), 2.0);
        assert_eq!(round_units(9.0), 5.0);
    }

    #[test]
    fn test_parse_nested_picks_and_preference() {
        let decision = ConsensusDecision::parse(NESTED).unwrap();
        assert_eq!(decision.official_picks.moneyline.units, 2.0);
        assert_eq!(decision.analysis.moneyline.risk_factors, vec!["Road crowd"]);
        assert_eq!(
            decision.moneyline_vs_spread.as_ref().and_then(BetPreference::market),
            Some(Market::Moneyline)
        );
    }

    #[test]
    fn test_finalize_keeps_preferred_side_market() {
        let mut decision = ConsensusDecision::parse(NESTED).unwrap();
        decision.finalize();
        assert_eq!(decision.pick(Market::Moneyline).pick, "Michigan ML");
        assert_eq!(decision.pick(Market::Spread).pick, NO_BET);
        assert_eq!(decision.pick(Market::Spread).units, 0.0);
        assert_eq!(decision.pick(Market::Total).ledger_label(), "Under 44.5 (1 units)");
    }

    #[test]
    fn test_exclusivity_without_preference_uses_units_then_spread() {
        let mut decision = ConsensusDecision {
            analysis: Markets::default(),
            official_picks: Markets {
                moneyline: OfficialPick::new("Bills ML", "", 2.0),
                spread: OfficialPick::new("Bills +3", "", 2.0),
                total: OfficialPick::no_bet(""),
            },
            moneyline_vs_spread: None,
        };
        assert_eq!(decision.enforce_exclusivity(), Some(Market::Moneyline));
        assert!(decision.pick(Market::Spread).is_bet());
        assert!(!decision.pick(Market::Moneyline).is_bet());
        assert_eq!(
            decision.moneyline_vs_spread.as_ref().and_then(BetPreference::market),
            Some(Market::Spread)
        );

        decision.official_picks.moneyline = OfficialPick::new("Bills ML", "", 3.0);
        decision.moneyline_vs_spread = None;
        assert_eq!(decision.enforce_exclusivity(), Some(Market::Spread));
    }

    #[test]
    fn test_cleanup_handles_fences_and_escapes() {
        let raw = "```json\n{\"official_picks\": {\"Moneyline\": {\"Pick\": \"No Bet\", \"Reasoning\": \"It\\'s close\\nvery close\", \"Units\": 0},\n\"Spread\": {\"Pick\": \"none\", \"Units\": 0}, \"Total\": {\"Pick\": \"Over 50\", \"Units\": 0.4}}}\n```";
        let mut decision = ConsensusDecision::parse(raw).unwrap();
        assert_eq!(decision.pick(Market::Moneyline).reasoning, "It's close very close");
        decision.finalize();
        assert_eq!(decision.pick(Market::Total).pick, NO_BET);
        assert_eq!(decision.pick(Market::Spread).pick, NO_BET);
    }

    #[test]
    fn test_malformed_reply_is_rejected() {
        assert!(matches!(
            ConsensusDecision::parse("Sorry, I cannot help."),
            Err(PicksError::MalformedConsensus(_))
        ));
        assert!(matches!(
            ConsensusDecision::parse(r#"{"analysis": {"Moneyline": {}}}"#),
            Err(PicksError::MalformedConsensus(_))
        ));
        assert!(matches!(
            ConsensusDecision::parse(r#"{"official_picks": {"Moneyline": {"Pick": "x"}}}"#),
            Err(PicksError::MalformedConsensus(_))
        ));
    }

    #[tokio::test]
    async fn test_llm_synthesizer_retries_empty_then_parses() {
        let mut model = MockReasoningModel::new();
        let mut seq = mockall::Sequence::new();
        model
            .expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("   ".to_string()));
        model
            .expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| req.temperature == 0.0 && req.max_tokens == 5000)
            .returning(|_| Ok(NESTED.to_string()));

        let mut panel = ExpertPanel::new();
        panel.push(ExpertOpinion {
            expert: "Expert 1".to_string(),
            text: "{}".to_string(),
        });
        let synthesizer = LlmSynthesizer::new(Sport::Cfb, Arc::new(model), RetryPolicy::immediate(3));
        let decision = synthesizer
            .synthesize(&panel, &Matchup::new("Ohio State", "Michigan"))
            .await
            .unwrap();
        assert!(decision.pick(Market::Moneyline).is_bet());
        assert!(!decision.pick(Market::Spread).is_bet());
    }
}
