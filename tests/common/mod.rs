#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use algorhythm::adapters::{DryRunPublisher, ScrapedGame, StatsSource};
use algorhythm::agent::{GenerationRequest, ReasoningModel, SearchModel, SearchReply, TierSelector, Turn};
use algorhythm::coordination::RetryPolicy;
use algorhythm::domain::Sport;
use algorhythm::error::{PicksError, Result};
use algorhythm::pipeline::{
    EvidenceCollector, ExpertPanelist, Formatter, GameListing, LlmSynthesizer, PickEngine,
    Synthesizer, VotingSynthesizer,
};

pub const ODDS_MODEL: &str = "odds-model";
pub const NARRATIVE_MODEL: &str = "narrative-model";

pub const MICHIGAN_ML_OPINION: &str = r#"{"Summary": "Michigan's defensive line depth travels.",
"Moneyline": {"Analysis": {"Summary": "Michigan defensive line depth wins the trenches", "Market Efficiency": "Road underdog discount", "Pick": "Michigan ML", "Units": 2}},
"Spread": {"Analysis": {"Summary": "Taking the moneyline instead", "Market Efficiency": "None", "Pick": "No Bet", "Units": 0}},
"Total": {"Analysis": {"Summary": "Weather and pace point low", "Market Efficiency": "Public leans over", "Pick": "Under 44.5", "Units": 1}}}"#;

pub const OSU_MICHIGAN_ODDS: &str = "[Current Odds]\nMoneyline:\nMichigan: +180\nOhio State: -220\nSpread:\nMichigan: +6.5\nOhio State: -6.5\nTotal (Over/Under):\nOver 44.5: N/A\nUnder 44.5: N/A";

/// Reasoning model that answers by prompt kind and counts every call
#[derive(Default)]
pub struct ScriptedReasoning {
    pub calls: AtomicUsize,
    pub expert_calls: AtomicUsize,
    pub synthesis_calls: AtomicUsize,
    pub format_calls: AtomicUsize,
    expert_failures: AtomicUsize,
    expert_reply: Mutex<String>,
    synthesis_reply: Mutex<String>,
    synthesis_queue: Mutex<VecDeque<String>>,
    format_replies: Mutex<VecDeque<String>>,
}

impl ScriptedReasoning {
    pub fn new() -> Self {
        let model = Self::default();
        *lock(&model.expert_reply) = MICHIGAN_ML_OPINION.to_string();
        model
    }

    /// The next `n` expert calls fail, alternating empty replies and 503s
    pub fn failing_experts(self, n: usize) -> Self {
        self.expert_failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn with_synthesis_reply(self, reply: &str) -> Self {
        *lock(&self.synthesis_reply) = reply.to_string();
        self
    }

    /// Consensus replies handed out in order before the standing reply
    pub fn with_synthesis_replies(self, replies: Vec<String>) -> Self {
        *lock(&self.synthesis_queue) = replies.into();
        self
    }

    /// Renderings handed out in order; afterwards a short message is returned
    pub fn with_format_replies(self, replies: Vec<String>) -> Self {
        *lock(&self.format_replies) = replies.into();
        self
    }

    pub fn total_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn expert(&self) -> Result<String> {
        let call = self.expert_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .expert_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            if call % 2 == 0 {
                return Ok(String::new());
            }
            return Err(PicksError::Api {
                service: "scripted".into(),
                status: 503,
                body: "overloaded".into(),
            });
        }
        Ok(lock(&self.expert_reply).clone())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn last_user_text(turns: &[Turn]) -> &str {
    turns.last().map(|t| t.content.as_str()).unwrap_or_default()
}

#[async_trait]
impl ReasoningModel for ScriptedReasoning {
    async fn generate(&self, request: GenerationRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let prompt = last_user_text(&request.turns);
        if prompt.contains("<game_data>") {
            self.expert()
        } else if prompt.contains("<expert_data>") {
            self.synthesis_calls.fetch_add(1, Ordering::SeqCst);
            let queued = lock(&self.synthesis_queue).pop_front();
            Ok(queued.unwrap_or_else(|| lock(&self.synthesis_reply).clone()))
        } else if prompt.contains("<prediction_data>") {
            self.format_calls.fetch_add(1, Ordering::SeqCst);
            Ok(lock(&self.format_replies)
                .pop_front()
                .unwrap_or_else(|| "🚨Ohio State vs Michigan🚨\n🕒12:00 PM EST\n💰 Michigan ML (2 units)".to_string()))
        } else {
            Ok("Michigan holds a per-play EPA edge on defense.".to_string())
        }
    }

    fn name(&self) -> &'static str {
        "scripted-reasoning"
    }
}

/// Search model serving a fixed odds reply to the odds model and prose to everyone else
pub struct ScriptedSearch {
    pub calls: AtomicUsize,
    pub odds_calls: AtomicUsize,
    odds_reply: Option<String>,
}

impl ScriptedSearch {
    pub fn new(odds_reply: Option<&str>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            odds_calls: AtomicUsize::new(0),
            odds_reply: odds_reply.map(str::to_string),
        }
    }

    pub fn total_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchModel for ScriptedSearch {
    async fn query(&self, model: &str, _turns: Vec<Turn>) -> Result<SearchReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if model == ODDS_MODEL {
            self.odds_calls.fetch_add(1, Ordering::SeqCst);
            return Ok(match &self.odds_reply {
                Some(text) => SearchReply::ok(text.clone()),
                None => SearchReply::failed(503),
            });
        }
        Ok(SearchReply::ok("Ohio State is healthy; Michigan returns its starting corner."))
    }

    fn name(&self) -> &'static str {
        "scripted-search"
    }
}

/// Stats source keyed by URL; URLs containing "broken" fail permanently
#[derive(Default)]
pub struct ScriptedStats {
    pub calls: AtomicUsize,
}

#[async_trait]
impl StatsSource for ScriptedStats {
    async fn fetch_game(&self, url: &str) -> Result<ScrapedGame> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if url.contains("broken") {
            return Err(PicksError::MarkerNotFound("__NEXT_DATA__".into()));
        }
        Ok(ScrapedGame {
            home: "Ohio State".into(),
            away: "Michigan".into(),
            matchup: json!({"team": [{"team": "Michigan", "epa": 0.21}, {"team": "Ohio State", "epa": 0.18}]}),
        })
    }
}

pub fn listing(home: &str, away: &str, stats_url: &str) -> GameListing {
    GameListing {
        home: home.into(),
        away: away.into(),
        kickoff: chrono::NaiveDate::from_ymd_opt(2024, 11, 30)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .unwrap(),
        stats_url: stats_url.into(),
        lineup_file: None,
        ignore: false,
        home_rank: None,
        away_rank: None,
        home_conference: None,
        away_conference: None,
    }
}

pub fn ohio_state_michigan() -> GameListing {
    listing("Ohio State", "Michigan", "https://stats.test/cfb/game/401628525")
}

pub enum SynthesisMode {
    Llm,
    Voting,
}

pub struct Harness {
    pub reasoning: Arc<ScriptedReasoning>,
    pub search: Arc<ScriptedSearch>,
    pub stats: Arc<ScriptedStats>,
    pub publisher: Arc<DryRunPublisher>,
}

impl Harness {
    pub fn new(reasoning: ScriptedReasoning, search: ScriptedSearch) -> Self {
        Self {
            reasoning: Arc::new(reasoning),
            search: Arc::new(search),
            stats: Arc::new(ScriptedStats::default()),
            publisher: Arc::new(DryRunPublisher::new()),
        }
    }

    pub fn engine(&self, mode: SynthesisMode, experts: usize) -> PickEngine {
        let policy = RetryPolicy::immediate(6);
        let collector = EvidenceCollector::new(
            Sport::Cfb,
            self.reasoning.clone(),
            self.search.clone(),
            self.stats.clone(),
            Arc::new(TierSelector::fixed(NARRATIVE_MODEL)),
            policy.clone(),
        )
        .with_odds_model(ODDS_MODEL);
        let panelist = ExpertPanelist::new(Sport::Cfb, self.reasoning.clone(), policy.clone());
        let synthesizer: Box<dyn Synthesizer> = match mode {
            SynthesisMode::Llm => Box::new(LlmSynthesizer::new(
                Sport::Cfb,
                self.reasoning.clone(),
                policy.clone(),
            )),
            SynthesisMode::Voting => Box::new(VotingSynthesizer::new()),
        };
        let formatter = Formatter::new(Sport::Cfb, self.reasoning.clone(), policy);

        PickEngine::new(
            Sport::Cfb,
            collector,
            panelist,
            synthesizer,
            formatter,
            self.publisher.clone(),
        )
        .with_expert_count(experts)
    }
}
