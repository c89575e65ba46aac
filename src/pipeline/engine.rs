//! Pick engine
//!
//! Runs collect → panel → synthesize → render → publish → record for each
//! game, one game at a time. A failing game is logged with its stage and
//! reported; the run moves on and the ledger only receives completed rows.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, info_span, Instrument};

use crate::adapters::{Publisher, StatsSource};
use crate::agent::{ReasoningModel, SearchModel, TierSelector};
use crate::config::{AppConfig, SynthesizerKind};
use crate::domain::{Market, Sport};
use crate::error::{PicksError, Result};
use crate::persistence::{LedgerRow, ResultsLedger};

use super::collector::EvidenceCollector;
use super::consensus::{LlmSynthesizer, Synthesizer};
use super::formatter::Formatter;
use super::panel::ExpertPanelist;
use super::schedule::GameListing;
use super::voting::VotingSynthesizer;

/// Experts polled in testing mode
pub const TESTING_EXPERTS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Collect,
    Panel,
    Synthesize,
    Render,
    Publish,
    Record,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Collect => "collect",
            Stage::Panel => "panel",
            Stage::Synthesize => "synthesize",
            Stage::Render => "render",
            Stage::Publish => "publish",
            Stage::Record => "record",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameFailure {
    pub game: String,
    pub stage: Stage,
    pub error: String,
}

/// Outcome of one run over a schedule
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub completed: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<GameFailure>,
}

impl RunReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// External service handles the engine is built from
#[derive(Clone)]
pub struct EngineServices {
    pub reasoning: Arc<dyn ReasoningModel>,
    pub search: Arc<dyn SearchModel>,
    pub stats: Arc<dyn StatsSource>,
    pub publisher: Arc<dyn Publisher>,
}

/// Per-invocation overrides of the configuration
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub expert_count: Option<usize>,
    pub synthesizer: Option<SynthesizerKind>,
    /// Small search model and a reduced panel
    pub testing: bool,
}

pub struct PickEngine {
    channel: String,
    expert_count: usize,
    collector: EvidenceCollector,
    panelist: ExpertPanelist,
    synthesizer: Box<dyn Synthesizer>,
    formatter: Formatter,
    publisher: Arc<dyn Publisher>,
}

async fn in_stage<T>(
    stage: Stage,
    fut: impl Future<Output = Result<T>>,
) -> std::result::Result<T, (Stage, PicksError)> {
    fut.instrument(info_span!("stage", stage = stage.as_str()))
        .await
        .map_err(|e| (stage, e))
}

impl PickEngine {
    pub fn new(
        sport: Sport,
        collector: EvidenceCollector,
        panelist: ExpertPanelist,
        synthesizer: Box<dyn Synthesizer>,
        formatter: Formatter,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            channel: sport.default_channel().to_string(),
            expert_count: 5,
            collector,
            panelist,
            synthesizer,
            formatter,
            publisher,
        }
    }

    /// Wire the pipeline from configuration
    pub fn from_config(
        config: &AppConfig,
        sport: Sport,
        services: EngineServices,
        overrides: &RunOverrides,
    ) -> Self {
        let policy = config.retry.clone();
        let test_model = overrides.testing.then(|| config.search.test_model.clone());
        let tiers = Arc::new(
            TierSelector::new(config.search.tiers.clone(), config.search.tier_strategy.clone())
                .with_override(test_model.clone()),
        );
        let odds_model =
            test_model.unwrap_or_else(|| crate::agent::tier::model_name(&config.search.odds_tier));

        let collector = EvidenceCollector::new(
            sport,
            services.reasoning.clone(),
            services.search.clone(),
            services.stats.clone(),
            tiers,
            policy.clone(),
        )
        .with_odds_model(odds_model)
        .with_rate_limit_delay(Duration::from_millis(config.search.rate_limit_delay_ms))
        .with_max_tokens(config.anthropic.analytical_max_tokens);

        let panelist = ExpertPanelist::new(sport, services.reasoning.clone(), policy.clone())
            .with_max_tokens(config.anthropic.expert_max_tokens);

        let synthesizer: Box<dyn Synthesizer> =
            match overrides.synthesizer.unwrap_or(config.pipeline.synthesizer) {
                SynthesizerKind::Llm => Box::new(
                    LlmSynthesizer::new(sport, services.reasoning.clone(), policy.clone())
                        .with_critical_analysis(config.pipeline.include_critical_analysis)
                        .with_max_tokens(config.anthropic.format_max_tokens),
                ),
                SynthesizerKind::Voting => Box::new(VotingSynthesizer::new()),
            };

        let formatter = Formatter::new(sport, services.reasoning, policy)
            .with_budget(config.pipeline.max_message_chars, config.pipeline.max_render_attempts)
            .with_max_tokens(config.anthropic.format_max_tokens);

        let expert_count = if overrides.testing {
            TESTING_EXPERTS
        } else {
            overrides.expert_count.unwrap_or(config.pipeline.expert_count)
        };

        Self::new(sport, collector, panelist, synthesizer, formatter, services.publisher)
            .with_channel(config.discord.channel_for(sport))
            .with_expert_count(expert_count)
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn with_expert_count(mut self, expert_count: usize) -> Self {
        self.expert_count = expert_count;
        self
    }

    /// Process games in order; ledger-present home teams are skipped untouched.
    pub async fn run(&self, games: &[GameListing], ledger: &mut ResultsLedger) -> RunReport {
        let mut report = RunReport::default();
        let pending: Vec<&GameListing> = games
            .iter()
            .filter(|game| {
                let known = ledger.contains_home(&game.home);
                if known {
                    info!(game = %game.matchup(), "already in ledger, skipping");
                    report.skipped.push(game.matchup().to_string());
                }
                !known
            })
            .collect();

        info!(
            games = pending.len(),
            skipped = report.skipped.len(),
            synthesizer = self.synthesizer.name(),
            publisher = self.publisher.name(),
            "starting run"
        );

        for game in pending {
            let label = game.matchup().to_string();
            let span = info_span!("game", game = %label);
            let outcome = async {
                let row = self.process_game(game).await?;
                ledger
                    .append(row)
                    .map(|_| ())
                    .map_err(|e| (Stage::Record, e))
            }
            .instrument(span)
            .await;

            match outcome {
                Ok(()) => report.completed.push(label),
                Err((stage, e)) => {
                    error!(game = %label, stage = %stage, error = %e, "game failed");
                    report.failed.push(GameFailure {
                        game: label,
                        stage,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            completed = report.completed.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "run finished"
        );
        report
    }

    /// Run every stage for one game and build its ledger row.
    pub async fn process_game(
        &self,
        game: &GameListing,
    ) -> std::result::Result<LedgerRow, (Stage, PicksError)> {
        let kickoff = game.kickoff_display();
        info!(kickoff = %kickoff, "processing game");

        let collected = in_stage(Stage::Collect, self.collector.collect(game)).await?;
        let matchup = &collected.matchup;

        let panel = in_stage(
            Stage::Panel,
            self.panelist
                .collect_opinions(&collected.evidence, matchup, self.expert_count),
        )
        .await?;

        let decision = in_stage(Stage::Synthesize, self.synthesizer.synthesize(&panel, matchup)).await?;

        let message = in_stage(
            Stage::Render,
            self.formatter.render(&decision, matchup, &kickoff),
        )
        .await?;

        in_stage(Stage::Publish, self.publisher.publish(&self.channel, &message)).await?;

        let consensus = serde_json::to_value(&decision).map_err(|e| (Stage::Record, e.into()))?;
        Ok(LedgerRow {
            home: matchup.home.clone(),
            away: matchup.away.clone(),
            kickoff,
            evidence: collected
                .evidence
                .channels()
                .map(|(name, text)| (name.to_string(), text.to_string()))
                .collect(),
            expert_panel: panel
                .iter()
                .map(|o| (o.expert.clone(), o.text.clone()))
                .collect(),
            consensus,
            message,
            ml_pick: decision.pick(Market::Moneyline).ledger_label(),
            spread_pick: decision.pick(Market::Spread).ledger_label(),
            total_pick: decision.pick(Market::Total).ledger_label(),
            recorded_at: chrono::Utc::now(),
        })
    }
}
