//! Evidence collector
//!
//! Builds one [`EvidenceBundle`] per game from the stats scrape, a two-turn
//! reasoning analysis over it, an optional lineup analysis, a two-turn
//! retrieval-augmented narrative and the odds lookup.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::adapters::{ScrapedGame, StatsSource};
use crate::agent::{
    follow_up_prompt, two_turn_analysis, ReasoningConversation, ReasoningModel, SamplingPreset,
    SearchConversation, SearchModel, TierSelector, Turn,
};
use crate::coordination::{retry, RetryPolicy};
use crate::domain::{Matchup, Sport};
use crate::error::{PicksError, Result};

use super::evidence::{self, EvidenceBundle, ODDS_UNAVAILABLE};
use super::odds::GameOdds;
use super::prompts;
use super::schedule::GameListing;

/// Everything gathered for one game
#[derive(Debug, Clone)]
pub struct CollectedGame {
    pub matchup: Matchup,
    pub stats: ScrapedGame,
    pub odds: Option<GameOdds>,
    pub evidence: EvidenceBundle,
}

pub struct EvidenceCollector {
    sport: Sport,
    reasoning: Arc<dyn ReasoningModel>,
    search: Arc<dyn SearchModel>,
    stats: Arc<dyn StatsSource>,
    tiers: Arc<TierSelector>,
    odds_model: String,
    policy: RetryPolicy,
    rate_limit_delay: Duration,
    max_tokens: u32,
}

impl EvidenceCollector {
    pub fn new(
        sport: Sport,
        reasoning: Arc<dyn ReasoningModel>,
        search: Arc<dyn SearchModel>,
        stats: Arc<dyn StatsSource>,
        tiers: Arc<TierSelector>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            sport,
            reasoning,
            search,
            stats,
            tiers,
            odds_model: crate::agent::tier::model_name("huge"),
            policy,
            rate_limit_delay: Duration::ZERO,
            max_tokens: SamplingPreset::Analytical.default_max_tokens(),
        }
    }

    /// Model used for the odds lookup
    pub fn with_odds_model(mut self, model: impl Into<String>) -> Self {
        self.odds_model = model.into();
        self
    }

    /// Sleep before every narrative search call
    pub fn with_rate_limit_delay(mut self, delay: Duration) -> Self {
        self.rate_limit_delay = delay;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub async fn collect(&self, game: &GameListing) -> Result<CollectedGame> {
        let matchup = game.matchup();
        let subject = format!("the {} at {} game", matchup.away, matchup.home);
        let mut bundle = EvidenceBundle::new();

        let stats = retry(&self.policy, "stats scrape", || async {
            self.stats.fetch_game(&game.stats_url).await.map(Some)
        })
        .await?;
        if stats.home != matchup.home || stats.away != matchup.away {
            debug!(
                scraped_home = %stats.home,
                scraped_away = %stats.away,
                "stats page names differ from schedule"
            );
        }

        let game_data = serde_json::to_string_pretty(&stats.matchup)?;
        let analysis = ReasoningConversation::new(self.reasoning.as_ref(), SamplingPreset::Analytical)
            .with_max_tokens(self.max_tokens);
        let quantitative = two_turn_analysis(
            &analysis,
            &self.policy,
            "stats analysis",
            vec![Turn::user(prompts::stats_analysis_prompt(self.sport, &matchup, &game_data))],
            &follow_up_prompt(&subject),
        )
        .await?;
        bundle.insert(evidence::stats_channel(self.sport), quantitative.combined());

        if let Some(path) = &game.lineup_file {
            let lineup = read_lineup(path).await?;
            let lineup_analysis = two_turn_analysis(
                &analysis,
                &self.policy,
                "lineup analysis",
                vec![Turn::user(prompts::lineup_analysis_prompt(self.sport, &lineup))],
                &follow_up_prompt("the lineup data"),
            )
            .await?;
            bundle.insert(evidence::STARTING_LINEUP, lineup_analysis.combined());
        }

        let search = SearchConversation::new(self.search.as_ref(), &self.tiers, self.rate_limit_delay);
        let qualitative = two_turn_analysis(
            &search,
            &self.policy,
            "search analysis",
            vec![
                Turn::system(prompts::search_system_prompt(self.sport, &matchup)),
                Turn::user(prompts::search_query_prompt(&matchup)),
            ],
            &follow_up_prompt(&subject),
        )
        .await?;
        bundle.insert(evidence::search_channel(self.sport), qualitative.combined());

        let odds = self.lookup_odds(&matchup).await;
        let odds_text = odds
            .as_ref()
            .map(GameOdds::render)
            .unwrap_or_else(|| ODDS_UNAVAILABLE.to_string());
        bundle.insert(evidence::GAME_ODDS, odds_text);

        info!(game = %matchup, channels = bundle.len(), "evidence collected");
        Ok(CollectedGame {
            matchup,
            stats,
            odds,
            evidence: bundle,
        })
    }

    /// Odds never fail the game. Only exhausted retries yield `None`; any reply
    /// is kept, falling back to -110 wherever a price is missing.
    async fn lookup_odds(&self, matchup: &Matchup) -> Option<GameOdds> {
        let turns = vec![
            Turn::system(prompts::odds_system_prompt(self.sport)),
            Turn::user(prompts::odds_prompt(self.sport, matchup)),
        ];
        let reply = retry(&self.policy, "odds lookup", || async {
            let reply = self.search.query(&self.odds_model, turns.clone()).await?;
            Ok(reply.into_text())
        })
        .await;

        match reply {
            Ok(text) => {
                let parsed = GameOdds::parse(&text, matchup);
                if !parsed.has_lines() {
                    warn!(game = %matchup, "odds reply has no lines, recording fallback prices");
                }
                Some(parsed)
            }
            Err(e) => {
                warn!(game = %matchup, error = %e, "odds lookup failed, recording N/A");
                None
            }
        }
    }
}

async fn read_lineup(path: &Path) -> Result<String> {
    let text = tokio::fs::read_to_string(path).await.map_err(|e| {
        PicksError::Schedule(format!("lineup file {} unreadable: {}", path.display(), e))
    })?;
    if text.trim().is_empty() {
        return Err(PicksError::Schedule(format!(
            "lineup file {} is empty",
            path.display()
        )));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::traits::{MockReasoningModel, MockSearchModel};
    use crate::agent::SearchReply;
    use async_trait::async_trait;
    use serde_json::json;

    struct FixedStats;

    #[async_trait]
    impl StatsSource for FixedStats {
        async fn fetch_game(&self, _url: &str) -> Result<ScrapedGame> {
            Ok(ScrapedGame {
                home: "Ohio State".to_string(),
                away: "Michigan".to_string(),
                matchup: json!({"team": [{"team": "Michigan"}, {"team": "Ohio State"}]}),
            })
        }
    }

    fn listing() -> GameListing {
        GameListing {
            home: "Ohio State".to_string(),
            away: "Michigan".to_string(),
            kickoff: chrono::NaiveDate::from_ymd_opt(2024, 11, 30)
                .and_then(|d| d.and_hms_opt(12, 0, 0))
                .unwrap(),
            stats_url: "https://stats.test/game/1".to_string(),
            lineup_file: None,
            ignore: false,
            home_rank: None,
            away_rank: None,
            home_conference: None,
            away_conference: None,
        }
    }

    fn collector(reasoning: MockReasoningModel, search: MockSearchModel) -> EvidenceCollector {
        EvidenceCollector::new(
            Sport::Cfb,
            Arc::new(reasoning),
            Arc::new(search),
            Arc::new(FixedStats),
            Arc::new(TierSelector::fixed("narrative-model")),
            RetryPolicy::immediate(2),
        )
        .with_odds_model("odds-model")
    }

    #[tokio::test]
    async fn test_collect_orders_channels_and_records_odds_fallback() {
        let mut reasoning = MockReasoningModel::new();
        reasoning
            .expect_generate()
            .times(2)
            .returning(|_| Ok("stats read".to_string()));

        let mut search = MockSearchModel::new();
        search.expect_name().return_const("search");
        search
            .expect_query()
            .withf(|model, _| model == "odds-model")
            .returning(|_, _| {
                Ok(SearchReply::ok(
                    "[Current Odds]\nMoneyline:\nMichigan: +180\nOhio State: -220\nSpread:\nMichigan: +6.5\nOhio State: -6.5\nTotal (Over/Under):\nOver 44.5: N/A\nUnder 44.5: N/A",
                ))
            });
        search
            .expect_query()
            .withf(|model, _| model == "narrative-model")
            .times(2)
            .returning(|_, _| Ok(SearchReply::ok("narrative")));

        let game = collector(reasoning, search).collect(&listing()).await.unwrap();
        let names: Vec<_> = game.evidence.channels().map(|(n, _)| n.to_string()).collect();
        assert_eq!(
            names,
            vec!["Quantitative Analysis", "Qualitative Analysis", "Game Odds"]
        );
        assert_eq!(
            game.evidence.get("Quantitative Analysis"),
            Some("stats read\n\nstats read")
        );
        let odds = game.evidence.odds();
        assert!(odds.contains("Michigan: +6.5 (-110)"));
        assert!(odds.contains("Over 44.5: -110\nUnder 44.5: -110"));
    }

    #[tokio::test]
    async fn test_odds_exhaustion_records_sentinel() {
        let mut reasoning = MockReasoningModel::new();
        reasoning
            .expect_generate()
            .returning(|_| Ok("analysis".to_string()));

        let mut search = MockSearchModel::new();
        search.expect_name().return_const("search");
        search
            .expect_query()
            .withf(|model, _| model == "odds-model")
            .times(2)
            .returning(|_, _| Ok(SearchReply::failed(503)));
        search
            .expect_query()
            .withf(|model, _| model == "narrative-model")
            .returning(|_, _| Ok(SearchReply::ok("narrative")));

        let game = collector(reasoning, search).collect(&listing()).await.unwrap();
        assert_eq!(game.evidence.odds(), "N/A");
        assert!(game.odds.is_none());
    }

    #[tokio::test]
    async fn test_odds_reply_without_numbers_keeps_default_prices() {
        let mut reasoning = MockReasoningModel::new();
        reasoning
            .expect_generate()
            .returning(|_| Ok("analysis".to_string()));

        let mut search = MockSearchModel::new();
        search.expect_name().return_const("search");
        search
            .expect_query()
            .withf(|model, _| model == "odds-model")
            .times(1)
            .returning(|_, _| Ok(SearchReply::ok("Lines for this game have not been posted yet.")));
        search
            .expect_query()
            .withf(|model, _| model == "narrative-model")
            .returning(|_, _| Ok(SearchReply::ok("narrative")));

        let game = collector(reasoning, search).collect(&listing()).await.unwrap();
        let odds = game.evidence.odds();
        assert_ne!(odds, "N/A");
        assert!(odds.contains("Michigan: N/A (-110)"), "odds: {}", odds);
        assert!(odds.contains("Under N/A: -110"), "odds: {}", odds);
        assert!(game.odds.is_some_and(|o| !o.has_lines()));
    }
}
