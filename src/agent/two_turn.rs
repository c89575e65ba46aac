//! Two-turn analysis primitive
//!
//! Initial analysis, then the model poses three follow-up questions about its
//! own answer and answers them. Every narrative channel in the evidence bundle
//! is produced this way.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::protocol::{GenerationRequest, SamplingPreset, Turn};
use super::tier::TierSelector;
use super::traits::{ReasoningModel, SearchModel};
use crate::coordination::{retry, RetryPolicy};
use crate::error::Result;

/// A conversation backend that answers an ordered list of turns
#[async_trait]
pub trait Conversational: Send + Sync {
    /// One completion; `None` for an empty or unusable reply
    async fn respond(&self, turns: &[Turn]) -> Result<Option<String>>;
}

/// Reasoning model driven with a fixed sampling preset
pub struct ReasoningConversation<'a> {
    model: &'a dyn ReasoningModel,
    preset: SamplingPreset,
    max_tokens: u32,
}

impl<'a> ReasoningConversation<'a> {
    pub fn new(model: &'a dyn ReasoningModel, preset: SamplingPreset) -> Self {
        Self {
            model,
            preset,
            max_tokens: preset.default_max_tokens(),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl Conversational for ReasoningConversation<'_> {
    async fn respond(&self, turns: &[Turn]) -> Result<Option<String>> {
        let request = GenerationRequest::from_turns(self.preset, turns.to_vec())
            .with_max_tokens(self.max_tokens);
        let text = self.model.generate(request).await?;
        Ok(if text.trim().is_empty() { None } else { Some(text) })
    }
}

/// Search model with tier selection and a fixed pre-call delay
pub struct SearchConversation<'a> {
    model: &'a dyn SearchModel,
    tiers: &'a TierSelector,
    rate_limit_delay: Duration,
}

impl<'a> SearchConversation<'a> {
    pub fn new(model: &'a dyn SearchModel, tiers: &'a TierSelector, rate_limit_delay: Duration) -> Self {
        Self {
            model,
            tiers,
            rate_limit_delay,
        }
    }
}

#[async_trait]
impl Conversational for SearchConversation<'_> {
    async fn respond(&self, turns: &[Turn]) -> Result<Option<String>> {
        if !self.rate_limit_delay.is_zero() {
            tokio::time::sleep(self.rate_limit_delay).await;
        }
        let model = self.tiers.next_model();
        debug!(model = %model, service = self.model.name(), "search turn");
        let reply = self.model.query(&model, turns.to_vec()).await?;
        Ok(reply.into_text())
    }
}

/// Output of a two-turn analysis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwoTurn {
    pub initial: String,
    pub followup: String,
}

impl TwoTurn {
    /// Both answers separated by a blank line
    pub fn combined(&self) -> String {
        format!("{}\n\n{}", self.initial, self.followup)
    }
}

/// Follow-up turn asking for three self-posed questions with answers
pub fn follow_up_prompt(subject: &str) -> String {
    format!(
        r#"Based on your previous analysis of {subject}, provide three specific, insightful follow-up questions that would offer deeper understanding of crucial aspects of this matchup. Then, answer these questions in detail.

Format your response as follows:
1. [Question 1]
Answer: [Detailed answer to question 1]

2. [Question 2]
Answer: [Detailed answer to question 2]

3. [Question 3]
Answer: [Detailed answer to question 3]"#
    )
}

/// Run the initial turn, then the self-posed follow-up over the same conversation.
pub async fn two_turn_analysis(
    conversation: &dyn Conversational,
    policy: &RetryPolicy,
    stage: &str,
    initial_turns: Vec<Turn>,
    follow_up: &str,
) -> Result<TwoTurn> {
    let initial = retry(policy, stage, || conversation.respond(&initial_turns)).await?;

    let mut turns = initial_turns;
    turns.push(Turn::assistant(initial.clone()));
    turns.push(Turn::user(follow_up));

    let followup = retry(policy, stage, || conversation.respond(&turns)).await?;

    Ok(TwoTurn { initial, followup })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::protocol::{Role, SearchReply};
    use crate::agent::traits::{MockReasoningModel, MockSearchModel};
    use mockall::Sequence;

    #[tokio::test]
    async fn test_follow_up_carries_first_answer() {
        let mut model = MockReasoningModel::new();
        let mut seq = Sequence::new();
        model
            .expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("initial view".to_string()));
        model
            .expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| {
                req.turns.len() == 3
                    && req.turns[1].role == Role::Assistant
                    && req.turns[1].content == "initial view"
                    && req.temperature == 0.0
            })
            .returning(|_| Ok("three answers".to_string()));

        let conversation = ReasoningConversation::new(&model, SamplingPreset::Analytical);
        let result = two_turn_analysis(
            &conversation,
            &RetryPolicy::immediate(3),
            "analysis",
            vec![Turn::user("analyse")],
            &follow_up_prompt("the game"),
        )
        .await
        .unwrap();

        assert_eq!(result.combined(), "initial view\n\nthree answers");
    }

    #[tokio::test]
    async fn test_search_non_200_is_retried() {
        let mut model = MockSearchModel::new();
        let mut seq = Sequence::new();
        model.expect_name().return_const("search");
        model
            .expect_query()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(SearchReply::failed(500)));
        model
            .expect_query()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(SearchReply::ok("fine")));

        let tiers = TierSelector::fixed("huge");
        let conversation = SearchConversation::new(&model, &tiers, Duration::ZERO);
        let result = two_turn_analysis(
            &conversation,
            &RetryPolicy::immediate(3),
            "search",
            vec![Turn::system("analyst"), Turn::user("go")],
            "more",
        )
        .await
        .unwrap();

        assert_eq!(result.initial, "fine");
        assert_eq!(result.followup, "fine");
    }
}
