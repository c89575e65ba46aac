//! Presentation formatter
//!
//! Renders a decision into one chat message. Over-budget renderings are
//! discarded and regenerated from the same inputs, never truncated.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::agent::{GenerationRequest, ReasoningModel, SamplingPreset};
use crate::coordination::{retry_text, RetryPolicy};
use crate::domain::{Matchup, Sport};
use crate::error::{PicksError, Result};

use super::consensus::ConsensusDecision;
use super::prompts;

/// Hard limit of a chat message
pub const DEFAULT_MAX_CHARS: usize = 2000;

/// Strip quote characters and turn escaped newlines into real ones
pub fn clean_message(raw: &str) -> String {
    raw.replace('"', "").replace("\\n", "\n").trim().to_string()
}

pub struct Formatter {
    sport: Sport,
    model: Arc<dyn ReasoningModel>,
    policy: RetryPolicy,
    max_chars: usize,
    max_attempts: u32,
    max_tokens: u32,
}

impl Formatter {
    pub fn new(sport: Sport, model: Arc<dyn ReasoningModel>, policy: RetryPolicy) -> Self {
        Self {
            sport,
            model,
            policy,
            max_chars: DEFAULT_MAX_CHARS,
            max_attempts: 5,
            max_tokens: SamplingPreset::Formatting.default_max_tokens(),
        }
    }

    pub fn with_budget(mut self, max_chars: usize, max_attempts: u32) -> Self {
        self.max_chars = max_chars;
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub async fn render(
        &self,
        decision: &ConsensusDecision,
        matchup: &Matchup,
        kickoff: &str,
    ) -> Result<String> {
        let prompt = prompts::format_prompt(
            self.sport,
            matchup,
            &decision.to_json()?,
            kickoff,
            self.max_chars,
        );
        let request = GenerationRequest::from_prompt(SamplingPreset::Formatting, prompt)
            .with_max_tokens(self.max_tokens);

        let attempts = self.max_attempts.max(1);
        let mut last_len = 0;
        for attempt in 1..=attempts {
            let raw = retry_text(&self.policy, "format", || self.model.generate(request.clone())).await?;
            let message = clean_message(&raw);
            let len = message.chars().count();
            if len <= self.max_chars {
                debug!(game = %matchup, attempt, chars = len, "message rendered");
                return Ok(message);
            }
            warn!(
                game = %matchup,
                attempt,
                chars = len,
                limit = self.max_chars,
                "message over budget, regenerating"
            );
            last_len = len;
        }

        Err(PicksError::RenderBudgetExceeded {
            attempts,
            limit: self.max_chars,
            last_len,
        })
    }
}
