//! Expert panel
//!
//! N isolated generations over the same evidence. Each slot is retried under
//! the policy until it yields text; the panel is either complete or an error.

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::sync::Arc;
use tracing::{debug, info};

use crate::agent::{GenerationRequest, ReasoningModel, SamplingPreset};
use crate::coordination::{retry_text, RetryPolicy};
use crate::domain::{Matchup, Sport};
use crate::error::{PicksError, Result};

use super::evidence::EvidenceBundle;
use super::prompts;

/// One expert's pick document, kept as the model wrote it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpertOpinion {
    pub expert: String,
    pub text: String,
}

/// Opinions in expert order ("Expert 1".."Expert N")
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpertPanel {
    opinions: Vec<ExpertOpinion>,
}

impl ExpertPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, opinion: ExpertOpinion) {
        self.opinions.push(opinion);
    }

    pub fn len(&self) -> usize {
        self.opinions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.opinions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExpertOpinion> {
        self.opinions.iter()
    }

    pub fn get(&self, expert: &str) -> Option<&ExpertOpinion> {
        self.opinions.iter().find(|o| o.expert == expert)
    }

    /// JSON object of expert id to opinion text, for the synthesis prompt
    pub fn render(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Serialize for ExpertPanel {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.opinions.len()))?;
        for opinion in &self.opinions {
            map.serialize_entry(&opinion.expert, &opinion.text)?;
        }
        map.end()
    }
}

pub fn expert_id(index: usize) -> String {
    format!("Expert {}", index + 1)
}

pub struct ExpertPanelist {
    sport: Sport,
    model: Arc<dyn ReasoningModel>,
    policy: RetryPolicy,
    max_tokens: u32,
}

impl ExpertPanelist {
    pub fn new(sport: Sport, model: Arc<dyn ReasoningModel>, policy: RetryPolicy) -> Self {
        Self {
            sport,
            model,
            policy,
            max_tokens: SamplingPreset::Expert.default_max_tokens(),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Collect exactly `target_count` opinions, or fail with the exhausted slot.
    pub async fn collect_opinions(
        &self,
        evidence: &EvidenceBundle,
        matchup: &Matchup,
        target_count: usize,
    ) -> Result<ExpertPanel> {
        if target_count == 0 {
            return Err(PicksError::Validation(
                "expert panel needs at least one expert".to_string(),
            ));
        }

        let channels: Vec<&str> = evidence.channels().map(|(name, _)| name).collect();
        let prompt = prompts::expert_prompt(self.sport, matchup, &evidence.render(), &channels);
        let request = GenerationRequest::from_prompt(SamplingPreset::Expert, prompt)
            .with_max_tokens(self.max_tokens);

        let mut panel = ExpertPanel::new();
        for index in 0..target_count {
            let expert = expert_id(index);
            let stage = format!("expert panel ({})", expert);
            let text = retry_text(&self.policy, &stage, || self.model.generate(request.clone())).await?;
            debug!(%expert, chars = text.len(), "opinion received");
            panel.push(ExpertOpinion { expert, text });
        }

        info!(game = %matchup, experts = panel.len(), "panel complete");
        Ok(panel)
    }
}
