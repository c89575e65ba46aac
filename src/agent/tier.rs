//! Model-tier selection for the retrieval-augmented service
//!
//! Each search call picks one of a small set of model tiers. The choice is an
//! explicit strategy so runs are reproducible.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Configured tier strategy
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum TierStrategy {
    /// Always the first configured tier
    Fixed,
    /// Cycle through the tiers in order
    RoundRobin,
    /// Pseudo-random choice from a seeded generator
    Seeded { seed: u64 },
}

impl Default for TierStrategy {
    fn default() -> Self {
        Self::RoundRobin
    }
}

/// Picks the model name for each search call
pub struct TierSelector {
    tiers: Vec<String>,
    strategy: TierStrategy,
    /// Replaces every tier (e.g. a small model for test runs)
    model_override: Option<String>,
    cursor: AtomicUsize,
    rng: Mutex<StdRng>,
}

impl TierSelector {
    pub fn new(tiers: Vec<String>, strategy: TierStrategy) -> Self {
        let seed = match strategy {
            TierStrategy::Seeded { seed } => seed,
            _ => 0,
        };
        Self {
            tiers,
            strategy,
            model_override: None,
            cursor: AtomicUsize::new(0),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn fixed(model: impl Into<String>) -> Self {
        Self::new(vec![model.into()], TierStrategy::Fixed)
    }

    pub fn with_override(mut self, model: Option<String>) -> Self {
        self.model_override = model;
        self
    }

    /// Model name for the next call
    pub fn next_model(&self) -> String {
        if let Some(model) = &self.model_override {
            return model.clone();
        }
        if self.tiers.is_empty() {
            return String::new();
        }
        let tier = match self.strategy {
            TierStrategy::Fixed => &self.tiers[0],
            TierStrategy::RoundRobin => {
                let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.tiers.len();
                &self.tiers[idx]
            }
            TierStrategy::Seeded { .. } => {
                let mut rng = match self.rng.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                self.tiers.choose(&mut *rng).unwrap_or(&self.tiers[0])
            }
        };
        model_name(tier)
    }
}

/// Expand a bare tier ("large") into a full model name; full names pass through.
pub fn model_name(tier: &str) -> String {
    if tier.contains('-') {
        tier.to_string()
    } else {
        format!("llama-3.1-sonar-{}-128k-online", tier)
    }
}
