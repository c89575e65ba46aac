//! Service seams for the two model backends
//!
//! The pipeline never talks to HTTP clients directly; it receives handles to
//! these traits so tests can substitute scripted doubles.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::protocol::{GenerationRequest, SearchReply, Turn};
use crate::error::Result;

/// Reasoning-model service (request in, generated text out)
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ReasoningModel: Send + Sync {
    /// Generate a completion. An empty string means the model produced no content.
    async fn generate(&self, request: GenerationRequest) -> Result<String>;

    /// Service name for logging
    fn name(&self) -> &'static str;
}

/// Retrieval-augmented model service
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SearchModel: Send + Sync {
    /// Query with an explicit model variant. Non-200 replies are returned, not raised.
    async fn query(&self, model: &str, turns: Vec<Turn>) -> Result<SearchReply>;

    /// Service name for logging
    fn name(&self) -> &'static str;
}
