//! Model service integration
//!
//! This module provides:
//! - Service seams for the reasoning model and the retrieval-augmented model
//! - HTTP clients for Claude (Anthropic) and Perplexity
//! - Model-tier selection for search calls
//! - The two-turn analysis primitive shared by every narrative channel

pub mod claude;
pub mod protocol;
pub mod sonar;
pub mod tier;
pub mod traits;
pub mod two_turn;

pub use claude::{ClaudeClient, ClaudeConfig};
pub use protocol::{GenerationRequest, Role, SamplingPreset, SearchReply, Turn};
pub use sonar::{SonarClient, SonarConfig};
pub use tier::{TierSelector, TierStrategy};
pub use traits::{ReasoningModel, SearchModel};
pub use two_turn::{
    follow_up_prompt, two_turn_analysis, Conversational, ReasoningConversation,
    SearchConversation, TwoTurn,
};
