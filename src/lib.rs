pub mod adapters;
pub mod agent;
pub mod cli;
pub mod config;
pub mod coordination;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod pipeline;

pub use adapters::{DiscordPublisher, DryRunPublisher, Publisher, StatsPageClient, StatsSource};
pub use agent::{ClaudeClient, ReasoningModel, SearchModel, SonarClient, TierSelector};
pub use config::AppConfig;
pub use coordination::RetryPolicy;
pub use domain::{Market, Matchup, Sport};
pub use error::{PicksError, Result};
pub use persistence::{LedgerRow, ResultsLedger};
pub use pipeline::{
    ConsensusDecision, EngineServices, ExpertPanel, GameListing, PickEngine, RunOverrides,
    RunReport, Schedule,
};
