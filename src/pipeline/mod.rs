//! Per-game pick pipeline
//!
//! Evidence collection, the expert panel, consensus synthesis, message
//! rendering and the engine that drives them over a schedule.

pub mod collector;
pub mod consensus;
pub mod engine;
pub mod evidence;
pub mod formatter;
pub mod odds;
pub mod panel;
pub mod prompts;
pub mod schedule;
pub mod voting;

pub use collector::{CollectedGame, EvidenceCollector};
pub use consensus::{
    round_units, BetPreference, ConsensusDecision, LlmSynthesizer, MarketAnalysis, Markets,
    OfficialPick, Synthesizer,
};
pub use engine::{EngineServices, GameFailure, PickEngine, RunOverrides, RunReport, Stage};
pub use evidence::EvidenceBundle;
pub use formatter::Formatter;
pub use odds::GameOdds;
pub use panel::{ExpertOpinion, ExpertPanel, ExpertPanelist};
pub use schedule::{GameListing, Schedule};
pub use voting::VotingSynthesizer;
