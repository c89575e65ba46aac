//! Coordination primitives for the per-game pipeline
//!
//! Every upstream call in the pipeline (expert slots, synthesis, odds lookups,
//! narrative turns) goes through the bounded retry helper here.

pub mod retry;

pub use retry::{retry, retry_text, RetryPolicy};
