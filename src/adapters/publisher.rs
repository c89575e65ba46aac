//! Message delivery seam

use async_trait::async_trait;
use std::sync::Mutex;
use tracing::info;

use crate::error::Result;

/// Delivers a rendered message to a named chat channel
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, channel: &str, text: &str) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// Logs messages instead of sending them; keeps a copy for inspection
#[derive(Default)]
pub struct DryRunPublisher {
    sent: Mutex<Vec<(String, String)>>,
}

impl DryRunPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages "sent" so far, as (channel, text)
    pub fn sent(&self) -> Vec<(String, String)> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl Publisher for DryRunPublisher {
    async fn publish(&self, channel: &str, text: &str) -> Result<()> {
        info!(channel, "[DRY RUN] would publish:\n{}", text);
        let mut sent = match self.sent.lock() {
            Ok(sent) => sent,
            Err(poisoned) => poisoned.into_inner(),
        };
        sent.push((channel.to_string(), text.to_string()));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "dry-run"
    }
}
