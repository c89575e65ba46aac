//! Perplexity chat-completions client
//!
//! Retrieval-augmented backend for the web-search narrative analysis and the
//! current-odds lookup. Non-200 replies are surfaced as a `SearchReply` with
//! empty text; the caller decides whether to retry.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::protocol::{SearchReply, Turn};
use super::traits::SearchModel;
use crate::config::SearchConfig;
use crate::error::{PicksError, Result};

/// Search client configuration
#[derive(Debug, Clone)]
pub struct SonarConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for SonarConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.perplexity.ai".to_string(),
            timeout_secs: 120,
        }
    }
}

impl SonarConfig {
    pub fn from_settings(settings: &SearchConfig, api_key: String) -> Self {
        Self {
            api_key,
            base_url: settings.base_url.clone(),
            timeout_secs: settings.timeout_secs,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Turn],
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

/// Perplexity search-model client
pub struct SonarClient {
    config: SonarConfig,
    http: Client,
}

impl SonarClient {
    pub fn new(config: SonarConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PicksError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, http })
    }
}

#[async_trait]
impl SearchModel for SonarClient {
    async fn query(&self, model: &str, turns: Vec<Turn>) -> Result<SearchReply> {
        if self.config.api_key.is_empty() {
            return Err(PicksError::MissingCredential("perplexity api key".to_string()));
        }

        debug!(model, turns = turns.len(), "Sending request to search model");

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&ChatRequest {
                model,
                messages: &turns,
            })
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            warn!("Search API error: {} - {}", status, body);
            return Ok(SearchReply::failed(status));
        }

        let parsed: ChatResponse = response.json().await?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        debug!("Search response received: {} chars", text.len());
        Ok(SearchReply { status, text })
    }

    fn name(&self) -> &'static str {
        "perplexity"
    }
}
