//! Anthropic Messages API client
//!
//! Reasoning-model backend for analysis turns, expert opinions, consensus
//! synthesis and message rendering.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::protocol::{GenerationRequest, Role};
use super::traits::ReasoningModel;
use crate::config::AnthropicConfig;
use crate::error::{PicksError, Result};

/// Claude client configuration
#[derive(Debug, Clone)]
pub struct ClaudeConfig {
    /// API key
    pub api_key: String,
    /// API base URL
    pub base_url: String,
    /// `anthropic-version` header value
    pub api_version: String,
    /// Default model
    pub model: String,
    /// Request timeout
    pub timeout_secs: u64,
}

impl Default for ClaudeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.anthropic.com".to_string(),
            api_version: "2023-06-01".to_string(),
            model: "claude-3-5-sonnet-20240620".to_string(),
            timeout_secs: 300,
        }
    }
}

impl ClaudeConfig {
    pub fn from_settings(settings: &AnthropicConfig, api_key: String) -> Self {
        Self {
            api_key,
            base_url: settings.base_url.clone(),
            api_version: settings.api_version.clone(),
            model: settings.model.clone(),
            timeout_secs: settings.timeout_secs,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<MessageParam<'a>>,
}

#[derive(Debug, Serialize)]
struct MessageParam<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Claude reasoning-model client
pub struct ClaudeClient {
    config: ClaudeConfig,
    http: Client,
}

impl ClaudeClient {
    /// Create a new Claude client
    pub fn new(config: ClaudeConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PicksError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, http })
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    fn build_body<'a>(&'a self, request: &'a GenerationRequest) -> MessagesRequest<'a> {
        // System turns travel in the top-level `system` field
        let mut system_parts: Vec<&str> = Vec::new();
        let mut messages = Vec::with_capacity(request.turns.len());
        for turn in &request.turns {
            match turn.role {
                Role::System => system_parts.push(&turn.content),
                Role::User => messages.push(MessageParam {
                    role: "user",
                    content: &turn.content,
                }),
                Role::Assistant => messages.push(MessageParam {
                    role: "assistant",
                    content: &turn.content,
                }),
            }
        }

        MessagesRequest {
            model: request.model.as_deref().unwrap_or(&self.config.model),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: if system_parts.is_empty() {
                None
            } else {
                Some(system_parts.join("\n\n"))
            },
            messages,
        }
    }
}

#[async_trait]
impl ReasoningModel for ClaudeClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String> {
        if !self.is_configured() {
            return Err(PicksError::MissingCredential("anthropic api key".to_string()));
        }

        let body = self.build_body(&request);
        debug!(
            model = body.model,
            turns = body.messages.len(),
            temperature = body.temperature,
            "Sending request to Claude"
        );

        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", &self.config.api_version)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!("Claude API error: {} - {}", status, body);
            return Err(PicksError::Api {
                service: "claude".to_string(),
                status,
                body,
            });
        }

        let parsed: MessagesResponse = response.json().await?;
        let text = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        debug!("Claude response received: {} chars", text.len());
        Ok(text)
    }

    fn name(&self) -> &'static str {
        "claude"
    }
}
