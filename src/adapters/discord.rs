//! Discord bot notifications
//!
//! Posts rendered pick messages to a text channel, addressed by guild name and
//! channel name.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

use super::publisher::Publisher;
use crate::error::{PicksError, Result};

/// Discord REST client acting as a bot user
#[derive(Clone)]
pub struct DiscordPublisher {
    client: Client,
    api_base: String,
    token: String,
    guild: String,
}

#[derive(Debug, Deserialize)]
struct Guild {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct Channel {
    id: String,
    #[serde(default)]
    name: Option<String>,
    /// 0 = guild text channel
    #[serde(rename = "type")]
    kind: u8,
}

#[derive(Serialize)]
struct CreateMessage<'a> {
    content: &'a str,
}

impl DiscordPublisher {
    pub fn new(api_base: impl Into<String>, token: impl Into<String>, guild: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PicksError::Internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
            guild: guild.into(),
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T> {
        let resp = self
            .client
            .get(format!("{}{}", self.api_base, path))
            .header("Authorization", format!("Bot {}", self.token))
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(PicksError::Api {
                service: "discord".to_string(),
                status,
                body,
            });
        }
        Ok(resp.json().await?)
    }

    async fn resolve_channel(&self, channel: &str) -> Result<String> {
        let guilds: Vec<Guild> = self.get_json("/users/@me/guilds").await?;
        let guild = guilds
            .into_iter()
            .find(|g| g.name == self.guild)
            .ok_or_else(|| PicksError::Publish(format!("guild '{}' not visible to bot", self.guild)))?;

        let channels: Vec<Channel> = self.get_json(&format!("/guilds/{}/channels", guild.id)).await?;
        channels
            .into_iter()
            .find(|c| c.kind == 0 && c.name.as_deref() == Some(channel))
            .map(|c| c.id)
            .ok_or_else(|| {
                PicksError::Publish(format!("text channel '{}' not found in '{}'", channel, self.guild))
            })
    }
}

#[async_trait]
impl Publisher for DiscordPublisher {
    async fn publish(&self, channel: &str, text: &str) -> Result<()> {
        let channel_id = self.resolve_channel(channel).await?;
        let content = text.replace("\\n", "\n");

        match self
            .client
            .post(format!("{}/channels/{}/messages", self.api_base, channel_id))
            .header("Authorization", format!("Bot {}", self.token))
            .json(&CreateMessage { content: &content })
            .send()
            .await
        {
            Ok(resp) => {
                if resp.status().is_success() {
                    info!(channel, chars = content.chars().count(), "Discord message sent");
                    Ok(())
                } else {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    error!("Discord send failed: {} - {}", status, body);
                    Err(PicksError::Publish(format!("HTTP {}: {}", status, body)))
                }
            }
            Err(e) => {
                error!("Discord request failed: {}", e);
                Err(e.into())
            }
        }
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}
