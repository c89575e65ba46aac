//! Model service protocol definitions
//!
//! Defines the conversation and request shapes shared by the reasoning-model
//! and retrieval-augmented model services.

use serde::{Deserialize, Serialize};

/// Conversation role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single conversation turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Sampling presets used across the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingPreset {
    /// Statistical and narrative analysis turns
    Analytical,
    /// One expert opinion; slight temperature for divergence across the panel
    Expert,
    /// Consensus synthesis over the whole panel
    Synthesis,
    /// Channel-ready message rendering
    Formatting,
}

impl SamplingPreset {
    pub fn temperature(&self) -> f32 {
        match self {
            SamplingPreset::Analytical | SamplingPreset::Synthesis => 0.0,
            SamplingPreset::Expert => 0.1,
            SamplingPreset::Formatting => 0.2,
        }
    }

    pub fn default_max_tokens(&self) -> u32 {
        match self {
            SamplingPreset::Analytical | SamplingPreset::Expert => 3000,
            SamplingPreset::Synthesis | SamplingPreset::Formatting => 5000,
        }
    }
}

/// Request to the reasoning-model service
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Model identifier; `None` uses the client's configured model
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ordered conversation; system turns come first, the last turn is the user's
    pub turns: Vec<Turn>,
}

impl GenerationRequest {
    /// Single user-turn request using a sampling preset
    pub fn from_prompt(preset: SamplingPreset, prompt: impl Into<String>) -> Self {
        Self::from_turns(preset, vec![Turn::user(prompt)])
    }

    pub fn from_turns(preset: SamplingPreset, turns: Vec<Turn>) -> Self {
        Self {
            model: None,
            temperature: preset.temperature(),
            max_tokens: preset.default_max_tokens(),
            turns,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Reply from the retrieval-augmented service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchReply {
    /// HTTP status returned by the service
    pub status: u16,
    /// Generated text; empty whenever `status` is not 200
    pub text: String,
}

impl SearchReply {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            status: 200,
            text: text.into(),
        }
    }

    pub fn failed(status: u16) -> Self {
        Self {
            status,
            text: String::new(),
        }
    }

    /// Usable text, or `None` for non-200 and blank replies
    pub fn into_text(self) -> Option<String> {
        if self.status == 200 && !self.text.trim().is_empty() {
            Some(self.text)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(SamplingPreset::Analytical.temperature(), 0.0);
        assert_eq!(SamplingPreset::Expert.temperature(), 0.1);
        assert_eq!(SamplingPreset::Formatting.temperature(), 0.2);
        assert_eq!(SamplingPreset::Synthesis.default_max_tokens(), 5000);
    }

    #[test]
    fn test_search_reply_non_200_is_empty() {
        assert_eq!(SearchReply::failed(502).into_text(), None);
        assert_eq!(SearchReply::ok("  \n").into_text(), None);
        assert_eq!(SearchReply::ok("lines").into_text(), Some("lines".to_string()));
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Turn::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }
}
