use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::agent::TierStrategy;
use crate::coordination::RetryPolicy;
use crate::domain::Sport;
use crate::error::{PicksError, Result};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub anthropic: AnthropicConfig,
    pub search: SearchConfig,
    pub discord: DiscordConfig,
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    pub ledger: LedgerConfig,
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicConfig {
    /// Messages API base URL
    pub base_url: String,
    /// Model used for every reasoning turn
    pub model: String,
    /// `anthropic-version` header
    pub api_version: String,
    /// File holding the API key (overridden by ANTHROPIC_API_KEY)
    pub key_file: PathBuf,
    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,
    /// Output budget for evidence analysis turns
    #[serde(default = "default_analytical_tokens")]
    pub analytical_max_tokens: u32,
    /// Output budget for each expert opinion
    #[serde(default = "default_analytical_tokens")]
    pub expert_max_tokens: u32,
    /// Output budget for synthesis and formatting
    #[serde(default = "default_format_tokens")]
    pub format_max_tokens: u32,
}

fn default_model_timeout() -> u64 {
    300
}

fn default_analytical_tokens() -> u32 {
    3000
}

fn default_format_tokens() -> u32 {
    5000
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Chat-completions base URL
    pub base_url: String,
    /// File holding the API key (overridden by PERPLEXITY_API_KEY)
    pub key_file: PathBuf,
    /// Model tiers to choose from ("large", "huge", or full model names)
    pub tiers: Vec<String>,
    #[serde(default)]
    pub tier_strategy: TierStrategy,
    /// Model used for every call in testing mode
    pub test_model: String,
    /// Tier used for the odds lookup
    pub odds_tier: String,
    /// Fixed delay before each narrative search call
    #[serde(default)]
    pub rate_limit_delay_ms: u64,
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

fn default_search_timeout() -> u64 {
    120
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    /// REST API base URL
    pub api_base: String,
    /// File holding the bot token (overridden by DISCORD_TOKEN)
    pub token_file: PathBuf,
    /// Guild the bot posts in
    pub guild: String,
    /// Channel name per sport slug; falls back to the sport default
    #[serde(default)]
    pub channels: HashMap<String, String>,
}

impl DiscordConfig {
    pub fn channel_for(&self, sport: Sport) -> String {
        self.channels
            .get(sport.slug())
            .cloned()
            .unwrap_or_else(|| sport.default_channel().to_string())
    }
}

/// Which consensus implementation to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SynthesizerKind {
    /// Model-driven synthesis
    #[default]
    Llm,
    /// Deterministic plurality voting
    Voting,
}

impl std::str::FromStr for SynthesizerKind {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "llm" | "model" => Ok(SynthesizerKind::Llm),
            "voting" | "vote" => Ok(SynthesizerKind::Voting),
            other => Err(format!("unknown synthesizer '{}'; expected llm|voting", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Experts per panel (3–5)
    pub expert_count: usize,
    /// Use the critical-analysis synthesis prompt instead of the aggregative one
    #[serde(default)]
    pub include_critical_analysis: bool,
    #[serde(default)]
    pub synthesizer: SynthesizerKind,
    /// Hard character budget of a rendered message
    pub max_message_chars: usize,
    /// Renderings to try before giving up on the budget
    pub max_render_attempts: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Root directory; files land at `{directory}/{sport}/week_{n}_picks.json`
    pub directory: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Root directory; files are read from `{directory}/{sport}/week_{n}.toml`
    pub directory: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// API credentials loaded at start
#[derive(Clone)]
pub struct Credentials {
    pub anthropic_key: String,
    pub search_key: String,
    /// Only read when messages are actually posted
    pub discord_token: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("anthropic_key", &redact(&self.anthropic_key))
            .field("search_key", &redact(&self.search_key))
            .field(
                "discord_token",
                &self.discord_token.as_deref().map_or("<not loaded>", redact),
            )
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<missing>"
    } else {
        "<redacted>"
    }
}

/// Read a secret from `env_var`, falling back to a trimmed file.
pub fn load_secret(env_var: &str, file: &Path) -> Result<String> {
    if let Ok(value) = std::env::var(env_var) {
        let value = value.trim().to_string();
        if !value.is_empty() {
            return Ok(value);
        }
    }
    match std::fs::read_to_string(file) {
        Ok(raw) if !raw.trim().is_empty() => Ok(raw.trim().to_string()),
        Ok(_) => Err(PicksError::MissingCredential(format!(
            "{} is empty and {} is unset",
            file.display(),
            env_var
        ))),
        Err(e) => Err(PicksError::MissingCredential(format!(
            "{} unreadable ({}) and {} is unset",
            file.display(),
            e,
            env_var
        ))),
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> std::result::Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("anthropic.base_url", "https://api.anthropic.com")?
            .set_default("anthropic.model", "claude-3-5-sonnet-20240620")?
            .set_default("anthropic.api_version", "2023-06-01")?
            .set_default("anthropic.key_file", "misc/anthropic_token.txt")?
            .set_default("search.base_url", "https://api.perplexity.ai")?
            .set_default("search.key_file", "misc/perplexity_token.txt")?
            .set_default("search.tiers", vec!["large", "huge"])?
            .set_default("search.test_model", "llama-3.1-8b-instruct")?
            .set_default("search.odds_tier", "huge")?
            .set_default("search.rate_limit_delay_ms", 10_000)?
            .set_default("discord.api_base", "https://discord.com/api/v10")?
            .set_default("discord.token_file", "misc/discord_token.txt")?
            .set_default("discord.guild", "Algorhythm Bets")?
            .set_default("pipeline.expert_count", 5)?
            .set_default("pipeline.max_message_chars", 2000)?
            .set_default("pipeline.max_render_attempts", 5)?
            .set_default("ledger.directory", "picks")?
            .set_default("schedule.directory", "schedule")?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("ALGO_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (ALGO_PIPELINE__EXPERT_COUNT, etc.)
            .add_source(
                Environment::with_prefix("ALGO")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Read the credentials named by this configuration. The Discord token is
    /// only required when `publish` is set.
    pub fn credentials(&self, publish: bool) -> Result<Credentials> {
        let discord_token = if publish {
            Some(load_secret("DISCORD_TOKEN", &self.discord.token_file)?)
        } else {
            None
        };
        Ok(Credentials {
            anthropic_key: load_secret("ANTHROPIC_API_KEY", &self.anthropic.key_file)?,
            search_key: load_secret("PERPLEXITY_API_KEY", &self.search.key_file)?,
            discord_token,
        })
    }

    /// Ledger file for one sport and scheduling period
    pub fn ledger_path(&self, sport: Sport, week: u32) -> PathBuf {
        self.ledger
            .directory
            .join(sport.slug())
            .join(format!("week_{}_picks.json", week))
    }

    /// Schedule file for one sport and scheduling period
    pub fn schedule_path(&self, sport: Sport, week: u32) -> PathBuf {
        self.schedule
            .directory
            .join(sport.slug())
            .join(format!("week_{}.toml", week))
    }

    /// Validate configuration values
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !(3..=5).contains(&self.pipeline.expert_count) {
            errors.push(format!(
                "pipeline.expert_count must be between 3 and 5, got {}",
                self.pipeline.expert_count
            ));
        }

        if self.pipeline.max_message_chars == 0 {
            errors.push("pipeline.max_message_chars must be positive".to_string());
        }

        if self.pipeline.max_render_attempts == 0 {
            errors.push("pipeline.max_render_attempts must be positive".to_string());
        }

        if self.retry.max_attempts == 0 {
            errors.push("retry.max_attempts must be positive".to_string());
        }

        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            errors.push("retry.base_delay_ms should not exceed retry.max_delay_ms".to_string());
        }

        if self.search.tiers.is_empty() {
            errors.push("search.tiers must list at least one model tier".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_load_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(dir.path()).unwrap();
        assert_eq!(config.pipeline.expert_count, 5);
        assert_eq!(config.pipeline.max_message_chars, 2000);
        assert_eq!(config.search.tiers, vec!["large", "huge"]);
        assert_eq!(config.pipeline.synthesizer, SynthesizerKind::Llm);
        assert!(config.validate().is_ok());
        assert_eq!(
            config.ledger_path(Sport::Cfb, 6),
            PathBuf::from("picks/cfb/week_6_picks.json")
        );
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("default.toml")).unwrap();
        writeln!(
            file,
            r#"
[pipeline]
expert_count = 7
synthesizer = "voting"

[discord.channels]
nfl = "nfl-test"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(dir.path()).unwrap();
        assert_eq!(config.pipeline.synthesizer, SynthesizerKind::Voting);
        assert_eq!(config.discord.channel_for(Sport::Nfl), "nfl-test");
        assert_eq!(config.discord.channel_for(Sport::Cfb), "cfb-official-picks");

        let errors = config.validate().unwrap_err();
        assert!(errors[0].contains("expert_count"));
    }

    #[test]
    fn test_load_secret_trims_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key.txt");
        std::fs::write(&path, "  sk-test\n").unwrap();
        let secret = load_secret("ALGO_TEST_UNSET_SECRET_VAR", &path).unwrap();
        assert_eq!(secret, "sk-test");

        let missing = load_secret("ALGO_TEST_UNSET_SECRET_VAR", &dir.path().join("nope"));
        assert!(matches!(missing, Err(PicksError::MissingCredential(_))));
    }

    #[test]
    fn test_credentials_skip_discord_without_publishing() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::load_from(dir.path()).unwrap();
        std::fs::write(dir.path().join("anthropic.txt"), "sk-ant-secret\n").unwrap();
        std::fs::write(dir.path().join("search.txt"), "pplx-secret").unwrap();
        config.anthropic.key_file = dir.path().join("anthropic.txt");
        config.search.key_file = dir.path().join("search.txt");
        config.discord.token_file = dir.path().join("missing_discord.txt");

        let credentials = config.credentials(false).unwrap();
        assert!(credentials.discord_token.is_none());
        let debug = format!("{:?}", credentials);
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains("<not loaded>"));
        assert!(!debug.contains("secret"));

        if std::env::var("DISCORD_TOKEN").is_err() {
            assert!(matches!(
                config.credentials(true),
                Err(PicksError::MissingCredential(_))
            ));
        }
    }
}
