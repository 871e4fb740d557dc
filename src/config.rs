//! Configuration loading and validation.

use crate::error::{ConfigError, Result};
use std::time::Duration;

/// Full bot configuration for poll and one-shot modes.
#[derive(Debug, Clone)]
pub struct Config {
    /// Repository in `owner/name` form.
    pub repository: String,

    /// GitHub access token.
    pub github_token: String,

    /// Inference service configuration.
    pub inference: InferenceConfig,

    /// Reply behavior settings.
    pub bot: BotConfig,

    /// Polling settings.
    pub poll: PollConfig,
}

/// Inference service credentials and sampling parameters.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Together API key.
    pub api_key: String,

    /// Model and sampling configuration.
    pub model: ModelConfig,
}

/// Model selection and sampling parameters for completion requests.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub model: String,
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    pub repetition_penalty: f64,
    /// Maximum tokens per completion. `None` lets the service decide.
    pub max_tokens: Option<u32>,
    /// Total attempts per inference call, including the first.
    pub max_retries: u32,
    /// Base delay for exponential backoff between attempts.
    pub retry_base_delay: Duration,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: "deepseek-ai/DeepSeek-R1".into(),
            temperature: 0.6,
            top_p: 0.95,
            top_k: 50,
            repetition_penalty: 1.0,
            max_tokens: None,
            max_retries: 3,
            retry_base_delay: Duration::from_secs(2),
        }
    }
}

/// Reply behavior configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// System prompt prepended to every completion.
    pub system_prompt: String,

    /// Signature appended to every published reply.
    pub signature: String,

    /// Minimum spacing between outbound inference calls.
    pub cooldown: Duration,

    /// The bot's own login. Comments by this author fold into the preceding
    /// turn's response when rebuilding conversation history.
    pub bot_login: Option<String>,

    /// Whether to attempt an illustration for each reply.
    pub illustrate_replies: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            system_prompt: "You are a helpful AI assistant that provides clear, accurate, \
                            and polite responses. When discussing complex topics, use \
                            real-world examples to make them more relatable. Always base \
                            your responses on factual information."
                .into(),
            signature: "\n\n---\n*Response generated by DeepSeek-R1*".into(),
            cooldown: Duration::from_secs(30),
            bot_login: None,
            illustrate_replies: true,
        }
    }
}

/// Polling and dedup settings.
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    /// Wall-clock spacing between polls.
    pub interval: Duration,

    /// Look-back window for the update-time cutoff.
    pub since_minutes: i64,

    /// How many recently-updated discussions to fetch per poll.
    pub page_size: usize,

    /// Dedup set size that triggers trimming.
    pub dedup_cap: usize,

    /// Entries retained after a trim (most recent first).
    pub dedup_keep: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            since_minutes: 5,
            page_size: 10,
            dedup_cap: 1000,
            dedup_keep: 500,
        }
    }
}

impl Config {
    /// Load configuration from the environment, with CLI overrides taking
    /// precedence. Missing credentials are fatal here, before any remote
    /// call is attempted.
    pub fn load(
        repo_override: Option<String>,
        token_override: Option<String>,
        interval_override: Option<u64>,
    ) -> Result<Self> {
        let repository = repo_override
            .or_else(|| std::env::var("REPOSITORY").ok())
            .ok_or(ConfigError::MissingKey("REPOSITORY"))?;

        if !repository.contains('/') {
            return Err(ConfigError::Invalid(format!(
                "repository must be in owner/name form, got '{repository}'"
            ))
            .into());
        }

        let github_token = token_override
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .ok_or(ConfigError::MissingKey("GITHUB_TOKEN"))?;

        let inference = InferenceConfig::load()?;

        let mut bot = BotConfig {
            bot_login: std::env::var("BOT_LOGIN").ok(),
            ..BotConfig::default()
        };
        if let Some(secs) = env_u64("COOLDOWN_SECONDS")? {
            bot.cooldown = Duration::from_secs(secs);
        }
        if let Some(flag) = env_bool("ILLUSTRATE_REPLIES")? {
            bot.illustrate_replies = flag;
        }

        let mut poll = PollConfig::default();
        if let Some(secs) = interval_override {
            poll.interval = Duration::from_secs(secs);
        } else if let Some(secs) = env_u64("POLL_INTERVAL")? {
            poll.interval = Duration::from_secs(secs);
        }
        if let Some(minutes) = env_u64("SINCE_MINUTES")? {
            poll.since_minutes = minutes as i64;
        }

        Ok(Self {
            repository,
            github_token,
            inference,
            bot,
            poll,
        })
    }
}

impl InferenceConfig {
    /// Load inference credentials and model settings from the environment.
    /// This is all the terminal chat mode needs.
    pub fn load() -> Result<Self> {
        let api_key = std::env::var("TOGETHER_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingKey("TOGETHER_API_KEY"))?;

        let mut model = ModelConfig::default();
        if let Ok(name) = std::env::var("MODEL") {
            model.model = name;
        }

        Ok(Self { api_key, model })
    }
}

fn env_u64(key: &'static str) -> Result<Option<u64>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(format!("{key} must be an integer, got '{raw}'")).into()),
        Err(_) => Ok(None),
    }
}

fn env_bool(key: &'static str) -> Result<Option<bool>> {
    match std::env::var(key) {
        Ok(raw) => match raw.as_str() {
            "1" | "true" | "yes" => Ok(Some(true)),
            "0" | "false" | "no" => Ok(Some(false)),
            _ => Err(ConfigError::Invalid(format!("{key} must be a boolean, got '{raw}'")).into()),
        },
        Err(_) => Ok(None),
    }
}
