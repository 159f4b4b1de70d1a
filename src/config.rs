//! Environment-driven configuration.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

// --- Environment variables ---
const DATABASE_URL_ENV_VAR: &str = "DATABASE_URL";
const BIND_ADDR_ENV_VAR: &str = "BIND_ADDR";
const API_KEY_ENV_VAR: &str = "OPENAI_API_KEY";
const AI_BASE_URL_ENV_VAR: &str = "AI_BASE_URL";
const AI_CHAT_MODEL_ENV_VAR: &str = "AI_CHAT_MODEL";
const AI_TRANSCRIPTION_MODEL_ENV_VAR: &str = "AI_TRANSCRIPTION_MODEL";
const AI_TIMEOUT_ENV_VAR: &str = "AI_TIMEOUT_SECS";

// --- Defaults ---
const DEFAULT_DATABASE_URL: &str = "sqlite://study-deck.db";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5600";
const DEFAULT_AI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub ai: AiConfig,
}

/// Settings for the OpenAI-compatible completion and transcription endpoint.
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub base_url: String,
    /// Generation calls fail with `AppError::Generation` while this is unset.
    pub api_key: Option<String>,
    pub chat_model: String,
    pub transcription_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_AI_BASE_URL.to_string(),
            api_key: None,
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 2000,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl AiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let timeout_secs = match env::var(AI_TIMEOUT_ENV_VAR) {
            Ok(raw) => raw
                .parse::<u64>()
                .map_err(|e| format!("{} must be a number of seconds: {}", AI_TIMEOUT_ENV_VAR, e))?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        let config = Self {
            database_url: env_or(DATABASE_URL_ENV_VAR, DEFAULT_DATABASE_URL),
            bind_addr: env_or(BIND_ADDR_ENV_VAR, DEFAULT_BIND_ADDR),
            ai: AiConfig {
                base_url: env_or(AI_BASE_URL_ENV_VAR, DEFAULT_AI_BASE_URL),
                api_key: env::var(API_KEY_ENV_VAR).ok().filter(|k| !k.trim().is_empty()),
                chat_model: env_or(AI_CHAT_MODEL_ENV_VAR, DEFAULT_CHAT_MODEL),
                transcription_model: env_or(AI_TRANSCRIPTION_MODEL_ENV_VAR, DEFAULT_TRANSCRIPTION_MODEL),
                timeout_secs,
                ..AiConfig::default()
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        self.bind_addr
            .parse::<SocketAddr>()
            .map_err(|e| format!("invalid {} {:?}: {}", BIND_ADDR_ENV_VAR, self.bind_addr, e))?;

        if !self.ai.base_url.starts_with("http://") && !self.ai.base_url.starts_with("https://") {
            return Err(format!("{} must start with http:// or https://", AI_BASE_URL_ENV_VAR));
        }

        if self.ai.timeout_secs == 0 {
            return Err(format!("{} must be greater than 0", AI_TIMEOUT_ENV_VAR));
        }

        Ok(())
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
