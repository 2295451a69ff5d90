use anyhow::{anyhow, Result};
use std::env;
use std::time::Duration;
use tracing::{info, warn};

use crate::ai_providers::ProviderId;
use crate::extraction::ExtractionPolicy;

// Import logging macros
use crate::{log_system_event, log_validation};

/// Complete application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub ai: AiConfig,
    pub extraction: ExtractionPolicy,
    pub practice: PracticeConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// Database connection configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Completion gateway configuration
#[derive(Debug, Clone)]
pub struct AiConfig {
    /// Provider used when the user's settings do not name one
    pub default_provider: ProviderId,
    /// Operator key for the default provider, used when the user left theirs blank
    pub default_api_key: Option<String>,
    pub request_timeout: Option<Duration>,
    pub deepseek_base_url: Option<String>,
    pub openai_base_url: Option<String>,
    pub gemini_base_url: Option<String>,
}

/// Quiz scoring configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PracticeConfig {
    /// Minimum 0-100 score that counts as a correct answer
    pub pass_threshold: u32,
    pub default_question_count: usize,
}

impl Default for PracticeConfig {
    fn default() -> Self {
        Self {
            pass_threshold: 70,
            default_question_count: 10,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

/// Logging system configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub file_enabled: bool,
    pub console_enabled: bool,
    pub log_directory: String,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Result<Self> {
        log_system_event!(config, "Loading application configuration from environment variables");

        let config = Config {
            database: DatabaseConfig::from_env()?,
            ai: AiConfig::from_env()?,
            extraction: extraction_policy_from_env()?,
            practice: practice_config_from_env()?,
            server: ServerConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        };

        log_system_event!(config, "Configuration loaded successfully");

        Ok(config)
    }

    /// Log a summary of loaded configuration (without sensitive data)
    pub fn log_configuration_summary(&self) {
        let masked_key = self
            .ai
            .default_api_key
            .as_deref()
            .map(mask_sensitive_data)
            .unwrap_or_else(|| "<unset>".to_string());

        info!(
            database_url_masked = %mask_sensitive_data(&self.database.url),
            default_provider = %self.ai.default_provider,
            default_api_key = %masked_key,
            request_timeout = ?self.ai.request_timeout,
            extraction_policy = ?self.extraction,
            pass_threshold = self.practice.pass_threshold,
            server_address = %format!("{}:{}", self.server.host, self.server.port),
            log_level = %self.logging.level,
            "Configuration summary"
        );
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if let Err(e) = self.check_values() {
            log_validation!(failure, "configuration", error = e);
            return Err(e);
        }

        if self.ai.default_api_key.as_deref().is_none_or(|key| key.trim().is_empty()) {
            warn!(
                provider = %self.ai.default_provider,
                "No AI_DEFAULT_API_KEY configured - users must supply their own API key"
            );
        }

        if !["trace", "debug", "info", "warn", "error"]
            .iter()
            .any(|level| self.logging.level.to_lowercase().starts_with(level))
        {
            warn!("Unusual log level '{}', relying on EnvFilter parsing", self.logging.level);
        }

        log_validation!(success, "configuration", "Configuration validated");
        Ok(())
    }

    fn check_values(&self) -> Result<()> {
        if !self.database.url.starts_with("sqlite:") {
            return Err(anyhow!("DATABASE_URL must start with 'sqlite:'"));
        }

        if self.server.port == 0 {
            return Err(anyhow!("Server port must be greater than 0"));
        }

        if self.practice.pass_threshold > 100 {
            return Err(anyhow!("PRACTICE_PASS_THRESHOLD must be between 0 and 100"));
        }

        if self.extraction.max_rounds == 0 || self.extraction.max_total == 0 {
            return Err(anyhow!("Extraction rounds and total must be greater than 0"));
        }

        Ok(())
    }
}

impl DatabaseConfig {
    fn from_env() -> Result<Self> {
        let url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:lyric_vocab.db".to_string());

        Ok(DatabaseConfig { url })
    }
}

impl AiConfig {
    fn from_env() -> Result<Self> {
        let default_provider = parse_provider(
            &env::var("AI_DEFAULT_PROVIDER").unwrap_or_else(|_| "deepseek".to_string()),
        );

        let default_api_key = env::var("AI_DEFAULT_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        let request_timeout = match env::var("AI_REQUEST_TIMEOUT_SECS") {
            Ok(raw) => {
                let secs = parse_number::<u64>("AI_REQUEST_TIMEOUT_SECS", &raw)?;
                Some(Duration::from_secs(secs))
            }
            Err(_) => None,
        };

        Ok(AiConfig {
            default_provider,
            default_api_key,
            request_timeout,
            deepseek_base_url: env::var("DEEPSEEK_BASE_URL").ok(),
            openai_base_url: env::var("OPENAI_BASE_URL").ok(),
            gemini_base_url: env::var("GEMINI_BASE_URL").ok(),
        })
    }

    pub fn base_url_override(&self, provider: ProviderId) -> Option<&str> {
        match provider {
            ProviderId::DeepSeek => self.deepseek_base_url.as_deref(),
            ProviderId::OpenAi => self.openai_base_url.as_deref(),
            ProviderId::Gemini => self.gemini_base_url.as_deref(),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            default_provider: ProviderId::DeepSeek,
            default_api_key: None,
            request_timeout: None,
            deepseek_base_url: None,
            openai_base_url: None,
            gemini_base_url: None,
        }
    }
}

fn extraction_policy_from_env() -> Result<ExtractionPolicy> {
    let defaults = ExtractionPolicy::default();

    Ok(ExtractionPolicy {
        max_rounds: env_number("EXTRACTION_MAX_ROUNDS", defaults.max_rounds)?,
        batch_size: env_number("EXTRACTION_BATCH_SIZE", defaults.batch_size)?,
        min_new_per_round: env_number("EXTRACTION_MIN_NEW_PER_ROUND", defaults.min_new_per_round)?,
        max_total: env_number("EXTRACTION_MAX_TOTAL", defaults.max_total)?,
    })
}

fn practice_config_from_env() -> Result<PracticeConfig> {
    let defaults = PracticeConfig::default();

    Ok(PracticeConfig {
        pass_threshold: env_number("PRACTICE_PASS_THRESHOLD", defaults.pass_threshold)?,
        default_question_count: env_number(
            "PRACTICE_QUESTION_COUNT",
            defaults.default_question_count,
        )?,
    })
}

impl ServerConfig {
    fn from_env() -> Result<Self> {
        let port_str = env::var("PORT").unwrap_or_else(|_| "3000".to_string());

        let port = port_str.parse::<u16>().map_err(|_| {
            anyhow!("Invalid PORT value: '{}'. Must be a number between 1-65535", port_str)
        })?;

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        Ok(ServerConfig { port, host })
    }
}

impl LoggingConfig {
    fn from_env() -> Result<Self> {
        let level = env::var("RUST_LOG").unwrap_or_else(|_| "info,lyric_vocab=debug".to_string());

        let file_enabled = env::var("LOG_FILE_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .unwrap_or(true);

        let console_enabled = env::var("LOG_CONSOLE_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .unwrap_or(true);

        let log_directory = env::var("LOG_DIRECTORY").unwrap_or_else(|_| "logs".to_string());

        Ok(LoggingConfig {
            level,
            file_enabled,
            console_enabled,
            log_directory,
        })
    }
}

/// Parse a provider name, falling back to the built-in default provider
pub fn parse_provider(value: &str) -> ProviderId {
    value.parse::<ProviderId>().unwrap_or_else(|_| {
        info!("Unknown AI provider '{}', defaulting to deepseek", value);
        ProviderId::DeepSeek
    })
}

fn env_number<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => parse_number(name, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| anyhow!("Invalid {} value: '{}'. Must be a non-negative number", name, raw))
}

/// Mask sensitive data in configuration for safe logging
fn mask_sensitive_data(data: &str) -> String {
    let chars: Vec<char> = data.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}***{}", head, tail)
    }
}
