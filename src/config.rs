use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
const TRIGGER_API_URL: &str = "https://api.trigger.dev";
const SERVER_ADDR: &str = "127.0.0.1:7200";

/// Reads `key` from the process environment, then from `.env`.
/// Blank values are treated as unset.
pub fn env_var(key: &str) -> Option<String> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => dotenv::var(key).ok()?,
    };
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_var(key)
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_addr: SocketAddr,
    pub providers: ProviderConfig,
    pub media: MediaConfig,
    pub execution: ExecutionConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let server_addr = env_var("SERVER_ADDR")
            .unwrap_or_else(|| SERVER_ADDR.to_string())
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid SERVER_ADDR: {}", e))?;

        Ok(Self {
            server_addr,
            providers: ProviderConfig::from_env(),
            media: MediaConfig::from_env(),
            execution: ExecutionConfig::from_env(),
        })
    }
}

/// Credentials and endpoints for the three LLM providers.
///
/// A missing key only matters to the adapter that needs it.
#[derive(Clone)]
pub struct ProviderConfig {
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub gemini_base_url: String,
    pub openai_base_url: String,
    pub anthropic_base_url: String,
    pub request_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            openai_api_key: None,
            anthropic_api_key: None,
            gemini_base_url: GEMINI_BASE_URL.to_string(),
            openai_base_url: OPENAI_BASE_URL.to_string(),
            anthropic_base_url: ANTHROPIC_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl ProviderConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            gemini_api_key: env_var("GEMINI_API_KEY"),
            openai_api_key: env_var("OPENAI_API_KEY"),
            anthropic_api_key: env_var("ANTHROPIC_API_KEY"),
            gemini_base_url: env_var("GEMINI_BASE_URL").unwrap_or(defaults.gemini_base_url),
            openai_base_url: env_var("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            anthropic_base_url: env_var("ANTHROPIC_BASE_URL").unwrap_or(defaults.anthropic_base_url),
            request_timeout: Duration::from_secs(env_parse("LLM_REQUEST_TIMEOUT_SECS", 120)),
        }
    }
}

// keys stay out of logs
impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("gemini_api_key", &self.gemini_api_key.as_ref().map(|_| "<set>"))
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "<set>"))
            .field("anthropic_api_key", &self.anthropic_api_key.as_ref().map(|_| "<set>"))
            .field("gemini_base_url", &self.gemini_base_url)
            .field("openai_base_url", &self.openai_base_url)
            .field("anthropic_base_url", &self.anthropic_base_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub temp_dir: PathBuf,
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub fetch_timeout: Duration,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            temp_dir: env::temp_dir(),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            fetch_timeout: Duration::from_secs(60),
        }
    }
}

impl MediaConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            temp_dir: env_var("MEDIA_TEMP_DIR").map(PathBuf::from).unwrap_or(defaults.temp_dir),
            ffmpeg_path: env_var("FFMPEG_PATH").map(PathBuf::from).unwrap_or(defaults.ffmpeg_path),
            ffprobe_path: env_var("FFPROBE_PATH").map(PathBuf::from).unwrap_or(defaults.ffprobe_path),
            fetch_timeout: Duration::from_secs(env_parse("MEDIA_FETCH_TIMEOUT_SECS", 60)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

/// Global retry policy of the execution service.
///
/// A failed run is re-invoked from scratch; the task body never retries.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub min_timeout: Duration,
    pub max_timeout: Duration,
    pub factor: u32,
    pub enabled_in_dev: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            min_timeout: Duration::from_millis(1000),
            max_timeout: Duration::from_millis(10000),
            factor: 2,
            enabled_in_dev: false,
        }
    }
}

impl RetryPolicy {
    pub fn attempts_for(&self, environment: Environment) -> u32 {
        match environment {
            Environment::Development if !self.enabled_in_dev => 1,
            _ => self.max_attempts.max(1),
        }
    }

    /// Backoff before the attempt following `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let multiplier = self.factor.saturating_pow(exponent);
        self.min_timeout
            .saturating_mul(multiplier)
            .min(self.max_timeout)
    }
}

#[derive(Clone)]
pub struct TriggerConfig {
    pub api_url: String,
    pub secret_key: String,
}

impl std::fmt::Debug for TriggerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerConfig")
            .field("api_url", &self.api_url)
            .field("secret_key", &"<set>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    pub environment: Environment,
    pub retry: RetryPolicy,
    pub default_max_duration: Duration,
    pub workers_per_task: usize,
    pub retention: chrono::Duration,
    /// Set when runs are handed to a remote execution service.
    pub trigger: Option<TriggerConfig>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            retry: RetryPolicy::default(),
            default_max_duration: Duration::from_secs(300),
            workers_per_task: 2,
            retention: chrono::Duration::hours(24),
            trigger: None,
        }
    }
}

impl ExecutionConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let trigger = env_var("TRIGGER_SECRET_KEY").map(|secret_key| TriggerConfig {
            api_url: env_var("TRIGGER_API_URL").unwrap_or_else(|| TRIGGER_API_URL.to_string()),
            secret_key,
        });

        Self {
            environment: env_var("APP_ENV")
                .map(|value| Environment::parse(&value))
                .unwrap_or(defaults.environment),
            retry: defaults.retry,
            default_max_duration: env_var("TASK_MAX_DURATION_SECS")
                .and_then(|value| value.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.default_max_duration),
            workers_per_task: env_parse("WORKER_CONCURRENCY", defaults.workers_per_task).max(1),
            retention: defaults.retention,
            trigger,
        }
    }
}
