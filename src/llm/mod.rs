use std::fmt::Display;

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ProviderConfig;
use crate::error::TaskError;
use crate::utils::http::{build_client, error_parts};

pub mod claude;
pub mod gemini;
pub mod openai;

pub use claude::ClaudeProvider;
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;

const DEFAULT_TEMPERATURE: f64 = 0.7;

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

/// Provider-neutral LLM invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmRequest {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    pub user_message: String,
    /// Image references: `data:` URLs or remote URLs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

impl LlmRequest {
    pub fn new(model: impl Into<String>, user_message: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompt: None,
            user_message: user_message.into(),
            images: Vec::new(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// System prompt, with an empty string treated as absent.
    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref().filter(|prompt| !prompt.is_empty())
    }

    pub fn validate(&self) -> Result<ProviderKind, TaskError> {
        if self.user_message.trim().is_empty() {
            return Err(TaskError::Validation("userMessage is required".to_string()));
        }
        if !self.temperature.is_finite() {
            return Err(TaskError::Validation(format!("invalid temperature: {}", self.temperature)));
        }
        ProviderKind::for_model(&self.model)
    }
}

/// Normalized provider output.
///
/// `tokens_used` is provider-specific: Gemini reports the character length of
/// the text, the others report real token counts. Do not compare it across
/// providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmResult {
    pub text: String,
    pub model: String,
    pub tokens_used: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    Gemini,
    OpenAi,
    Claude,
}

/// Model-name prefixes, checked in order. The prefixes are disjoint, so at
/// most one entry can match.
pub const PROVIDER_PREFIXES: [(&str, ProviderKind); 3] = [
    ("gemini", ProviderKind::Gemini),
    ("gpt", ProviderKind::OpenAi),
    ("claude", ProviderKind::Claude),
];

impl ProviderKind {
    pub fn for_model(model: &str) -> Result<Self, TaskError> {
        PROVIDER_PREFIXES
            .iter()
            .find(|(prefix, _)| model.starts_with(prefix))
            .map(|(_, kind)| *kind)
            .ok_or_else(|| TaskError::UnknownModel(model.to_string()))
    }
}

impl Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Gemini => write!(f, "Gemini"),
            ProviderKind::OpenAi => write!(f, "OpenAI"),
            ProviderKind::Claude => write!(f, "Claude"),
        }
    }
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResult, TaskError>;
}

/// Fails fast when a provider's credential is not configured.
pub(crate) fn require_key<'a>(key: &'a Option<String>, var: &str) -> Result<&'a str, TaskError> {
    key.as_deref()
        .ok_or_else(|| TaskError::Config(format!("{} not set", var)))
}

/// Sends one provider request. Non-2xx responses become `ProviderError` with
/// the body kept verbatim; there is no retry at this layer.
pub(crate) async fn send_json<B, R>(
    provider: ProviderKind,
    request: RequestBuilder,
    body: &B,
) -> Result<R, TaskError>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    debug!("Sending request to {}", provider);
    let response = request.json(body).send().await?;

    if !response.status().is_success() {
        let (status, body) = error_parts(response).await;
        return Err(TaskError::Provider { provider, status, body });
    }

    let status = response.status().as_u16();
    info!("{} responded with {}", provider, status);

    // 2xx but not the expected JSON
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| {
        warn!("Failed to decode {} response: {}", provider, e);
        TaskError::Provider {
            provider,
            status,
            body: text,
        }
    })
}

/// Routes each request to the one adapter its model prefix selects.
pub struct LlmRouter {
    gemini: GeminiProvider,
    openai: OpenAiProvider,
    claude: ClaudeProvider,
}

impl LlmRouter {
    pub fn new(config: &ProviderConfig) -> Self {
        let client = build_client(config.request_timeout);
        Self {
            gemini: GeminiProvider::new(client.clone(), config),
            openai: OpenAiProvider::new(client.clone(), config),
            claude: ClaudeProvider::new(client, config),
        }
    }

    pub fn provider(&self, kind: ProviderKind) -> &dyn LlmProvider {
        match kind {
            ProviderKind::Gemini => &self.gemini,
            ProviderKind::OpenAi => &self.openai,
            ProviderKind::Claude => &self.claude,
        }
    }

    /// Forwards `request` unchanged and returns the adapter's result unchanged.
    pub async fn complete(&self, request: &LlmRequest) -> Result<LlmResult, TaskError> {
        let kind = ProviderKind::for_model(&request.model)?;
        info!("Routing model {} to {}", request.model, kind);
        self.provider(kind).complete(request).await
    }
}
