use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{require_key, send_json, LlmProvider, LlmRequest, LlmResult, ProviderKind};
use crate::config::ProviderConfig;
use crate::error::TaskError;
use crate::utils::http::join_url;

/// OpenAI-compatible chat completions adapter.
pub struct OpenAiProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(client: Client, config: &ProviderConfig) -> Self {
        Self {
            client,
            api_key: config.openai_api_key.clone(),
            base_url: config.openai_base_url.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f64,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: MessageContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Debug, Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<Choice>>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: Option<u64>,
}

fn build_request(request: &LlmRequest) -> ChatRequest<'_> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system_prompt) = request.system_prompt() {
        messages.push(ChatMessage {
            role: "system",
            content: MessageContent::Text(system_prompt),
        });
    }

    let content = if request.images.is_empty() {
        MessageContent::Text(&request.user_message)
    } else {
        let mut parts = vec![ContentPart::Text { text: &request.user_message }];
        parts.extend(request.images.iter().map(|url| ContentPart::ImageUrl {
            image_url: ImageUrl { url: url.as_str() },
        }));
        MessageContent::Parts(parts)
    };
    messages.push(ChatMessage { role: "user", content });

    ChatRequest {
        model: &request.model,
        temperature: request.temperature,
        messages,
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResult, TaskError> {
        let api_key = require_key(&self.api_key, "OPENAI_API_KEY")?;

        let http = self
            .client
            .post(join_url(&self.base_url, "chat/completions"))
            .bearer_auth(api_key);

        let response: ChatResponse = send_json(self.kind(), http, &build_request(request)).await?;

        let text = response
            .choices
            .into_iter()
            .flatten()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .unwrap_or_default();
        let tokens_used = response
            .usage
            .and_then(|usage| usage.total_tokens)
            .unwrap_or(0);

        Ok(LlmResult {
            text,
            model: request.model.clone(),
            tokens_used,
        })
    }
}
