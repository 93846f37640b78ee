use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{require_key, send_json, LlmProvider, LlmRequest, LlmResult, ProviderKind};
use crate::config::ProviderConfig;
use crate::error::TaskError;
use crate::media::parse_data_url;
use crate::utils::http::join_url;

/// Google Gemini `generateContent` adapter.
///
/// Gemini has no system role here: a system prompt is sent as a leading
/// user-role message.
pub struct GeminiProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(client: Client, config: &ProviderConfig) -> Self {
        Self {
            client,
            api_key: config.gemini_api_key.clone(),
            base_url: config.gemini_base_url.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f64,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<ResponsePart>>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

fn build_request(request: &LlmRequest) -> GenerateRequest<'_> {
    let mut contents = Vec::with_capacity(2);
    if let Some(system_prompt) = request.system_prompt() {
        contents.push(Content {
            role: "user",
            parts: vec![Part::Text { text: system_prompt }],
        });
    }

    let mut parts = vec![Part::Text { text: &request.user_message }];
    for image in &request.images {
        match parse_data_url(image) {
            Some(data_url) => parts.push(Part::Inline {
                inline_data: InlineData {
                    mime_type: data_url.mime_type,
                    data: data_url.data,
                },
            }),
            None => warn!("Gemini only accepts inline image data, skipping image reference"),
        }
    }
    contents.push(Content { role: "user", parts });

    GenerateRequest {
        contents,
        generation_config: GenerationConfig {
            temperature: request.temperature,
        },
    }
}

/// `candidates[0].content.parts[0].text`, or empty if any link is missing.
fn extract_text(response: GenerateResponse) -> String {
    response
        .candidates
        .into_iter()
        .flatten()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().flatten().next())
        .and_then(|part| part.text)
        .unwrap_or_default()
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResult, TaskError> {
        let api_key = require_key(&self.api_key, "GEMINI_API_KEY")?;

        let url = join_url(&self.base_url, &format!("models/{}:generateContent", request.model));
        let http = self.client.post(url).query(&[("key", api_key)]);

        let response: GenerateResponse = send_json(self.kind(), http, &build_request(request)).await?;
        let text = extract_text(response);

        Ok(LlmResult {
            // character count, not tokens
            tokens_used: text.chars().count() as u64,
            text,
            model: request.model.clone(),
        })
    }
}
