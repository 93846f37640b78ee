use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{require_key, send_json, LlmProvider, LlmRequest, LlmResult, ProviderKind};
use crate::config::ProviderConfig;
use crate::error::TaskError;
use crate::media::parse_data_url;
use crate::utils::http::join_url;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

/// Anthropic Messages API adapter.
///
/// The system prompt goes in the top-level `system` field. Output is capped
/// at a fixed `max_tokens` and the caller's temperature is not forwarded.
pub struct ClaudeProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl ClaudeProvider {
    pub fn new(client: Client, config: &ProviderConfig) -> Self {
        Self {
            client,
            api_key: config.anthropic_api_key.clone(),
            base_url: config.anthropic_base_url.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: MessageContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Blocks(Vec<ContentBlock<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentBlock<'a> {
    Text { text: &'a str },
    Image { source: ImageSource<'a> },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ImageSource<'a> {
    Base64 { media_type: &'a str, data: &'a str },
    Url { url: &'a str },
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Option<Vec<ResponseBlock>>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
}

fn build_request(request: &LlmRequest) -> MessagesRequest<'_> {
    let content = if request.images.is_empty() {
        MessageContent::Text(&request.user_message)
    } else {
        let mut blocks: Vec<ContentBlock> = request
            .images
            .iter()
            .map(|image| {
                let source = match parse_data_url(image) {
                    Some(data_url) => ImageSource::Base64 {
                        media_type: data_url.mime_type,
                        data: data_url.data,
                    },
                    None => ImageSource::Url { url: image.as_str() },
                };
                ContentBlock::Image { source }
            })
            .collect();
        blocks.push(ContentBlock::Text { text: &request.user_message });
        MessageContent::Blocks(blocks)
    };

    MessagesRequest {
        model: &request.model,
        max_tokens: MAX_TOKENS,
        system: request.system_prompt(),
        messages: vec![Message { role: "user", content }],
    }
}

#[async_trait]
impl LlmProvider for ClaudeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Claude
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResult, TaskError> {
        let api_key = require_key(&self.api_key, "ANTHROPIC_API_KEY")?;

        let http = self
            .client
            .post(join_url(&self.base_url, "messages"))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION);

        let response: MessagesResponse = send_json(self.kind(), http, &build_request(request)).await?;

        let text = response
            .content
            .into_iter()
            .flatten()
            .next()
            .and_then(|block| block.text)
            .unwrap_or_default();
        let tokens_used = response
            .usage
            .map(|usage| usage.input_tokens.unwrap_or(0) + usage.output_tokens.unwrap_or(0))
            .unwrap_or(0);

        Ok(LlmResult {
            text,
            model: request.model.clone(),
            tokens_used,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::spawn_stub;
    use axum::{
        extract::State,
        http::{HeaderMap, StatusCode},
        routing::post,
        Json, Router,
    };
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    type Captured = Arc<Mutex<Vec<(HeaderMap, Value)>>>;

    async fn stub(reply: Value, status: StatusCode) -> (String, Captured) {
        let captured: Captured = Arc::default();
        let state = (captured.clone(), reply, status);
        let app = Router::new()
            .route(
                "/messages",
                post(
                    |State((captured, reply, status)): State<(Captured, Value, StatusCode)>,
                     headers: HeaderMap,
                     Json(body): Json<Value>| async move {
                        captured.lock().unwrap().push((headers, body));
                        (status, Json(reply))
                    },
                ),
            )
            .with_state(state);
        (spawn_stub(app).await, captured)
    }

    fn provider(base: &str, key: Option<&str>) -> ClaudeProvider {
        ClaudeProvider::new(
            Client::new(),
            &ProviderConfig {
                anthropic_api_key: key.map(str::to_string),
                anthropic_base_url: base.to_string(),
                ..ProviderConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn test_messages_call_with_top_level_system() {
        let reply = json!({
            "content": [{ "type": "text", "text": "Bonjour" }],
            "usage": { "input_tokens": 12, "output_tokens": 3 }
        });
        let (base, captured) = stub(reply, StatusCode::OK).await;

        let request = LlmRequest::new("claude-3-5-sonnet-latest", "Say hi in French")
            .with_system_prompt("You are a translator")
            .with_temperature(0.1);
        let result = provider(&base, Some("a-key")).complete(&request).await.unwrap();

        assert_eq!(result.text, "Bonjour");
        assert_eq!(result.tokens_used, 15);

        let captured = captured.lock().unwrap();
        let (headers, body) = &captured[0];
        assert_eq!(headers.get("x-api-key").unwrap(), "a-key");
        assert_eq!(headers.get("anthropic-version").unwrap(), "2023-06-01");
        assert_eq!(
            body,
            &json!({
                "model": "claude-3-5-sonnet-latest",
                "max_tokens": 4096,
                "system": "You are a translator",
                "messages": [{ "role": "user", "content": "Say hi in French" }]
            })
        );
    }

    #[tokio::test]
    async fn test_system_field_omitted_and_partial_usage() {
        let reply = json!({ "content": [{ "type": "text", "text": "ok" }], "usage": { "output_tokens": 4 } });
        let (base, captured) = stub(reply, StatusCode::OK).await;

        let result = provider(&base, Some("a-key"))
            .complete(&LlmRequest::new("claude-3-haiku", "hi"))
            .await
            .unwrap();
        assert_eq!(result.tokens_used, 4);

        let captured = captured.lock().unwrap();
        assert!(captured[0].1.get("system").is_none());
    }

    #[tokio::test]
    async fn test_null_content_yields_empty_result() {
        for reply in [
            json!({ "content": null, "usage": null }),
            json!({ "content": [{ "type": "text", "text": null }], "usage": { "input_tokens": null, "output_tokens": 4 } }),
        ] {
            let (base, _) = stub(reply.clone(), StatusCode::OK).await;
            let result = provider(&base, Some("sk-ant"))
                .complete(&LlmRequest::new("claude-3-haiku-20240307", "hi"))
                .await
                .unwrap_or_else(|e| panic!("{} failed: {:?}", reply, e));
            assert_eq!(result.text, "");
        }
    }

    #[tokio::test]
    async fn test_overloaded_surfaces_as_provider_error() {
        let reply = json!({ "type": "error", "error": { "type": "overloaded_error" } });
        let (base, _) = stub(reply, StatusCode::SERVICE_UNAVAILABLE).await;

        let err = provider(&base, Some("a-key"))
            .complete(&LlmRequest::new("claude-3-opus", "hi"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TaskError::Provider { provider: ProviderKind::Claude, status: 503, ref body } if body.contains("overloaded_error")
        ));
    }

    #[tokio::test]
    async fn test_missing_key_is_config_error() {
        let err = provider("http://127.0.0.1:1", None)
            .complete(&LlmRequest::new("claude-3-opus", "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::Config(ref msg) if msg.contains("ANTHROPIC_API_KEY")));
    }

    #[test]
    fn test_image_blocks_precede_text() {
        let request = LlmRequest::new("claude-3-opus", "compare")
            .with_images(vec!["data:image/jpeg;base64,QUJD".to_string(), "https://x/dog.png".to_string()]);
        let body = serde_json::to_value(build_request(&request)).unwrap();
        assert_eq!(
            body["messages"][0]["content"],
            json!([
                { "type": "image", "source": { "type": "base64", "media_type": "image/jpeg", "data": "QUJD" } },
                { "type": "image", "source": { "type": "url", "url": "https://x/dog.png" } },
                { "type": "text", "text": "compare" }
            ])
        );
    }
}
