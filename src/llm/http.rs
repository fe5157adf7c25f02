//! OpenAI-compatible chat-completions transport over `reqwest`.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;

use crate::config::AiConfig;
use crate::error::LlmError;
use crate::llm::provider::{CompletionRequest, CompletionResponse, LlmProvider};

/// Maximum number of error-body bytes kept in `LlmError::Status`.
const ERROR_BODY_LIMIT: usize = 512;

/// Chat-completions client. Holds one pooled `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct HttpChatProvider {
    client: reqwest::Client,
}

impl HttpChatProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured client (proxies, TLS roots).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionBody {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<AssistantMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl LlmProvider for HttpChatProvider {
    async fn complete(
        &self,
        config: &AiConfig,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, LlmError> {
        let response = self
            .client
            .post(&config.endpoint)
            .bearer_auth(config.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: truncate(&body, ERROR_BODY_LIMIT),
            });
        }

        let body: ChatCompletionBody = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        parse_completion(body)
    }
}

fn parse_completion(body: ChatCompletionBody) -> Result<CompletionResponse, LlmError> {
    let choice = body
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::InvalidResponse("response has no choices".into()))?;

    let content = choice
        .message
        .and_then(|m| m.content)
        .ok_or_else(|| LlmError::InvalidResponse("first choice has no message content".into()))?;

    Ok(CompletionResponse {
        content,
        finish_reason: choice.finish_reason,
    })
}

fn truncate(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<CompletionResponse, LlmError> {
        parse_completion(serde_json::from_str(raw).unwrap())
    }

    #[test]
    fn parses_first_choice() {
        let response = parse(
            r#"{"choices": [{"message": {"role": "assistant", "content": " Billing \n"}, "finish_reason": "stop"},
                            {"message": {"content": "Other"}}]}"#,
        )
        .unwrap();
        assert_eq!(response.content, " Billing \n");
        assert_eq!(response.finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn empty_choices_is_invalid() {
        let err = parse(r#"{"choices": []}"#).unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
    }

    #[test]
    fn null_content_is_invalid() {
        let err = parse(r#"{"choices": [{"message": {"content": null}}]}"#).unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
    }
}
