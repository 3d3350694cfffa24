// src/core/llm_client.rs
//! Chat-completion client for the language-model gateway

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::core::config_manager::LlmConfig;

const CHAT_COMPLETIONS_ENDPOINT: &str = "/chat/completions";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a job application assistant. Be concise.";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("gateway returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("gateway returned an empty response")]
    EmptyResponse,
    #[error("malformed gateway response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_system(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Anything that turns a prompt into free text
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, GatewayError>;
}

// ===== Wire Types =====

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Nested { error: ErrorDetail },
    Flat { error: String },
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl ErrorBody {
    fn message(self) -> String {
        match self {
            Self::Nested { error } => error.message,
            Self::Flat { error } => error,
        }
    }
}

// ===== HTTP Client =====

pub struct LlmClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to create HTTP client")?;

        if config.api_key.is_none() {
            warn!("LLM_API_KEY is not set, gateway calls will likely be rejected");
        }

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl LanguageModel for LlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, GatewayError> {
        let url = format!("{}{}", self.base_url, CHAT_COMPLETIONS_ENDPOINT);

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system_prompt.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });

        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        debug!("Calling language model gateway: {}", url);

        let mut builder = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        let response_text = response.text().await?;
        trace!("Gateway response {}: {}", status, response_text);

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&response_text)
                .map(ErrorBody::message)
                .unwrap_or(response_text);
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&response_text)
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(GatewayError::EmptyResponse);
        }

        Ok(content)
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned replies in order; an exhausted script fails with `EmptyResponse`
    #[derive(Default)]
    pub struct ScriptedModel {
        replies: Mutex<VecDeque<Result<String, GatewayError>>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedModel {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn reply(self, text: &str) -> Self {
            self.replies.lock().unwrap().push_back(Ok(text.to_string()));
            self
        }

        pub fn fail(self, error: GatewayError) -> Self {
            self.replies.lock().unwrap().push_back(Err(error));
            self
        }

        pub fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn prompts(&self) -> Vec<String> {
            self.requests().into_iter().map(|r| r.prompt).collect()
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn complete(&self, request: CompletionRequest) -> Result<String, GatewayError> {
            self.requests.lock().unwrap().push(request);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(GatewayError::EmptyResponse))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(url: &str) -> LlmConfig {
        LlmConfig {
            api_url: url.to_string(),
            api_key: Some("secret".into()),
            model: "test-model".into(),
            timeout: Duration::from_secs(5),
            prompt_char_limit: 1000,
        }
    }

    #[tokio::test]
    async fn test_complete_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer secret"))
            .and(body_partial_json(serde_json::json!({
                "model": "test-model",
                "messages": [
                    {"role": "system", "content": DEFAULT_SYSTEM_PROMPT},
                    {"role": "user", "content": "Hello"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "  Hi there \n"}}]
            })))
            .mount(&server)
            .await;

        let client = LlmClient::new(&config(&server.uri())).unwrap();
        let reply = client.complete(CompletionRequest::new("Hello")).await.unwrap();
        assert_eq!(reply, "Hi there");
    }

    #[tokio::test]
    async fn test_sampling_options_are_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "messages": [
                    {"role": "system", "content": "Write letters."},
                    {"role": "user", "content": "Hello"}
                ],
                "temperature": 0.5,
                "max_tokens": 200
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "Dear team"}}]
            })))
            .mount(&server)
            .await;

        let client = LlmClient::new(&config(&server.uri())).unwrap();
        let request = CompletionRequest::new("Hello")
            .with_system("Write letters.")
            .with_temperature(0.5)
            .with_max_tokens(200);
        assert_eq!(client.complete(request).await.unwrap(), "Dear team");
    }

    #[tokio::test]
    async fn test_api_error_message_is_extracted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"message": "rate limited"}
            })))
            .mount(&server)
            .await;

        let client = LlmClient::new(&config(&server.uri())).unwrap();
        match client.complete(CompletionRequest::new("Hello")).await {
            Err(GatewayError::Api { status, message }) => {
                assert_eq!(status, 429);
                assert_eq!(message, "rate limited");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_and_garbled_responses_are_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let client = LlmClient::new(&config(&server.uri())).unwrap();
        assert!(matches!(
            client.complete(CompletionRequest::new("x")).await,
            Err(GatewayError::EmptyResponse)
        ));

        let garbled = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&garbled)
            .await;

        let client = LlmClient::new(&config(&garbled.uri())).unwrap();
        assert!(matches!(
            client.complete(CompletionRequest::new("x")).await,
            Err(GatewayError::Malformed(_))
        ));
    }
}
