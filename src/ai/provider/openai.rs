//! OpenAI API Provider
//!
//! Chat Completions adapter. The request deadline is enforced on our side by
//! dropping the in-flight request future, and an expired deadline counts as
//! retryable. Statuses 408, 429 and 504 are retried; every other error status
//! fails on the first attempt.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::{
    ChatMessage, Completion, CompletionOptions, LlmClient, ProviderSettings, RetryPolicy,
    TokenUsage, retry_after_header, with_retry,
};
use crate::ai::timeout::with_timeout;
use crate::constants::provider as defaults;
use crate::types::{ErrorCategory, LlmError, ReportError, Result};

const PROVIDER: &str = "openai";

/// OpenAI API client with secure API key handling
pub struct OpenAiClient {
    /// API key stored securely - never exposed in logs or debug output
    api_key: SecretString,
    api_base: String,
    model: String,
    timeout: Duration,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OpenAiClient {
    pub fn new(settings: ProviderSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ReportError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key: settings.api_key,
            api_base: settings.api_base,
            model: settings
                .model
                .unwrap_or_else(|| defaults::OPENAI_DEFAULT_MODEL.to_string()),
            timeout: settings.timeout,
            retry: settings.retry,
            client,
        })
    }

    fn build_request<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        options: &'a CompletionOptions,
    ) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: options.model.as_deref().unwrap_or(&self.model),
            messages: messages
                .iter()
                .map(|m| RequestMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            max_tokens: options.max_tokens_or_default(),
            temperature: options.temperature_or_default(),
        }
    }

    async fn send_once(&self, request: &ChatCompletionRequest<'_>) -> Result<Completion> {
        let url = format!("{}/chat/completions", self.api_base);

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(request)
            .send()
            .await
            .map_err(|e| LlmError::from_transport(&e, PROVIDER))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_header(response.headers());
            let body = response.text().await.unwrap_or_default();
            let mut err = classify_status(status.as_u16(), &body);
            if let Some(wait) = retry_after {
                err = err.retry_after(wait);
            }
            return Err(err.into());
        }

        let body = response
            .text()
            .await
            .map_err(|e| LlmError::from_transport(&e, PROVIDER))?;
        parse_response(&body, request.model)
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn generate_completion(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<Completion> {
        let request = self.build_request(messages, options);
        let deadline = options.timeout.unwrap_or(self.timeout);

        info!(
            provider = PROVIDER,
            model = request.model,
            max_tokens = request.max_tokens,
            temperature = request.temperature,
            "Requesting completion"
        );

        let start = Instant::now();
        let completion = with_retry(&self.retry, PROVIDER, || {
            with_timeout(deadline, self.send_once(&request), "openai completion")
        })
        .await?;

        debug!(
            provider = PROVIDER,
            elapsed_ms = start.elapsed().as_millis() as u64,
            tokens = completion.usage.total_tokens,
            "Completion received"
        );
        Ok(completion)
    }

    fn name(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Map an error status to a category
fn classify_status(status: u16, body: &str) -> LlmError {
    let category = match status {
        429 => ErrorCategory::RateLimit,
        408 | 504 => ErrorCategory::Timeout,
        401 | 403 => ErrorCategory::Auth,
        400..=499 => ErrorCategory::BadRequest,
        _ => ErrorCategory::Unknown,
    };
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.chars().take(500).collect());
    LlmError::with_provider(category, format!("HTTP {}: {}", status, message), PROVIDER)
        .status(status)
}

fn parse_response(body: &str, requested_model: &str) -> Result<Completion> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body).map_err(|e| {
        LlmError::with_provider(
            ErrorCategory::MalformedResponse,
            format!("Invalid OpenAI response body: {}", e),
            PROVIDER,
        )
    })?;

    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .ok_or_else(|| {
            LlmError::with_provider(
                ErrorCategory::MalformedResponse,
                "Invalid response from OpenAI API: no message content",
                PROVIDER,
            )
        })?;

    let usage = parsed
        .usage
        .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens, u.total_tokens))
        .unwrap_or_default();

    Ok(Completion {
        content: content.trim().to_string(),
        usage,
        model: parsed
            .model
            .unwrap_or_else(|| requested_model.to_string()),
    })
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<RequestMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<UsageInfo>,
    model: Option<String>,
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
struct UsageInfo {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    total_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, timeout: Duration) -> OpenAiClient {
        OpenAiClient::new(ProviderSettings {
            api_key: SecretString::from("sk-test"),
            api_base: server.uri(),
            model: None,
            timeout,
            retry: RetryPolicy::default().with_base_delay(Duration::from_millis(1)),
        })
        .unwrap()
    }

    fn ok_body(content: &str) -> serde_json::Value {
        json!({
            "model": "gpt-4o-2024-08-06",
            "choices": [{"message": {"role": "assistant", "content": content}}],
            "usage": {"prompt_tokens": 100, "completion_tokens": 50, "total_tokens": 150}
        })
    }

    fn messages() -> Vec<ChatMessage> {
        vec![ChatMessage::system("Du är expert."), ChatMessage::user("Hej")]
    }

    #[tokio::test]
    async fn test_completion_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-4o",
                "max_tokens": 16000,
                "messages": [{"role": "system", "content": "Du är expert."}, {"role": "user", "content": "Hej"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("  Rapport  \n")))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_secs(5));
        let completion = client
            .generate_completion(&messages(), &CompletionOptions::default())
            .await
            .unwrap();

        assert_eq!(completion.content, "Rapport");
        assert_eq!(completion.usage, TokenUsage::new(100, 50, Some(150)));
        assert_eq!(completion.model, "gpt-4o-2024-08-06");
    }

    #[tokio::test]
    async fn test_rate_limit_retried_then_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("klart")))
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_secs(5));
        let completion = client
            .generate_completion(&messages(), &CompletionOptions::default())
            .await
            .unwrap();

        assert_eq!(completion.content, "klart");
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_auth_error_fails_fast() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_secs(5));
        let err = client
            .generate_completion(&messages(), &CompletionOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.category(), Some(ErrorCategory::Auth));
        assert!(err.to_string().contains("Incorrect API key"));
    }

    #[tokio::test]
    async fn test_server_error_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_secs(5));
        let err = client
            .generate_completion(&messages(), &CompletionOptions::default())
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_missing_message_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_secs(5));
        let err = client
            .generate_completion(&messages(), &CompletionOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::MalformedResponse));
    }

    #[tokio::test]
    async fn test_client_timeout_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(ok_body("sent"))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_millis(50));
        let err = client
            .generate_completion(&messages(), &CompletionOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ReportError::Timeout { .. }));
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(429, "").category, ErrorCategory::RateLimit);
        assert_eq!(classify_status(408, "").category, ErrorCategory::Timeout);
        assert_eq!(classify_status(504, "").category, ErrorCategory::Timeout);
        assert_eq!(classify_status(403, "").category, ErrorCategory::Auth);
        assert_eq!(classify_status(422, "").category, ErrorCategory::BadRequest);
        assert!(!classify_status(503, "").is_retryable());
    }

    #[test]
    fn test_usage_total_falls_back_to_sum() {
        let body = r#"{"choices":[{"message":{"content":"x"}}],"usage":{"prompt_tokens":7,"completion_tokens":3}}"#;
        let completion = parse_response(body, "gpt-4o").unwrap();
        assert_eq!(completion.usage.total_tokens, 10);
        assert_eq!(completion.model, "gpt-4o");
    }
}
