/// LLM Client — the single point of entry for all OpenAI calls in the CV service.
///
/// ARCHITECTURAL RULE: No other module may call the OpenAI API directly.
/// Translation and analysis go through this module.
///
/// Talks to the Responses API (`POST {base_url}/responses`). With no API key
/// configured the client is disabled and every call returns `LlmError::Disabled`.
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::OpenAiConfig;

const MAX_RETRIES: u32 = 3;
const DEFAULT_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("OpenAI API key is not configured")]
    Disabled,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// Sampling parameters for a single call.
#[derive(Debug, Clone, Copy)]
pub struct CallParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: Vec<InputMessage<'a>>,
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
struct InputMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    #[serde(default)]
    pub output: Vec<OutputItem>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct OutputItem {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Concatenates every `output_text` block, in order.
    pub fn text(&self) -> Option<String> {
        let text: String = self
            .output
            .iter()
            .flat_map(|item| item.content.iter())
            .filter(|b| b.block_type == "output_text")
            .filter_map(|b| b.text.as_deref())
            .collect();
        let text = text.trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: OpenAiErrorBody,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorBody {
    message: String,
}

/// The single LLM client used by the translation and analysis providers.
/// Wraps the Responses API with retry logic.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: Option<String>,
    model: String,
    project: Option<String>,
    base_url: String,
    backoff_base: Duration,
}

impl LlmClient {
    pub fn new(config: &OpenAiConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .expect("Failed to build HTTP client"),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            project: config.project.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            backoff_base: Duration::from_millis(DEFAULT_BACKOFF_MS),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Makes a raw call to the Responses API, returning the full response object.
    /// Retries on 429 (rate limit) and 5xx errors with exponential backoff.
    pub async fn call(
        &self,
        system: &str,
        prompt: &str,
        params: CallParams,
    ) -> Result<LlmResponse, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::Disabled)?;

        let request_body = ResponsesRequest {
            model: &self.model,
            input: vec![
                InputMessage {
                    role: "system",
                    content: system,
                },
                InputMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: params.temperature,
            max_output_tokens: params.max_output_tokens,
        };

        let url = format!("{}/responses", self.base_url);
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = self.backoff_base * (1 << (attempt - 1));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let mut request = self.client.post(&url).bearer_auth(api_key);
            if let Some(project) = &self.project {
                request = request.header("OpenAI-Project", project);
            }

            let response = match request.json(&request_body).send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(if status.as_u16() == 429 {
                    LlmError::RateLimited {
                        retries: attempt + 1,
                    }
                } else {
                    LlmError::Api {
                        status: status.as_u16(),
                        message: body,
                    }
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<OpenAiError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let llm_response: LlmResponse = response.json().await?;

            if let Some(usage) = &llm_response.usage {
                debug!(
                    "LLM call succeeded: input_tokens={}, output_tokens={}",
                    usage.input_tokens, usage.output_tokens
                );
            }

            return Ok(llm_response);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }

    /// Calls the model and returns its text output.
    pub async fn complete(
        &self,
        system: &str,
        prompt: &str,
        params: CallParams,
    ) -> Result<String, LlmError> {
        let response = self.call(system, prompt, params).await?;
        response.text().ok_or(LlmError::EmptyContent)
    }
}

#[cfg(test)]
impl LlmClient {
    /// Client pointed at a mock server, with millisecond backoff.
    pub fn for_tests(base_url: &str, api_key: Option<&str>) -> Self {
        let config = OpenAiConfig {
            api_key: api_key.map(str::to_string),
            model: "gpt-4o-mini".to_string(),
            project: None,
            base_url: base_url.to_string(),
        };
        let mut client = Self::new(&config);
        client.backoff_base = Duration::from_millis(5);
        client
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PARAMS: CallParams = CallParams {
        temperature: 0.7,
        max_output_tokens: 100,
    };

    fn output(text: &str) -> serde_json::Value {
        json!({
            "output": [
                { "type": "reasoning", "content": [] },
                { "type": "message", "content": [ { "type": "output_text", "text": text } ] }
            ],
            "usage": { "input_tokens": 12, "output_tokens": 3 }
        })
    }

    #[test]
    fn test_text_joins_output_text_blocks() {
        let response: LlmResponse = serde_json::from_value(json!({
            "output": [
                { "content": [ { "type": "output_text", "text": "Hello " } ] },
                { "content": [ { "type": "refusal", "text": "no" }, { "type": "output_text", "text": "world" } ] }
            ]
        }))
        .unwrap();
        assert_eq!(response.text().as_deref(), Some("Hello world"));
    }

    #[test]
    fn test_text_is_none_for_blank_output() {
        let response: LlmResponse = serde_json::from_value(json!({ "output": [] })).unwrap();
        assert!(response.text().is_none());
    }

    #[tokio::test]
    async fn test_disabled_client_does_not_call_out() {
        let client = LlmClient::for_tests("http://127.0.0.1:1/v1", None);
        assert!(!client.is_enabled());
        let err = client.complete("sys", "hi", PARAMS).await.unwrap_err();
        assert!(matches!(err, LlmError::Disabled));
    }

    #[tokio::test]
    async fn test_complete_sends_bearer_and_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/responses"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({ "model": "gpt-4o-mini", "max_output_tokens": 100 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(output("Bonjour")))
            .expect(1)
            .mount(&server)
            .await;

        let client = LlmClient::for_tests(&format!("{}/v1", server.uri()), Some("sk-test"));
        let text = client.complete("sys", "Hello", PARAMS).await.unwrap();
        assert_eq!(text, "Bonjour");
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/responses"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/responses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(output("ok")))
            .mount(&server)
            .await;

        let client = LlmClient::for_tests(&format!("{}/v1", server.uri()), Some("sk-test"));
        assert_eq!(client.complete("sys", "ping", PARAMS).await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_client_error_surfaces_api_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/responses"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({ "error": { "message": "Incorrect API key" } })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = LlmClient::for_tests(&format!("{}/v1", server.uri()), Some("bad"));
        match client.complete("sys", "ping", PARAMS).await {
            Err(LlmError::Api { status, message }) => {
                assert_eq!(status, 401);
                assert_eq!(message, "Incorrect API key");
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }
}
