//! Remote text-completion endpoint used by the remote-assisted patcher.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use zeroize::Zeroizing;

pub const DEFAULT_COMPLETION_URL: &str = "https://api.openai.com/v1/completions";
pub const DEFAULT_COMPLETION_MODEL: &str = "gpt-3.5-turbo-instruct";
pub const DEFAULT_MAX_TOKENS: u32 = 200;

/// Failures talking to the completion endpoint.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("completion endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("completion response contained no choices")]
    NoChoices,
}

/// A single completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: 0.0,
        }
    }
}

/// Source of raw completion text for the remote patcher.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Return the raw completion text for `request`.
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<String, CompletionError>;
}

/// Endpoint, model and limits for [`HttpCompletionClient`].
#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_COMPLETION_URL.to_string(),
            model: DEFAULT_COMPLETION_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Client for OpenAI-compatible `/v1/completions` endpoints.
pub struct HttpCompletionClient {
    client: reqwest::Client,
    api_key: Zeroizing<String>,
    settings: CompletionSettings,
}

impl fmt::Debug for HttpCompletionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpCompletionClient")
            .field("endpoint", &self.settings.endpoint)
            .field("model", &self.settings.model)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    text: String,
}

impl HttpCompletionClient {
    pub fn new(
        api_key: impl Into<String>,
        settings: CompletionSettings,
    ) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;
        Ok(Self {
            client,
            api_key: Zeroizing::new(api_key.into()),
            settings,
        })
    }

    pub fn settings(&self) -> &CompletionSettings {
        &self.settings
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<String, CompletionError> {
        let body = CompletionBody {
            model: &self.settings.model,
            prompt: &request.prompt,
            max_tokens: request.max_tokens.min(self.settings.max_tokens),
            temperature: request.temperature,
        };

        debug!(
            endpoint = %self.settings.endpoint,
            model = %self.settings.model,
            prompt_len = request.prompt.len(),
            "requesting completion"
        );

        let response = self
            .client
            .post(&self.settings.endpoint)
            .bearer_auth(self.api_key.as_str())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "completion endpoint rejected request");
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CompletionResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.text)
            .ok_or(CompletionError::NoChoices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_without_choices_deserializes() {
        let parsed: CompletionResponse =
            serde_json::from_str(r#"{"id":"cmpl-1"}"#).unwrap();
        assert!(parsed.choices.is_empty());
    }

    #[test]
    fn response_text_is_taken_from_first_choice() {
        let parsed: CompletionResponse = serde_json::from_str(
            r#"{"choices":[{"text":"if (x == 0) return 1;"},{"text":"ignored"}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.choices[0].text, "if (x == 0) return 1;");
    }

    #[test]
    fn debug_output_hides_api_key() {
        let client = HttpCompletionClient::new(
            "sk-secret-value",
            CompletionSettings::default(),
        )
        .unwrap();
        let rendered = format!("{client:?}");
        assert!(!rendered.contains("sk-secret-value"));
        assert!(rendered.contains(DEFAULT_COMPLETION_URL));
    }

    mod over_http {
        use super::*;
        use axum::{
            Json, Router,
            extract::State,
            http::{HeaderMap, StatusCode, header::AUTHORIZATION},
            routing::post,
        };
        use serde_json::{Value, json};
        use std::sync::{Arc, Mutex};

        #[derive(Clone, Default)]
        struct Captured(Arc<Mutex<Vec<(Option<String>, Value)>>>);

        async fn answer(
            State(captured): State<Captured>,
            headers: HeaderMap,
            Json(body): Json<Value>,
        ) -> Json<Value> {
            let auth = headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            captured.0.lock().unwrap().push((auth, body));
            Json(json!({
                "choices": [
                    {"text": "  if (x == 0) { return 1; }  "},
                    {"text": "second"}
                ]
            }))
        }

        async fn rate_limited() -> (StatusCode, &'static str) {
            (StatusCode::TOO_MANY_REQUESTS, "slow down")
        }

        async fn no_choices() -> Json<Value> {
            Json(json!({"id": "cmpl-empty"}))
        }

        async fn serve(captured: Captured) -> String {
            let app = Router::new()
                .route("/v1/completions", post(answer))
                .route("/limited/v1/completions", post(rate_limited))
                .route("/empty/v1/completions", post(no_choices))
                .with_state(captured);
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            format!("http://{addr}")
        }

        fn client(endpoint: String) -> HttpCompletionClient {
            HttpCompletionClient::new(
                "sk-test",
                CompletionSettings {
                    endpoint,
                    model: "test-model".to_string(),
                    max_tokens: 64,
                    timeout: Duration::from_secs(5),
                },
            )
            .unwrap()
        }

        #[tokio::test]
        async fn posts_model_prompt_and_bearer_key() {
            let captured = Captured::default();
            let base = serve(captured.clone()).await;

            let text = client(format!("{base}/v1/completions"))
                .complete(&CompletionRequest::new("patch this"))
                .await
                .unwrap();
            assert_eq!(text, "  if (x == 0) { return 1; }  ");

            let seen = captured.0.lock().unwrap();
            assert_eq!(seen.len(), 1);
            let (auth, body) = &seen[0];
            assert_eq!(auth.as_deref(), Some("Bearer sk-test"));
            assert_eq!(body["model"], "test-model");
            assert_eq!(body["prompt"], "patch this");
            assert_eq!(body["max_tokens"], 64);
            assert_eq!(body["temperature"], 0.0);
        }

        #[tokio::test]
        async fn non_success_status_is_reported_with_body() {
            let base = serve(Captured::default()).await;

            let err = client(format!("{base}/limited/v1/completions"))
                .complete(&CompletionRequest::new("patch this"))
                .await
                .unwrap_err();
            match err {
                CompletionError::Status { status, body } => {
                    assert_eq!(status, 429);
                    assert_eq!(body, "slow down");
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }

        #[tokio::test]
        async fn response_without_choices_is_an_error() {
            let base = serve(Captured::default()).await;

            let err = client(format!("{base}/empty/v1/completions"))
                .complete(&CompletionRequest::new("patch this"))
                .await
                .unwrap_err();
            assert!(matches!(err, CompletionError::NoChoices));
        }
    }
}
