pub mod models;

use std::{fmt, sync::Arc};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::config::Config;

use self::models::{ChatCompletionRequest, ChatCompletionResponse, ErrorEnvelope};

/// Single-turn text generation: a system instruction plus one user prompt in,
/// generated text out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String>;
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Clone)]
pub struct OpenAiClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.inner.base_url)
            .field("model", &self.inner.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.llm_timeout)
            .build()
            .context("Failed to build HTTP client for chat completions")?;

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url: config.openai_base_url.clone(),
                api_key: config.openai_api_key.clone(),
                model: config.openai_model.clone(),
            }),
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.inner.base_url);
        debug!(url = %url, model = %self.inner.model, "Requesting chat completion");

        let body = ChatCompletionRequest::single_turn(&self.inner.model, system, prompt);

        let response = self
            .inner
            .http
            .post(&url)
            .bearer_auth(&self.inner.api_key)
            .json(&body)
            .send()
            .await
            .context("Chat completion request failed")?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .context("Failed to read chat completion response body")?;

        if !status.is_success() {
            let detail = serde_json::from_slice::<ErrorEnvelope>(&bytes)
                .map(|e| e.error.to_string())
                .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned());
            bail!("Chat completion endpoint returned {status}: {detail}");
        }

        let text = serde_json::from_slice::<ChatCompletionResponse>(&bytes)
            .context("Failed to deserialize chat completion response")?
            .into_text()?;

        debug!(chars = text.len(), "Chat completion received");
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::{sync::Mutex, time::Duration};

    use axum::{
        extract::State,
        http::{HeaderMap, StatusCode},
        routing::post,
        Json, Router,
    };
    use serde_json::{json, Value};
    use tokio::net::TcpListener;

    use super::*;
    use crate::config::{CalendarPolicy, DashboardIntervals};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<(Option<String>, Value)>>>);

    fn config(base_url: String) -> Config {
        Config {
            database_url: "postgres://unused".into(),
            db_max_connections: 1,
            openai_api_key: "sk-test".into(),
            openai_base_url: base_url,
            openai_model: "gpt-test".into(),
            llm_timeout: Duration::from_secs(5),
            server_host: "127.0.0.1".into(),
            server_port: 0,
            calendar: CalendarPolicy::default(),
            dashboard: DashboardIntervals::default(),
        }
    }

    /// Serve `router` on an ephemeral port and return its base URL.
    async fn spawn_upstream(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/v1")
    }

    async fn completion_ok(
        State(captured): State<Captured>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        captured.0.lock().unwrap().push((auth, body));
        Json(json!({
            "id": "chatcmpl-test",
            "choices": [
                { "index": 0, "message": { "role": "assistant", "content": "\n  Keep moving!  " }, "finish_reason": "stop" }
            ]
        }))
    }

    #[tokio::test]
    async fn generate_sends_single_turn_and_trims_reply() {
        let captured = Captured::default();
        let router = Router::new()
            .route("/v1/chat/completions", post(completion_ok))
            .with_state(captured.clone());
        let client = OpenAiClient::new(&config(spawn_upstream(router).await)).unwrap();

        let text = client.generate("system text", "user text").await.unwrap();
        assert_eq!(text, "Keep moving!");

        let calls = captured.0.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (auth, body) = &calls[0];
        assert_eq!(auth.as_deref(), Some("Bearer sk-test"));
        assert_eq!(body["model"], "gpt-test");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "system text");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "user text");
    }

    #[tokio::test]
    async fn generate_surfaces_upstream_error_message() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({ "error": { "message": "Incorrect API key provided", "type": "invalid_request_error" } })),
                )
            }),
        );
        let client = OpenAiClient::new(&config(spawn_upstream(router).await)).unwrap();

        let err = client.generate("s", "u").await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("401"), "unexpected error: {msg}");
        assert!(msg.contains("Incorrect API key provided"), "unexpected error: {msg}");
    }

    #[tokio::test]
    async fn generate_rejects_empty_choices() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { Json(json!({ "id": "x", "choices": [] })) }),
        );
        let client = OpenAiClient::new(&config(spawn_upstream(router).await)).unwrap();

        let err = client.generate("s", "u").await.unwrap_err();
        assert!(format!("{err:#}").contains("no choices"));
    }

    #[test]
    fn debug_output_hides_api_key() {
        let client = OpenAiClient::new(&config("http://localhost".into())).unwrap();
        let dbg = format!("{client:?}");
        assert!(dbg.contains("gpt-test"));
        assert!(!dbg.contains("sk-test"));
    }
}
