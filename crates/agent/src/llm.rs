//! Model boundary: one completion call, three hosted flavors.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use intake_core::config::{LlmConfig, LlmProvider};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const RETRY_BACKOFF_MS: u64 = 250;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    /// Ask the model for a bare JSON object.
    pub json: bool,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn text(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self { system: system.into(), prompt: prompt.into(), json: false, max_tokens: 512 }
    }

    pub fn json(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self { system: system.into(), prompt: prompt.into(), json: true, max_tokens: 1024 }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
    fn model_name(&self) -> &str;
    fn provider_name(&self) -> &str;
}

#[derive(Debug)]
enum CallFailure {
    Retryable(anyhow::Error),
    Fatal(anyhow::Error),
}

impl CallFailure {
    fn from_status(provider: &str, status: StatusCode, body: String) -> Self {
        let error = anyhow!("{provider} API error {status}: {body}");
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            Self::Retryable(error)
        } else {
            Self::Fatal(error)
        }
    }
}

async fn send_with_retries<F, Fut>(provider: &str, max_retries: u32, mut call: F) -> Result<String>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<String, CallFailure>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(text) => return Ok(text),
            Err(CallFailure::Fatal(error)) => return Err(error),
            Err(CallFailure::Retryable(error)) if attempt >= max_retries => return Err(error),
            Err(CallFailure::Retryable(error)) => {
                attempt += 1;
                warn!(
                    event_name = "llm.retry",
                    provider,
                    attempt,
                    error = %error,
                    "model call failed, retrying"
                );
                tokio::time::sleep(Duration::from_millis(RETRY_BACKOFF_MS * u64::from(attempt)))
                    .await;
            }
        }
    }
}

/// Chat-completions API as served by OpenAI and by Ollama under `/v1`.
#[derive(Clone)]
pub struct OpenAiCompatibleClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
    provider: &'static str,
    max_retries: u32,
}

impl OpenAiCompatibleClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: Option<SecretString>,
        model: impl Into<String>,
        provider: &'static str,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
            model: model.into(),
            provider,
            max_retries: 0,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    async fn call_api(&self, request: &CompletionRequest) -> Result<String, CallFailure> {
        let mut builder = self.client.post(self.endpoint()).json(&openai_body(&self.model, request));
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key.expose_secret());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| CallFailure::Retryable(anyhow!("{} request failed: {e}", self.provider)))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(CallFailure::from_status(self.provider, status, body));
        }

        parse_openai_response(&body).map_err(CallFailure::Fatal)
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        debug!(provider = self.provider, model = %self.model, json = request.json, "model call");
        send_with_retries(self.provider, self.max_retries, move || self.call_api(request)).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        self.provider
    }
}

#[derive(Clone)]
pub struct AnthropicClient {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
    max_retries: u32,
}

impl AnthropicClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: SecretString,
        model: impl Into<String>,
    ) -> Self {
        Self { client, base_url: base_url.into(), api_key, model: model.into(), max_retries: 0 }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    async fn call_api(&self, request: &CompletionRequest) -> Result<String, CallFailure> {
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url.trim_end_matches('/')))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&anthropic_body(&self.model, request))
            .send()
            .await
            .map_err(|e| CallFailure::Retryable(anyhow!("anthropic request failed: {e}")))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(CallFailure::from_status("anthropic", status, body));
        }

        parse_anthropic_response(&body).map_err(CallFailure::Fatal)
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        debug!(provider = "anthropic", model = %self.model, json = request.json, "model call");
        send_with_retries("anthropic", self.max_retries, move || self.call_api(request)).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }
}

pub fn build_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .context("failed to build http client")?;
    let base_url =
        config.base_url.clone().unwrap_or_else(|| config.provider.default_base_url().to_string());

    let client: Arc<dyn LlmClient> = match config.provider {
        LlmProvider::OpenAi => {
            let api_key =
                config.api_key.clone().ok_or_else(|| anyhow!("llm.api_key is required for openai"))?;
            Arc::new(
                OpenAiCompatibleClient::new(http, base_url, Some(api_key), &config.model, "openai")
                    .with_max_retries(config.max_retries),
            )
        }
        LlmProvider::Ollama => Arc::new(
            OpenAiCompatibleClient::new(http, base_url, config.api_key.clone(), &config.model, "ollama")
                .with_max_retries(config.max_retries),
        ),
        LlmProvider::Anthropic => {
            let api_key = config
                .api_key
                .clone()
                .ok_or_else(|| anyhow!("llm.api_key is required for anthropic"))?;
            Arc::new(
                AnthropicClient::new(http, base_url, api_key, &config.model)
                    .with_max_retries(config.max_retries),
            )
        }
    };

    Ok(client)
}

fn openai_body(model: &str, request: &CompletionRequest) -> Value {
    let mut body = json!({
        "model": model,
        "messages": [
            {"role": "system", "content": request.system},
            {"role": "user", "content": request.prompt}
        ],
        "temperature": 0.1,
        "max_tokens": request.max_tokens
    });
    if request.json {
        body["response_format"] = json!({"type": "json_object"});
    }
    body
}

fn anthropic_body(model: &str, request: &CompletionRequest) -> Value {
    let system = if request.json {
        format!(
            "{}\n\nRespond with valid JSON only. No markdown code blocks, no explanations.",
            request.system
        )
    } else {
        request.system.clone()
    };

    json!({
        "model": model,
        "max_tokens": request.max_tokens,
        "system": system,
        "messages": [{"role": "user", "content": request.prompt}]
    })
}

fn parse_openai_response(body: &str) -> Result<String> {
    #[derive(Deserialize)]
    struct Message {
        content: Option<String>,
    }
    #[derive(Deserialize)]
    struct Choice {
        message: Message,
    }
    #[derive(Deserialize)]
    struct ApiResponse {
        choices: Vec<Choice>,
    }

    let response: ApiResponse =
        serde_json::from_str(body).context("failed to parse chat completion response")?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| anyhow!("chat completion returned no content"))
}

fn parse_anthropic_response(body: &str) -> Result<String> {
    #[derive(Deserialize)]
    struct ContentBlock {
        text: Option<String>,
    }
    #[derive(Deserialize)]
    struct ApiResponse {
        content: Vec<ContentBlock>,
    }

    let response: ApiResponse =
        serde_json::from_str(body).context("failed to parse anthropic response")?;
    let text = response.content.into_iter().filter_map(|block| block.text).collect::<String>();
    if text.is_empty() {
        return Err(anyhow!("empty response from anthropic"));
    }
    Ok(text)
}
