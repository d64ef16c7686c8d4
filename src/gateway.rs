use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::GatewayError;

/// Chat-completions gateway.
///
/// One HTTPS POST per request to `{api_host}/v1/chat/completions` with
/// bearer-token auth. The trait seam lets the pipelines run against a
/// scripted double in tests.

/// Default request timeout; phases override per call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Transport-level retries inside the gateway (connection errors only;
/// HTTP error statuses are surfaced to the caller immediately)
const TRANSPORT_RETRIES: u32 = 2;
const BACKOFF_BASE_MS: u64 = 500;

/// Chat message format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender (system, user, assistant)
    pub role: String,

    /// Content of the message
    pub content: String,
}

/// Chat completion request
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// The model to use
    model: String,

    /// The messages for the conversation
    messages: Vec<ChatMessage>,

    /// Temperature for generation
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,

    /// Per-request timeout, not serialized
    #[serde(skip)]
    timeout: Duration,
}

impl ChatRequest {
    /// Create a new chat request
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            temperature: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Add a message to the request
    pub fn add_message(mut self, role: impl Into<String>, content: impl Into<String>) -> Self {
        self.messages.push(ChatMessage {
            role: role.into(),
            content: content.into(),
        });
        self
    }

    /// Add a system + user message pair
    pub fn with_prompts(self, system: impl Into<String>, user: impl Into<String>) -> Self {
        self.add_message("system", system).add_message("user", user)
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Chat completion response
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    /// Completion choices; the first one carries the payload
    pub choices: Vec<ChatChoice>,
}

/// Individual completion choice
#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    /// The generated message
    pub message: ChatMessage,
}

/// Abstraction over the chat-completions API used by all pipeline
/// stages.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Send a chat request and return the text of the first choice
    async fn chat(&self, request: ChatRequest) -> Result<String, GatewayError>;

    /// Model identifier used for requests built against this gateway
    fn model(&self) -> &str;
}

/// HTTP client for the chat-completions API
pub struct ChatClient {
    /// HTTP client for API requests
    client: Client,
    /// API key for authentication
    api_key: String,
    /// Normalized endpoint URL
    endpoint: String,
    /// Model identifier
    model: String,
}

impl ChatClient {
    /// Create a new chat client.
    ///
    /// The host may omit the scheme (https is assumed) and may carry a
    /// trailing slash; both are normalized here.
    pub fn new(
        api_host: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, GatewayError> {
        let api_key = api_key.into();
        let model = model.into();

        if api_key.trim().is_empty() {
            return Err(GatewayError::AuthenticationError(
                "API key must not be empty".to_string(),
            ));
        }
        if model.trim().is_empty() {
            return Err(GatewayError::RequestFailed(
                "Model name must not be empty".to_string(),
            ));
        }

        let endpoint = Self::normalize_host(&api_host.into())?;

        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(300))
                .build()
                .unwrap_or_default(),
            api_key: api_key.trim().to_string(),
            endpoint,
            model: model.trim().to_string(),
        })
    }

    fn normalize_host(host: &str) -> Result<String, GatewayError> {
        let trimmed = host.trim();
        if trimmed.is_empty() {
            return Err(GatewayError::ConnectionError(
                "API host must not be empty".to_string(),
            ));
        }

        let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("https://{}", trimmed)
        };

        let url = Url::parse(&with_scheme)
            .map_err(|e| GatewayError::ConnectionError(format!("Invalid API host: {}", e)))?;

        Ok(url.as_str().trim_end_matches('/').to_string())
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.endpoint)
    }

    /// Send a minimal probe request to verify credentials and
    /// connectivity.
    pub async fn test_connection(&self) -> Result<(), GatewayError> {
        let request = ChatRequest::new(&self.model)
            .add_message("user", "Hello")
            .timeout(DEFAULT_TIMEOUT);
        self.chat(request).await?;
        Ok(())
    }

    async fn send_once(&self, request: &ChatRequest) -> Result<String, GatewayError> {
        let response = self
            .client
            .post(self.completions_url())
            .header("Content-Type", "application/json")
            .bearer_auth(&self.api_key)
            .timeout(request.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    GatewayError::ConnectionError(e.to_string())
                } else {
                    GatewayError::RequestFailed(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("Chat API error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                401 | 403 => GatewayError::AuthenticationError(error_text),
                429 => GatewayError::RateLimitExceeded(error_text),
                code => GatewayError::ApiError {
                    status_code: code,
                    message: error_text,
                },
            });
        }

        let chat_response = response
            .json::<ChatResponse>()
            .await
            .map_err(|e| GatewayError::ParseError(e.to_string()))?;

        chat_response
            .choices
            .first()
            .map(|choice| choice.message.content.clone())
            .ok_or_else(|| GatewayError::ParseError("Response carried no choices".to_string()))
    }
}

#[async_trait]
impl ChatApi for ChatClient {
    async fn chat(&self, request: ChatRequest) -> Result<String, GatewayError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.send_once(&request).await {
                Ok(text) => return Ok(text),
                Err(GatewayError::ConnectionError(msg)) if attempt <= TRANSPORT_RETRIES => {
                    let backoff = BACKOFF_BASE_MS * (1 << (attempt - 1));
                    let jitter = rand::rng().random_range(0..backoff / 2 + 1);
                    debug!(
                        "Connection error (attempt {}): {}; retrying in {} ms",
                        attempt,
                        msg,
                        backoff + jitter
                    );
                    tokio::time::sleep(Duration::from_millis(backoff + jitter)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}
