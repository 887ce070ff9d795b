//! Gemini API client: transport operations plus the retried public surface.
//!
//! The transport layer (`*_once` methods) performs exactly one request per
//! call and never retries; only [`Client::generate_text`] wraps its transport
//! call in the backoff schedule.

use std::{sync::Arc, time::Instant};

use reqwest::{header::ACCEPT, Method, StatusCode};
use time::OffsetDateTime;
use tokio::time::sleep;

use crate::{
    chat::ChatSession,
    config::GeminiConfig,
    errors::{parse_api_error, to_transport_error, Error, Result},
    retry::{RetryPolicy, RetrySchedule, RetryState},
    sse::TextStream,
    types::{shape_generation, ChatMessage, ChatResult, ChatRole, GenerationResult, ModelInfoReport},
    wire::{Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, ModelsListResponse},
    API_KEY_HEADER, DEFAULT_BASE_URL, DEFAULT_CONNECT_TIMEOUT,
};

/// Fixed prompt used by the connection health check.
const LIVENESS_PROMPT: &str = "Hello, are you working?";

/// Cheaply cloneable connector handle; all clones share one HTTP client and
/// one immutable configuration.
#[derive(Clone, Debug)]
pub struct Client {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
pub(crate) struct ClientInner {
    base_url: String,
    config: GeminiConfig,
    retry: RetryPolicy,
    http: reqwest::Client,
}

impl Client {
    /// Build a client against the production API endpoint.
    pub fn new(config: GeminiConfig) -> Result<Self> {
        Self::with_base_url(config, DEFAULT_BASE_URL)
    }

    /// Build a client against a custom endpoint (self-hosted proxies, tests).
    pub fn with_base_url(config: GeminiConfig, base_url: impl Into<String>) -> Result<Self> {
        config.validate()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url)
            .map_err(|err| Error::Config(format!("invalid base url: {err}")))?;

        let http = reqwest::Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(config.request_timeout())
            .build()
            .map_err(to_transport_error)?;

        let retry = config.retry_policy();
        tracing::info!(model = %config.model_name, "gemini client initialized");

        Ok(Self {
            inner: Arc::new(ClientInner {
                base_url,
                config,
                retry,
                http,
            }),
        })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.inner.config
    }

    /// Generate text for a prompt, retrying failed attempts with exponential
    /// backoff up to the configured budget.
    ///
    /// The elapsed time on the returned result spans the whole loop, from
    /// just before the first attempt to just after the successful one.
    pub async fn generate_text(&self, prompt: &str) -> Result<GenerationResult> {
        let contents = [Content::user(prompt)];
        let started = Instant::now();
        let mut schedule = RetrySchedule::new(self.inner.retry);

        loop {
            let attempt = schedule.attempt();
            tracing::info!(
                attempt,
                max_attempts = schedule.max_attempts(),
                "generating text"
            );

            let outcome = match self.inner.generate_once(&contents).await {
                Ok(raw) => shape_generation(raw, started.elapsed()),
                Err(err) => Err(err),
            };

            match outcome {
                Ok(result) => {
                    schedule.on_success();
                    tracing::info!(
                        elapsed_secs = result.elapsed.as_secs_f64(),
                        "text generated successfully"
                    );
                    return Ok(result);
                }
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "generation attempt failed");
                    match schedule.on_failure() {
                        RetryState::Retrying { delay, .. } => {
                            sleep(delay).await;
                            schedule.begin_next_attempt();
                        }
                        RetryState::Exhausted { attempts } => {
                            tracing::error!(attempts, error = %err, "all retry attempts failed");
                            return Err(Error::ExhaustedRetries {
                                attempts,
                                source: Box::new(err),
                            });
                        }
                        _ => unreachable!("failure transitions to Retrying or Exhausted"),
                    }
                }
            }
        }
    }

    /// Open a streaming generation for the prompt.
    ///
    /// Not retried and not restartable: each call opens a new remote stream,
    /// and a mid-flight failure surfaces to the consumer as-is.
    pub async fn generate_text_stream(&self, prompt: &str) -> Result<TextStream> {
        tracing::info!("starting streaming text generation");
        let contents = [Content::user(prompt)];
        let response = self.inner.stream_once(&contents).await?;
        Ok(TextStream::new(response))
    }

    /// Start a fresh multi-turn chat session.
    pub fn start_chat(&self) -> ChatSession {
        ChatSession::new(self.clone())
    }

    /// Run a chat conversation: replay all but the last message into a fresh
    /// session (user turns only), then send the final message.
    ///
    /// Any replay or final-send failure aborts the whole call; no partial
    /// result is returned and nothing is retried.
    pub async fn chat_conversation(&self, messages: &[ChatMessage]) -> Result<ChatResult> {
        let (last, history) = messages
            .split_last()
            .ok_or_else(|| Error::InvalidRequest("chat requires at least one message".into()))?;
        tracing::info!(message_count = messages.len(), "starting chat conversation");

        let mut session = self.start_chat();
        for message in history {
            if message.role == ChatRole::User {
                session.send_message(&message.content).await?;
            }
        }
        let text = session.send_message(&last.content).await?;

        tracing::info!("chat conversation completed");
        Ok(ChatResult {
            text,
            history: session.transcript(),
            completed_at: OffsetDateTime::now_utc(),
        })
    }

    /// Cheap liveness probe through the non-retried transport path.
    ///
    /// Returns true iff a response with non-empty text is obtained; every
    /// failure (auth, transport, empty response) maps to false.
    pub async fn validate_connection(&self) -> bool {
        tracing::info!("validating gemini connection");
        let contents = [Content::user(LIVENESS_PROMPT)];
        match self.inner.generate_once(&contents).await {
            Ok(resp) if !resp.primary_text().is_empty() => {
                tracing::info!("connection validation successful");
                true
            }
            Ok(_) => {
                tracing::error!("connection validation failed: no response text");
                false
            }
            Err(err) => {
                tracing::error!(error = %err, "connection validation failed");
                false
            }
        }
    }

    /// Fetch descriptive fields for the configured model.
    ///
    /// Always returns a record: transport failures and missing models both
    /// shape into [`ModelInfoReport::Error`].
    pub async fn model_info(&self) -> ModelInfoReport {
        let models = match self.inner.list_models_once().await {
            Ok(models) => models,
            Err(err) => {
                tracing::error!(error = %err, "failed to get model info");
                return ModelInfoReport::Error {
                    error: err.to_string(),
                };
            }
        };

        models
            .into_iter()
            .find(|entry| entry.name.ends_with(&self.inner.config.model_name))
            .map(|entry| ModelInfoReport::Found(entry.into()))
            .unwrap_or_else(ModelInfoReport::not_found)
    }

    pub(crate) async fn generate_once(
        &self,
        contents: &[Content],
    ) -> Result<GenerateContentResponse> {
        self.inner.generate_once(contents).await
    }
}

impl ClientInner {
    fn model_endpoint(&self, operation: &str) -> String {
        format!(
            "{}/models/{}:{operation}",
            self.base_url, self.config.model_name
        )
    }

    fn generation_config(&self) -> GenerationConfig {
        GenerationConfig {
            temperature: Some(self.config.temperature),
            max_output_tokens: Some(self.config.max_tokens),
        }
    }

    /// Single request, single response; classification happens here, retry
    /// does not.
    async fn generate_once(&self, contents: &[Content]) -> Result<GenerateContentResponse> {
        let request = GenerateContentRequest {
            contents,
            generation_config: Some(self.generation_config()),
            safety_settings: Some(self.config.effective_safety_settings()),
        };
        let url = self.model_endpoint("generateContent");
        tracing::debug!(%url, "sending generate request");

        let response = self
            .http
            .request(Method::POST, &url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .header(ACCEPT, "application/json")
            .json(&request)
            .send()
            .await
            .map_err(to_transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(to_transport_error)?;
        if !status.is_success() {
            return Err(parse_api_error(status, body));
        }

        serde_json::from_str(&body)
            .map_err(|err| Error::MalformedResponse(format!("invalid generate response: {err}")))
    }

    async fn stream_once(&self, contents: &[Content]) -> Result<reqwest::Response> {
        let request = GenerateContentRequest {
            contents,
            generation_config: Some(self.generation_config()),
            safety_settings: Some(self.config.effective_safety_settings()),
        };
        let url = format!("{}?alt=sse", self.model_endpoint("streamGenerateContent"));
        tracing::debug!(%url, "opening generate stream");

        let response = self
            .http
            .request(Method::POST, &url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .header(ACCEPT, "text/event-stream")
            .json(&request)
            .send()
            .await
            .map_err(to_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(parse_api_error(status, body));
        }
        Ok(response)
    }

    async fn list_models_once(&self) -> Result<Vec<crate::wire::ModelEntry>> {
        let url = format!("{}/models", self.base_url);
        tracing::debug!(%url, "listing models");

        let response = self
            .http
            .request(Method::GET, &url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(to_transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(to_transport_error)?;
        if status != StatusCode::OK {
            return Err(parse_api_error(status, body));
        }

        let payload: ModelsListResponse = serde_json::from_str(&body)
            .map_err(|err| Error::MalformedResponse(format!("invalid models response: {err}")))?;
        Ok(payload.models)
    }
}
