//! HTTP client for the translation arena API.
//!
//! Opens the streaming translation endpoints and wraps the small JSON
//! endpoints used around a comparison (model suggestions, templates,
//! votes, leaderboard).

mod types;

pub(crate) use types::{LeaderboardEntry, ModelPair, PromptTemplate};

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::streaming::{ByteStream, StreamTransport};
use crate::translation::{ComparisonRequest, TranslationRequest};
use crate::voting::Ballot;
use anyhow::Context;
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Initial delay between retries (doubles with each attempt).
const INITIAL_RETRY_DELAY_MS: u64 = 1000;

/// Client for the arena REST and streaming endpoints.
pub(crate) struct ArenaClient {
    base_url: Url,
    client: reqwest::Client,
    /// No total deadline; streams may run for as long as chunks keep arriving
    stream_client: reqwest::Client,
    stream_idle_timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
}

impl ArenaClient {
    /// Create a new client from the API configuration.
    pub(crate) fn new(config: &ApiConfig) -> anyhow::Result<Self> {
        let base_url = config
            .base_url()
            .context("Failed to parse API base URL for ArenaClient")?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .context("Failed to create HTTP client for ArenaClient")?;
        let stream_client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .context("Failed to create streaming HTTP client for ArenaClient")?;

        Ok(Self {
            base_url,
            client,
            stream_client,
            stream_idle_timeout: config.stream_idle_timeout(),
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(INITIAL_RETRY_DELAY_MS),
        })
    }

    #[cfg(test)]
    fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base_url.join(path)?)
    }

    /// Ask the server for a model pair suited to the target language.
    #[instrument(skip(self, token))]
    pub(crate) async fn suggest_models(
        &self,
        token: &str,
        target_language: &str,
    ) -> Result<ModelPair, ApiError> {
        let mut url = self.endpoint("models/suggest")?;
        url.query_pairs_mut()
            .append_pair("target_language", target_language);
        self.get_json(url, Some(token)).await
    }

    /// Fetch the leaderboard, best model first.
    #[instrument(skip(self, token))]
    pub(crate) async fn leaderboard(
        &self,
        token: Option<&str>,
    ) -> Result<Vec<LeaderboardEntry>, ApiError> {
        let url = self.endpoint("leaderboard")?;
        let mut entries: Vec<LeaderboardEntry> = self.get_json(url, token).await?;
        types::sort_leaderboard(&mut entries);
        Ok(entries)
    }

    /// Load a named prompt template.
    #[instrument(skip(self, token))]
    pub(crate) async fn prompt_template(
        &self,
        token: &str,
        name: &str,
    ) -> Result<PromptTemplate, ApiError> {
        let mut url = self.endpoint("templates/")?;
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(name.trim());
        }
        self.get_json(url, Some(token)).await
    }

    /// Record the user's preference between two outputs. Not retried.
    #[instrument(skip(self, token, ballot), fields(winner = ?ballot.winner))]
    pub(crate) async fn submit_vote(&self, token: &str, ballot: &Ballot) -> Result<(), ApiError> {
        let url = self.endpoint("votes")?;
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(ballot)
            .send()
            .await?;

        if response.status().is_success() {
            info!("Vote submitted");
            return Ok(());
        }

        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        Err(ApiError::ServerError { status, message })
    }

    /// GET a JSON document, retrying transient failures.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        token: Option<&str>,
    ) -> Result<T, ApiError> {
        let mut last_error: Option<ApiError> = None;
        let mut retry_delay = self.retry_delay;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(
                    attempt = attempt,
                    max_retries = self.max_retries,
                    delay_ms = retry_delay.as_millis(),
                    path = url.path(),
                    "Retrying API request after transient failure"
                );
                tokio::time::sleep(retry_delay).await;
                retry_delay *= 2;
            }

            let mut request = self.client.get(url.clone());
            if let Some(token) = token {
                request = request.bearer_auth(token);
            }

            match request.send().await {
                Ok(response) => {
                    if response.status().is_success() {
                        let body = response.json::<T>().await.map_err(|e| {
                            ApiError::InvalidResponse(format!(
                                "Failed to parse {} response: {}",
                                url.path(),
                                e
                            ))
                        })?;

                        if attempt > 0 {
                            info!(attempt = attempt, "API request succeeded after retry");
                        }
                        return Ok(body);
                    }

                    let status = response.status().as_u16();
                    let message = response.text().await.unwrap_or_default();
                    let error = ApiError::ServerError { status, message };

                    // Retry on 5xx server errors
                    if (500..600).contains(&status) && attempt < self.max_retries {
                        warn!(status = status, attempt = attempt, "Server error, will retry");
                        last_error = Some(error);
                        continue;
                    }

                    return Err(error);
                }
                Err(e) => {
                    if Self::is_retryable_error(&e) && attempt < self.max_retries {
                        warn!(error = %e, attempt = attempt, "Network error, will retry");
                        last_error = Some(ApiError::Network(e));
                        continue;
                    }

                    return Err(ApiError::Network(e));
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| ApiError::InvalidResponse("Unexpected retry loop exit".into())))
    }

    /// POST a request body and hand back the response body as a byte stream.
    async fn open_stream<B: Serialize + ?Sized>(
        &self,
        url: Url,
        token: &str,
        body: &B,
    ) -> Result<ByteStream, ApiError> {
        let send = self
            .stream_client
            .post(url)
            .bearer_auth(token)
            .header("Accept", "text/event-stream")
            .json(body)
            .send();
        let response = tokio::time::timeout(self.stream_idle_timeout, send)
            .await
            .map_err(|_| ApiError::StreamIdle(self.stream_idle_timeout))??;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::ServerError {
                status: status.as_u16(),
                message,
            });
        }
        if status == reqwest::StatusCode::NO_CONTENT {
            return Err(ApiError::MissingBody);
        }

        debug!(status = status.as_u16(), "Translation stream opened");
        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ApiError::Network))
            .boxed();
        Ok(with_idle_timeout(chunks, self.stream_idle_timeout))
    }

    /// Check if a reqwest error is retryable (transient).
    fn is_retryable_error(error: &reqwest::Error) -> bool {
        error.is_timeout() || error.is_connect() || error.is_request()
    }
}

/// Fail the stream when no chunk arrives within `idle`, then end it.
fn with_idle_timeout(stream: ByteStream, idle: Duration) -> ByteStream {
    futures_util::stream::unfold(Some(stream), move |state| async move {
        let mut stream = state?;
        match tokio::time::timeout(idle, stream.next()).await {
            Ok(Some(item)) => Some((item, Some(stream))),
            Ok(None) => None,
            Err(_) => {
                warn!(idle_secs = idle.as_secs(), "Translation stream went silent");
                Some((Err(ApiError::StreamIdle(idle)), None))
            }
        }
    })
    .boxed()
}

#[async_trait]
impl StreamTransport for ArenaClient {
    #[instrument(skip(self, token, request))]
    async fn open_single(
        &self,
        token: &str,
        model_id: &str,
        request: &TranslationRequest,
    ) -> Result<ByteStream, ApiError> {
        let mut url = self.endpoint("translate/stream")?;
        url.query_pairs_mut().append_pair("model_id", model_id);
        self.open_stream(url, token, request).await
    }

    #[instrument(skip_all, fields(model_a = request.model_a(), model_b = request.model_b()))]
    async fn open_dual(
        &self,
        token: &str,
        request: &ComparisonRequest,
    ) -> Result<ByteStream, ApiError> {
        let url = self.endpoint("translate/compare/stream")?;
        self.open_stream(url, token, request).await
    }
}
