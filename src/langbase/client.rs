use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::types::{PipeDefinition, PipeRequest, PipeResponse};
use crate::config::{LangbaseConfig, RequestConfig};
use crate::error::{LangbaseError, LangbaseResult};

/// Client for the two Pipes endpoints the agents need: run and provision.
#[derive(Clone)]
pub struct LangbaseClient {
    http: Client,
    base_url: String,
    api_key: String,
    request_config: RequestConfig,
}

impl LangbaseClient {
    /// Create a new Langbase client
    pub fn new(config: &LangbaseConfig, request_config: RequestConfig) -> LangbaseResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(LangbaseError::Http)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            request_config,
        })
    }

    /// Base URL with any trailing slash removed.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run one agent turn, retrying with exponential backoff.
    ///
    /// Once every attempt has failed the last failure is reported as
    /// [`LangbaseError::Unavailable`] with the number of attempts made.
    pub async fn call_pipe(&self, request: &PipeRequest) -> LangbaseResult<PipeResponse> {
        let attempts = self.request_config.max_retries + 1;
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.backoff(attempt);
                warn!(
                    pipe = %request.name,
                    retry = attempt,
                    delay_ms = delay.as_millis(),
                    "Retrying pipe call"
                );
                tokio::time::sleep(delay).await;
            }

            let start = Instant::now();
            match self.run_once(request).await {
                Ok(response) => {
                    info!(
                        pipe = %request.name,
                        latency_ms = start.elapsed().as_millis(),
                        total_tokens = response.total_tokens(),
                        "Pipe call succeeded"
                    );
                    return Ok(response);
                }
                Err(e) => {
                    error!(
                        pipe = %request.name,
                        error = %e,
                        latency_ms = start.elapsed().as_millis(),
                        retry = attempt,
                        "Pipe call failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(LangbaseError::Unavailable {
            message: last_error.map_or_else(|| "no attempt made".to_string(), |e| e.to_string()),
            retries: attempts,
        })
    }

    /// Provision an agent pipe. An existing pipe (409) counts as ready.
    pub async fn ensure_pipe(&self, definition: &PipeDefinition) -> LangbaseResult<()> {
        info!(pipe = %definition.name, model = %definition.model, "Provisioning agent pipe");

        let response = self
            .post("/v1/pipes")
            .json(definition)
            .send()
            .await
            .map_err(LangbaseError::Http)?;

        if response.status() == StatusCode::CONFLICT {
            info!(pipe = %definition.name, "Pipe already exists");
            return Ok(());
        }

        check_status(response).await?;
        info!(pipe = %definition.name, "Agent pipe ready");
        Ok(())
    }

    async fn run_once(&self, request: &PipeRequest) -> LangbaseResult<PipeResponse> {
        debug!(
            pipe = %request.name,
            input_len = request.user_message().len(),
            "Calling pipe"
        );

        let response = self
            .post("/v1/pipes/run")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LangbaseError::Timeout {
                        timeout_ms: self.request_config.timeout_ms,
                    }
                } else {
                    LangbaseError::Http(e)
                }
            })?;

        check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| LangbaseError::InvalidResponse {
                message: format!("Failed to parse pipe reply: {}", e),
            })
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1_u64 << (attempt - 1).min(16);
        Duration::from_millis(self.request_config.retry_delay_ms.saturating_mul(factor))
    }
}

async fn check_status(response: Response) -> LangbaseResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(LangbaseError::Api {
        status: status.as_u16(),
        message: body,
    })
}
