use async_trait::async_trait;
use tracing::debug;

use super::client::LangbaseClient;
use super::types::PipeRequest;
use crate::error::LangbaseResult;

/// The single seam between the agents and a language model.
///
/// Transport failures come back as errors; anything the model says, however
/// malformed, comes back as `Ok` text for the agent to interpret.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send one system prompt and one user message, return the raw completion.
    async fn invoke(&self, system_prompt: &str, user_message: &str) -> LangbaseResult<String>;
}

/// [`LlmClient`] backed by one named Langbase pipe.
#[derive(Clone)]
pub struct PipeLlm {
    client: LangbaseClient,
    pipe_name: String,
}

impl PipeLlm {
    /// Bind a client to a pipe.
    pub fn new(client: LangbaseClient, pipe_name: impl Into<String>) -> Self {
        Self {
            client,
            pipe_name: pipe_name.into(),
        }
    }

    /// Pipe this adapter calls.
    pub fn pipe_name(&self) -> &str {
        &self.pipe_name
    }
}

#[async_trait]
impl LlmClient for PipeLlm {
    async fn invoke(&self, system_prompt: &str, user_message: &str) -> LangbaseResult<String> {
        let request = PipeRequest::agent_turn(&self.pipe_name, system_prompt, user_message);
        let response = self.client.call_pipe(&request).await?;
        debug!(
            pipe = %self.pipe_name,
            completion_len = response.completion.len(),
            "Pipe completion received"
        );
        Ok(response.completion)
    }
}
