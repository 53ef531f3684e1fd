use serde::{Deserialize, Serialize};

/// Model used when provisioning agent pipes.
pub const DEFAULT_PIPE_MODEL: &str = "openai:gpt-4o-mini";

const AGENT_TEMPERATURE: f64 = 0.7;
const AGENT_MAX_TOKENS: u32 = 4000;

/// Message in a pipe conversation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
}

impl Message {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Body of `POST /v1/pipes/run`: one agent turn, never streamed.
#[derive(Debug, Clone, Serialize)]
pub struct PipeRequest {
    pub name: String,
    pub messages: [Message; 2],
    pub stream: bool,
}

impl PipeRequest {
    /// The agent's system prompt followed by its stage input.
    pub fn agent_turn(
        pipe_name: impl Into<String>,
        system_prompt: impl Into<String>,
        user_message: impl Into<String>,
    ) -> Self {
        Self {
            name: pipe_name.into(),
            messages: [Message::system(system_prompt), Message::user(user_message)],
            stream: false,
        }
    }

    /// Stage input carried by this turn.
    pub fn user_message(&self) -> &str {
        &self.messages[1].content
    }
}

/// Reply from a pipe run. Only the completion and token count are read.
#[derive(Debug, Clone, Deserialize)]
pub struct PipeResponse {
    #[serde(default)]
    pub completion: String,
    #[serde(default)]
    raw: Option<RawEnvelope>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, Deserialize)]
struct TokenUsage {
    total_tokens: Option<u32>,
}

impl PipeResponse {
    /// Total tokens reported by the provider, when present
    pub fn total_tokens(&self) -> Option<u32> {
        self.raw
            .as_ref()
            .and_then(|r| r.usage.as_ref())
            .and_then(|u| u.total_tokens)
    }
}

/// Body of `POST /v1/pipes`: provisions (upserts) one agent pipe.
#[derive(Debug, Clone, Serialize)]
pub struct PipeDefinition {
    pub name: String,
    pub description: String,
    pub model: String,
    pub upsert: bool,
    /// JSON output mode; off for agents that answer in prose.
    pub json: bool,
    pub temperature: f64,
    pub max_tokens: u32,
    pub messages: Vec<Message>,
}

impl PipeDefinition {
    /// Pipe for one agent, carrying the agent's system prompt.
    pub fn for_agent(
        name: impl Into<String>,
        description: impl Into<String>,
        system_prompt: impl Into<String>,
        json_output: bool,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            model: DEFAULT_PIPE_MODEL.to_string(),
            upsert: true,
            json: json_output,
            temperature: AGENT_TEMPERATURE,
            max_tokens: AGENT_MAX_TOKENS,
            messages: vec![Message::system(system_prompt)],
        }
    }

    /// Override the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}
