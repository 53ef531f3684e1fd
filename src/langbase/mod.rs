//! Langbase Pipes API client and the LLM seam the agents call through.

mod client;
mod llm;
mod types;


pub use client::LangbaseClient;
#[cfg(test)]
pub use llm::MockLlmClient;
pub use llm::{LlmClient, PipeLlm};
pub use types::*;
