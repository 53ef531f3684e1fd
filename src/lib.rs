//! # Analogy Engine
//!
//! A cross-domain analogy research pipeline. Two domain descriptions are
//! turned into logic graphs, aligned, validated against a Triple-Layer
//! Ontology and synthesized into an engineering research report, with each
//! reasoning step delegated to a Langbase Pipe.
//!
//! ## Features
//!
//! - **Scout**: free text to a typed logic graph
//! - **Matcher**: graph-to-graph node correspondences, with one refinement pass
//! - **Ontology gate**: rejects STRUCTURE/FUNCTION/ATTRIBUTE cross-mappings
//! - **Critic**: consistency verdict with confidence
//! - **Architect**: research report with an action plan
//! - **Visionary**: suggests a source domain for a bare problem
//! - **Librarian**: SQLite persistence with keyword search
//!
//! ## Architecture
//!
//! ```text
//! CLI → AnalogyPipeline → Agents → Langbase Pipes (HTTP)
//!             ↓                ↓
//!      SQLite (reports)   DuckDuckGo (sources)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use analogy_engine::{AnalogyPipeline, Config};
//! use analogy_engine::langbase::{LangbaseClient, PipeLlm};
//! use analogy_engine::sources::SourceFilters;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let client = LangbaseClient::new(&config.langbase, config.request.clone())?;
//!     let llm = Arc::new(PipeLlm::new(client, &config.pipes.matcher));
//!     let pipeline = AnalogyPipeline::with_shared_llm(llm);
//!     let outcome = pipeline
//!         .run("ant colonies", "packet routing", &SourceFilters::default())
//!         .await?;
//!     println!("{}", outcome.report.summary);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Agents: one LLM-backed stage each.
pub mod agents;
/// Configuration loaded from the environment.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Markdown rendering of reports.
pub mod export;
/// Tolerant JSON extraction from LLM completions.
pub mod extraction;
/// Langbase API client and types for pipe communication.
pub mod langbase;
/// Triple-Layer Ontology and the alignment check.
pub mod ontology;
/// Pipeline driver with the ontology gate and refinement pass.
pub mod pipeline;
/// System prompts for Langbase pipes.
pub mod prompts;
/// Data model shared by every stage.
pub mod schema;
/// Web source collection.
pub mod sources;
/// SQLite storage layer for reports.
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use pipeline::{AnalogyPipeline, Discovery, PipelineOutcome};
