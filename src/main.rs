use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use analogy_engine::{
    agents::{Architect, Critic, Matcher, Scout, Visionary},
    config::{Config, LogFormat},
    export::{export_filename, to_markdown},
    langbase::{LangbaseClient, PipeDefinition, PipeLlm},
    pipeline::{AnalogyPipeline, PipelineOutcome},
    prompts,
    sources::{DuckDuckGoCollector, SourceFilters},
    storage::{MemoryEntry, SqliteStorage, Storage},
};

/// Cross-domain analogy research pipeline.
#[derive(Parser)]
#[command(name = "analogy-engine", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Map a source domain onto a target domain and write a research report
    Run {
        /// Source domain description
        #[arg(long)]
        source: String,
        /// Target domain description
        #[arg(long)]
        target: String,
        #[command(flatten)]
        output: RunOutput,
    },
    /// Let the Visionary pick a source domain for a problem, then run
    Discover {
        /// Problem to solve
        #[arg(long)]
        problem: String,
        #[command(flatten)]
        output: RunOutput,
    },
    /// List stored reports, newest first
    List {
        /// Print full entries as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one stored report as Markdown
    Show {
        /// Report id
        id: String,
    },
    /// Search stored reports by keyword
    Search {
        /// Keywords
        query: String,
    },
    /// Delete a stored report
    Delete {
        /// Report id
        id: String,
    },
    /// Write a stored report to a Markdown file
    Export {
        /// Report id
        id: String,
        /// Output path (defaults to a timestamped file name)
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Append the collected sources
        #[arg(long)]
        include_sources: bool,
    },
}

#[derive(Args)]
struct RunOutput {
    /// Favour academic sources
    #[arg(long)]
    academic: bool,
    /// Favour white papers and technical reports
    #[arg(long)]
    rd: bool,
    /// Keep social media and news results
    #[arg(long)]
    keep_noise: bool,
    /// Do not persist the report
    #[arg(long)]
    no_store: bool,
    /// Print the report as JSON instead of Markdown
    #[arg(long)]
    json: bool,
}

impl RunOutput {
    fn filters(&self) -> SourceFilters {
        SourceFilters {
            academic: self.academic,
            research_and_development: self.rd,
            exclude_noise: !self.keep_noise,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&config);

    info!(version = env!("CARGO_PKG_VERSION"), "Analogy Engine starting...");

    // Initialize storage
    let storage = match SqliteStorage::new(&config.database).await {
        Ok(s) => {
            info!(path = %config.database.path.display(), "Database initialized");
            Arc::new(s)
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize database");
            return Err(e.into());
        }
    };

    match cli.command {
        Command::Run {
            source,
            target,
            output,
        } => {
            let pipeline = build_pipeline(&config, storage, !output.no_store).await?;
            let outcome = pipeline.run(&source, &target, &output.filters()).await?;
            print_outcome(&outcome, output.json)?;
        }
        Command::Discover { problem, output } => {
            let pipeline = build_pipeline(&config, storage, !output.no_store).await?;
            let discovery = pipeline.discover(&problem, &output.filters()).await?;
            eprintln!("Suggested source domain: {}", discovery.suggestion);
            print_outcome(&discovery.outcome, output.json)?;
        }
        Command::List { json } => {
            let entries = storage.list_reports().await?;
            if json {
                let docs: Vec<_> = entries.iter().map(MemoryEntry::to_document).collect();
                println!("{}", serde_json::to_string_pretty(&docs)?);
            } else {
                print_entries(&entries);
            }
        }
        Command::Show { id } => {
            let entry = find_entry(storage.as_ref(), &id).await?;
            println!("{}", to_markdown(&entry.report, true, entry.metadata.stored_at));
        }
        Command::Search { query } => {
            let entries = storage.search_reports(&query).await?;
            print_entries(&entries);
        }
        Command::Delete { id } => {
            if storage.delete_report(&id).await? {
                println!("Deleted {}", id);
            } else {
                anyhow::bail!("No report with id {}", id);
            }
        }
        Command::Export {
            id,
            output,
            include_sources,
        } => {
            let entry = find_entry(storage.as_ref(), &id).await?;
            let now = Utc::now();
            let path = output.unwrap_or_else(|| PathBuf::from(export_filename(now)));
            std::fs::write(&path, to_markdown(&entry.report, include_sources, now))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Exported to {}", path.display());
        }
    }

    Ok(())
}

/// Provision the agent pipes and wire up the pipeline.
async fn build_pipeline(
    config: &Config,
    storage: Arc<SqliteStorage>,
    persist: bool,
) -> anyhow::Result<AnalogyPipeline> {
    config.langbase.require_api_key()?;

    let langbase = match LangbaseClient::new(&config.langbase, config.request.clone()) {
        Ok(c) => {
            info!(base_url = %config.langbase.base_url, "Langbase client initialized");
            c
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize Langbase client");
            return Err(e.into());
        }
    };

    // Ensure required pipes exist (create if needed)
    info!("Ensuring agent pipes exist...");
    let pipes = &config.pipes;
    let definitions = [
        PipeDefinition::for_agent(&pipes.scout, "Scout: text to logic graph", prompts::scout_system_prompt(), true),
        PipeDefinition::for_agent(&pipes.matcher, "Matcher: graph alignment", prompts::matcher_system_prompt(), true),
        PipeDefinition::for_agent(&pipes.critic, "Critic: mapping validation", prompts::critic_system_prompt(), true),
        PipeDefinition::for_agent(&pipes.architect, "Architect: research synthesis", prompts::architect_system_prompt(), true),
        PipeDefinition::for_agent(&pipes.visionary, "Visionary: source domain discovery", prompts::visionary_system_prompt(), false),
    ];
    for definition in &definitions {
        if let Err(e) = langbase.ensure_pipe(definition).await {
            error!(pipe = %definition.name, error = %e, "Failed to ensure pipe exists");
            return Err(e.into());
        }
    }

    let llm = |pipe: &str| Arc::new(PipeLlm::new(langbase.clone(), pipe));
    let mut pipeline = AnalogyPipeline::new(
        Scout::new(llm(&pipes.scout)),
        Matcher::new(llm(&pipes.matcher)),
        Critic::new(llm(&pipes.critic)),
        Architect::new(llm(&pipes.architect)),
    )
    .with_visionary(Visionary::new(llm(&pipes.visionary)));

    if persist {
        pipeline = pipeline.with_storage(storage);
    }

    if config.pipeline.collect_sources {
        let collector = DuckDuckGoCollector::new(&config.sources, config.request.timeout_ms)?;
        pipeline = pipeline.with_sources(Arc::new(collector));
    }

    Ok(pipeline.with_config(&config.pipeline))
}

async fn find_entry(storage: &dyn Storage, id: &str) -> anyhow::Result<MemoryEntry> {
    storage
        .get_report(id)
        .await?
        .with_context(|| format!("No report with id {}", id))
}

fn print_outcome(outcome: &PipelineOutcome, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.report)?);
    } else {
        println!("{}", to_markdown(&outcome.report, true, Utc::now()));
    }
    if let Some(id) = &outcome.report_id {
        eprintln!("Stored as {}", id);
    }
    Ok(())
}

fn print_entries(entries: &[MemoryEntry]) {
    if entries.is_empty() {
        println!("No reports found.");
        return;
    }
    for entry in entries {
        println!(
            "{}  {}  {}",
            entry.id,
            entry.metadata.stored_at.format("%Y-%m-%d %H:%M"),
            entry.report.summary
        );
    }
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
