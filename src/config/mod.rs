use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Application configuration loaded from environment variables.
///
/// Built once at startup and handed to every component constructor.
/// Tests construct it field by field.
#[derive(Debug, Clone)]
pub struct Config {
    pub langbase: LangbaseConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
    pub pipes: PipeConfig,
    pub pipeline: PipelineConfig,
    pub sources: SourcesConfig,
}

/// Langbase API configuration
#[derive(Debug, Clone)]
pub struct LangbaseConfig {
    pub api_key: String,
    pub base_url: String,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// HTTP request configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

/// Langbase pipe name per agent
#[derive(Debug, Clone)]
pub struct PipeConfig {
    pub scout: String,
    pub matcher: String,
    pub critic: String,
    pub architect: String,
    pub visionary: String,
}

/// Pipeline driver configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Critic confidence below this value triggers the single refinement pass.
    pub refinement_threshold: f64,
    /// Whether finished reports are enriched with web sources.
    pub collect_sources: bool,
}

/// Source collection (web search) configuration
#[derive(Debug, Clone)]
pub struct SourcesConfig {
    pub base_url: String,
    pub max_results: usize,
}

impl LangbaseConfig {
    /// The API key, or a config error when it is unset or blank.
    ///
    /// Checked only by commands that call a pipe, so report browsing works
    /// without credentials.
    pub fn require_api_key(&self) -> Result<&str, AppError> {
        let key = self.api_key.trim();
        if key.is_empty() {
            return Err(AppError::Config {
                message: "LANGBASE_API_KEY is required".to_string(),
            });
        }
        Ok(key)
    }
}

/// Default refinement threshold for Critic confidence.
pub const DEFAULT_REFINEMENT_THRESHOLD: f64 = 0.8;

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let langbase = LangbaseConfig {
            api_key: env::var("LANGBASE_API_KEY").unwrap_or_default(),
            base_url: env::var("LANGBASE_BASE_URL")
                .unwrap_or_else(|_| "https://api.langbase.com".to_string()),
        };

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/analogies.db".to_string()),
            ),
            max_connections: parse_env("DATABASE_MAX_CONNECTIONS").unwrap_or(5),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            timeout_ms: parse_env("REQUEST_TIMEOUT_MS").unwrap_or(60000),
            max_retries: parse_env("MAX_RETRIES").unwrap_or(1),
            retry_delay_ms: parse_env("RETRY_DELAY_MS").unwrap_or(1000),
        };

        let pipes = PipeConfig {
            scout: env::var("PIPE_SCOUT").unwrap_or_else(|_| "analogy-scout-v1".to_string()),
            matcher: env::var("PIPE_MATCHER").unwrap_or_else(|_| "analogy-matcher-v1".to_string()),
            critic: env::var("PIPE_CRITIC").unwrap_or_else(|_| "analogy-critic-v1".to_string()),
            architect: env::var("PIPE_ARCHITECT")
                .unwrap_or_else(|_| "analogy-architect-v1".to_string()),
            visionary: env::var("PIPE_VISIONARY")
                .unwrap_or_else(|_| "analogy-visionary-v1".to_string()),
        };

        let pipeline = PipelineConfig {
            refinement_threshold: parse_env::<f64>("REFINEMENT_THRESHOLD")
                .filter(|t| t.is_finite())
                .map(|t| t.clamp(0.0, 1.0))
                .unwrap_or(DEFAULT_REFINEMENT_THRESHOLD),
            collect_sources: env::var("COLLECT_SOURCES")
                .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "no" | "off"))
                .unwrap_or(true),
        };

        let sources = SourcesConfig {
            base_url: env::var("SEARCH_BASE_URL")
                .unwrap_or_else(|_| "https://html.duckduckgo.com".to_string()),
            max_results: parse_env("SEARCH_MAX_RESULTS").unwrap_or(15),
        };

        Ok(Config {
            langbase,
            database,
            logging,
            request,
            pipes,
            pipeline,
            sources,
        })
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 60000,
            max_retries: 1,
            retry_delay_ms: 1000,
        }
    }
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            scout: "analogy-scout-v1".to_string(),
            matcher: "analogy-matcher-v1".to_string(),
            critic: "analogy-critic-v1".to_string(),
            architect: "analogy-architect-v1".to_string(),
            visionary: "analogy-visionary-v1".to_string(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            refinement_threshold: DEFAULT_REFINEMENT_THRESHOLD,
            collect_sources: true,
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            base_url: "https://html.duckduckgo.com".to_string(),
            max_results: 15,
        }
    }
}
