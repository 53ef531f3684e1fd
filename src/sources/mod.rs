//! Source collection: web search for reading material on an analogy.
//!
//! Collection is best effort. A [`SourceCollector`] never returns an error;
//! any transport or parse problem yields an empty list and a log line.

use async_trait::async_trait;
use reqwest::{Client, Url};
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::SourcesConfig;

/// Longest query sent to the search backend, in characters.
pub const MAX_QUERY_CHARS: usize = 400;

const ACADEMIC_OPERATORS: &str =
    " (filetype:pdf \"thesis\" OR site:arxiv.org OR site:ieeexplore.ieee.org OR site:*.edu)";
const RD_OPERATORS: &str = " (\"white paper\" OR site:*.gov OR \"technical report\")";
const NOISE_OPERATORS: &str = " -site:reddit.com -site:quora.com -site:youtube.com -site:facebook.com -site:twitter.com -inurl:news";

/// Which kinds of sources to favour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceFilters {
    /// Papers, theses and university pages.
    pub academic: bool,
    /// White papers, government and technical reports.
    pub research_and_development: bool,
    /// Exclude social media and news sites.
    pub exclude_noise: bool,
}

impl Default for SourceFilters {
    fn default() -> Self {
        Self {
            academic: false,
            research_and_development: false,
            exclude_noise: true,
        }
    }
}

/// Append search operators for `filters` and cap the query length.
pub fn enhance_query(query: &str, filters: &SourceFilters) -> String {
    let mut enhanced = query.trim().to_string();
    if filters.academic {
        enhanced.push_str(ACADEMIC_OPERATORS);
    }
    if filters.research_and_development {
        enhanced.push_str(RD_OPERATORS);
    }
    if filters.exclude_noise {
        enhanced.push_str(NOISE_OPERATORS);
    }

    if enhanced.chars().count() > MAX_QUERY_CHARS {
        let mut truncated: String = enhanced.chars().take(MAX_QUERY_CHARS - 3).collect();
        truncated.push_str("...");
        truncated
    } else {
        enhanced
    }
}

/// Something that can turn a query into source URLs.
#[async_trait]
pub trait SourceCollector: Send + Sync {
    /// Source URLs for `query`, deduplicated, in relevance order.
    async fn collect(&self, query: &str, filters: &SourceFilters) -> Vec<String>;
}

/// Collector that never finds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSources;

#[async_trait]
impl SourceCollector for NoSources {
    async fn collect(&self, _query: &str, _filters: &SourceFilters) -> Vec<String> {
        Vec::new()
    }
}

/// Collector backed by the DuckDuckGo HTML endpoint.
#[derive(Clone)]
pub struct DuckDuckGoCollector {
    client: Client,
    base_url: String,
    max_results: usize,
}

impl DuckDuckGoCollector {
    /// Build a collector from configuration.
    pub fn new(config: &SourcesConfig, timeout_ms: u64) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .user_agent(concat!("analogy-engine/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_results: config.max_results,
        })
    }

    async fn search(&self, query: &str) -> Result<String, reqwest::Error> {
        let url = format!("{}/html/", self.base_url);
        self.client
            .get(url)
            .query(&[("q", query)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

#[async_trait]
impl SourceCollector for DuckDuckGoCollector {
    async fn collect(&self, query: &str, filters: &SourceFilters) -> Vec<String> {
        if query.trim().is_empty() {
            return Vec::new();
        }

        let enhanced = enhance_query(query, filters);
        debug!(query_len = enhanced.chars().count(), "Searching for sources");

        match self.search(&enhanced).await {
            Ok(html) => {
                let urls = extract_result_urls(&html, self.max_results);
                info!(count = urls.len(), "Collected sources");
                urls
            }
            Err(e) => {
                warn!(error = %e, "Source collection failed");
                Vec::new()
            }
        }
    }
}

/// Pull result URLs out of a DuckDuckGo HTML page.
///
/// Result links are redirects carrying the destination in a `uddg` query
/// parameter. Duplicates are dropped keeping first occurrence.
pub fn extract_result_urls(html: &str, max_results: usize) -> Vec<String> {
    let Ok(links) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let document = Html::parse_document(html);

    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for href in document.select(&links).filter_map(|el| el.value().attr("href")) {
        if urls.len() >= max_results {
            break;
        }
        let Some(target) = redirect_target(href) else {
            continue;
        };
        if seen.insert(target.clone()) {
            urls.push(target);
        }
    }

    urls
}

fn redirect_target(href: &str) -> Option<String> {
    if !href.contains("uddg=") {
        return None;
    }
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else if href.starts_with('/') {
        format!("https://duckduckgo.com{}", href)
    } else {
        href.to_string()
    };

    let url = Url::parse(&absolute).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "uddg")
        .map(|(_, value)| value.into_owned())
        .filter(|target| target.starts_with("http"))
}
