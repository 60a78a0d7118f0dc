//! DuckDuckGo Lite search.
//!
//! The lite interface renders results as plain tables: the first two tables
//! hold navigation and branding, every following row may carry a result link
//! wrapped in a `/l/?uddg=<destination>` redirect.

use std::time::Duration;

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use crate::config::SearchConfig;
use crate::error::{AgentError, Result};

pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://lite.duckduckgo.com";
pub const DEFAULT_MAX_RESULTS: usize = 5;

/// Registrable domain of the provider; links back into it are navigation noise.
const PROVIDER_DOMAIN: &str = "duckduckgo.com";
/// Base used to resolve relative and protocol-relative result links.
const PROVIDER_BASE: &str = "https://duckduckgo.com/";
const REDIRECT_PARAM: &str = "uddg";
const NAVIGATION_TABLES: usize = 2;

pub const SEARCH_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
}

#[derive(Clone)]
pub struct SearchClient {
    http: reqwest::Client,
    endpoint: String,
}

impl SearchClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(SEARCH_USER_AGENT)
            .build()
            .map_err(|e| AgentError::Search(format!("http client error: {e}")))?;
        Ok(Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(cfg: &SearchConfig) -> Result<Self> {
        Self::new(cfg.endpoint.clone(), Duration::from_secs(cfg.timeout_secs))
    }

    /// Returns at most `max_results` external results. Failures of any kind
    /// yield an empty list.
    pub async fn search(&self, query: &str, max_results: usize) -> Vec<SearchResult> {
        if max_results == 0 {
            return Vec::new();
        }
        info!(query, "searching");

        match self.fetch(query).await {
            Ok(html) => {
                let results = parse_results(&html, max_results);
                info!(count = results.len(), "search finished");
                results
            }
            Err(err) => {
                warn!(query, error = %err, "search request failed");
                Vec::new()
            }
        }
    }

    async fn fetch(&self, query: &str) -> Result<String> {
        let url = format!("{}/lite/?q={}", self.endpoint, urlencoding::encode(query));

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| AgentError::Search(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::Search(format!("provider answered {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| AgentError::Search(format!("unreadable body: {e}")))
    }
}

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("static selector is valid")
}

/// Extracts result rows from a lite results page.
pub fn parse_results(html: &str, max_results: usize) -> Vec<SearchResult> {
    let document = Html::parse_document(html);
    let table_sel = selector("table");
    let row_sel = selector("tr");
    let link_sel = selector("a[href]");

    let mut results = Vec::new();
    'tables: for table in document.select(&table_sel).skip(NAVIGATION_TABLES) {
        for row in table.select(&row_sel) {
            if results.len() >= max_results {
                break 'tables;
            }
            let Some(link) = row.select(&link_sel).next() else {
                continue;
            };
            let Some(url) = link.value().attr("href").and_then(resolve_destination) else {
                continue;
            };
            let title = link.text().collect::<Vec<_>>().join(" ");
            results.push(SearchResult {
                title: title.split_whitespace().collect::<Vec<_>>().join(" "),
                url,
            });
        }
    }
    results
}

/// Unwraps the redirect parameter and keeps only absolute http(s)
/// destinations outside the provider's domain.
fn resolve_destination(href: &str) -> Option<String> {
    let base = Url::parse(PROVIDER_BASE).ok()?;
    let link = base.join(href).ok()?;

    let destination = link
        .query_pairs()
        .find(|(key, _)| key == REDIRECT_PARAM)
        .map(|(_, value)| value.into_owned())
        .unwrap_or_else(|| link.to_string());

    let parsed = Url::parse(&destination).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    let host = parsed.host_str()?;
    if is_provider_host(host) {
        return None;
    }
    Some(destination)
}

fn is_provider_host(host: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    host == PROVIDER_DOMAIN || host.ends_with(&format!(".{PROVIDER_DOMAIN}"))
}
