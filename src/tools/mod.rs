//! Capabilities the agent can invoke on the model's behalf.
//!
//! - Search: DuckDuckGo Lite results as `{title, url}` pairs.
//! - ReadPage: rendered page text through a headless browser.

pub mod read_page;
pub mod search;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::info;

use crate::message::{ToolCallRequest, ToolResult};

pub use read_page::{ChromiumRenderer, PageReader, PageRenderer};
pub use search::{SearchClient, SearchResult};

/// The closed set of actions a tool call can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Search,
    ReadPage,
}

impl Capability {
    pub const ALL: [Capability; 2] = [Capability::Search, Capability::ReadPage];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "search" => Some(Capability::Search),
            "scrape_and_read" | "read_page" => Some(Capability::ReadPage),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Capability::Search => "search",
            Capability::ReadPage => "scrape_and_read",
        }
    }

    pub fn signature(self) -> &'static str {
        match self {
            Capability::Search => "search(query: str)",
            Capability::ReadPage => "scrape_and_read(url: str)",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Capability::Search => {
                "Searches the web and returns a list of pages with titles and URLs."
            }
            Capability::ReadPage => "Reads the full text content of a given URL.",
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    max_results: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ReadPageArgs {
    url: String,
}

/// Routes tool calls to the search client or the page reader.
#[derive(Clone)]
pub struct Toolbox {
    search: SearchClient,
    reader: PageReader,
    max_results: usize,
}

impl Toolbox {
    pub fn new(search: SearchClient, reader: PageReader) -> Self {
        Self {
            search,
            reader,
            max_results: search::DEFAULT_MAX_RESULTS,
        }
    }

    /// Default result count when the model does not pass `max_results`.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn resolve(&self, request: &ToolCallRequest) -> Option<Capability> {
        Capability::from_name(&request.name)
    }

    /// Runs a capability. Argument problems and capability failures come
    /// back as text payloads, never as errors.
    pub async fn dispatch(&self, capability: Capability, args: &Map<String, Value>) -> ToolResult {
        let name = capability.name();
        info!(tool = name, "dispatching tool call");

        match capability {
            Capability::Search => match decode_args::<SearchArgs>(capability, args) {
                Ok(SearchArgs { query, max_results }) => {
                    let results = self
                        .search
                        .search(&query, max_results.unwrap_or(self.max_results))
                        .await;
                    let payload = serde_json::to_value(results)
                        .unwrap_or_else(|_| Value::Array(Vec::new()));
                    ToolResult::new(name, payload)
                }
                Err(message) => ToolResult::new(name, message),
            },
            Capability::ReadPage => match decode_args::<ReadPageArgs>(capability, args) {
                Ok(ReadPageArgs { url }) => ToolResult::new(name, self.reader.read_page(&url).await),
                Err(message) => ToolResult::new(name, message),
            },
        }
    }
}

fn decode_args<T: DeserializeOwned>(
    capability: Capability,
    args: &Map<String, Value>,
) -> Result<T, String> {
    serde_json::from_value(Value::Object(args.clone())).map_err(|err| {
        format!(
            "Error: invalid arguments for tool `{}`: {err}. Expected {}.",
            capability.name(),
            capability.signature()
        )
    })
}
