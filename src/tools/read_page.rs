//! Page reading through a headless browser.
//!
//! Rendering is delegated to a [`PageRenderer`]; the reader owns the timeout,
//! cleaning and truncation rules and turns every failure into a sentence the
//! model can reason about.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as LaunchConfig};
use chromiumoxide::cdp::browser_protocol::network::LoaderId;
use chromiumoxide::cdp::browser_protocol::page::{
    EventLifecycleEvent, FrameId, NavigateParams, SetLifecycleEventsEnabledParams,
};
use futures::{Stream, StreamExt};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::BrowserConfig;
use crate::error::{AgentError, Result};

pub const DEFAULT_MAX_LENGTH: usize = 8000;
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(30);
pub const TRUNCATION_MARKER: &str = "...";
pub const TIMEOUT_MESSAGE: &str =
    "Failed to retrieve content from the URL due to a timeout. The page may be too slow or complex.";

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/108.0.0.0 Safari/537.36";

/// Extra time granted to a renderer to tear its session down after the
/// render deadline before the reader gives up on it.
const TEARDOWN_GRACE: Duration = Duration::from_secs(5);

/// Elements dropped with their subtrees. `noscript` and `template` bodies
/// come out of the parser as raw markup text, `svg` carries no prose.
const BOILERPLATE_TAGS: &[&str] = &[
    "script", "style", "nav", "footer", "header", "aside", "form", "noscript", "template", "svg",
];

/// Produces the fully rendered HTML of a page.
///
/// Implementations must return [`AgentError::Timeout`] when `timeout` elapses
/// and must release whatever session they acquired on every path.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &str, timeout: Duration) -> Result<String>;
}

pub fn failure_message(cause: &AgentError) -> String {
    format!("Failed to retrieve content. It may be protected or require a CAPTCHA. Error: {cause}")
}

#[derive(Clone)]
pub struct PageReader {
    renderer: Arc<dyn PageRenderer>,
    timeout: Duration,
    max_length: usize,
}

impl PageReader {
    pub fn new(renderer: Arc<dyn PageRenderer>) -> Self {
        Self {
            renderer,
            timeout: DEFAULT_RENDER_TIMEOUT,
            max_length: DEFAULT_MAX_LENGTH,
        }
    }

    pub fn from_config(renderer: Arc<dyn PageRenderer>, cfg: &BrowserConfig) -> Self {
        Self::new(renderer)
            .with_timeout(Duration::from_secs(cfg.timeout_secs))
            .with_max_length(cfg.max_length)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    /// Returns cleaned page text, or a diagnostic sentence on failure.
    pub async fn read_page(&self, url: &str) -> String {
        info!(url, "reading page");
        let rendered = tokio::time::timeout(
            self.timeout + TEARDOWN_GRACE,
            self.renderer.render(url, self.timeout),
        )
        .await
        .unwrap_or(Err(AgentError::Timeout(self.timeout)));

        match rendered {
            Ok(html) => {
                let text = truncate(&clean_html(&html), self.max_length);
                info!(url, length = text.chars().count(), "page read");
                text
            }
            Err(AgentError::Timeout(after)) => {
                warn!(url, ?after, "page render timed out");
                TIMEOUT_MESSAGE.to_string()
            }
            Err(err) => {
                warn!(url, error = %err, "page render failed");
                failure_message(&err)
            }
        }
    }
}

fn whitespace_runs() -> &'static Regex {
    static RUNS: OnceLock<Regex> = OnceLock::new();
    RUNS.get_or_init(|| Regex::new(r"\s{2,}").expect("static regex is valid"))
}

/// Visible text of the document body, one text block per line, with
/// boilerplate elements removed and whitespace runs collapsed.
pub fn clean_html(html: &str) -> String {
    let document = Html::parse_document(html);
    let body_sel = Selector::parse("body").expect("static selector is valid");
    let root = document
        .select(&body_sel)
        .next()
        .unwrap_or_else(|| document.root_element());

    let mut blocks = Vec::new();
    collect_text(root, &mut blocks);
    whitespace_runs()
        .replace_all(&blocks.join("\n"), " ")
        .into_owned()
}

fn collect_text(element: ElementRef<'_>, blocks: &mut Vec<String>) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            if !is_boilerplate(&child_element) {
                collect_text(child_element, blocks);
            }
        } else if let Some(text) = child.value().as_text() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                blocks.push(trimmed.to_string());
            }
        }
    }
}

fn is_boilerplate(element: &ElementRef<'_>) -> bool {
    let value = element.value();
    BOILERPLATE_TAGS.contains(&value.name()) || value.attr("aria-hidden") == Some("true")
}

/// Cuts `text` to `max_length` characters, appending the marker when cut.
pub fn truncate(text: &str, max_length: usize) -> String {
    match text.char_indices().nth(max_length) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &text[..cut]),
        None => text.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Headless Chromium
// ─────────────────────────────────────────────────────────────────────────────

/// Renders pages in a fresh headless Chromium per call.
#[derive(Clone)]
pub struct ChromiumRenderer {
    executable: Option<PathBuf>,
    no_sandbox: bool,
}

impl ChromiumRenderer {
    pub fn from_config(cfg: &BrowserConfig) -> Self {
        Self {
            executable: cfg.executable.clone(),
            no_sandbox: cfg.no_sandbox,
        }
    }
}

#[async_trait]
impl PageRenderer for ChromiumRenderer {
    async fn render(&self, url: &str, timeout: Duration) -> Result<String> {
        let session = BrowserSession::launch(self.executable.as_deref(), self.no_sandbox).await?;
        let outcome = tokio::time::timeout(timeout, session.load(url)).await;
        session.close().await;
        outcome.unwrap_or(Err(AgentError::Timeout(timeout)))
    }
}

fn browser_error(err: impl std::fmt::Display) -> AgentError {
    AgentError::Browser(err.to_string())
}

/// A launched browser plus the task pumping its CDP events. Dropping it
/// without [`BrowserSession::close`] still kills the child process.
struct BrowserSession {
    browser: Browser,
    events: JoinHandle<()>,
}

impl BrowserSession {
    async fn launch(executable: Option<&Path>, no_sandbox: bool) -> Result<Self> {
        let mut builder = LaunchConfig::builder();
        if let Some(path) = executable {
            builder = builder.chrome_executable(path);
        }
        if no_sandbox {
            builder = builder.no_sandbox();
        }
        let config = builder.build().map_err(AgentError::Browser)?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(browser_error)?;
        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        debug!("browser session started");
        Ok(Self { browser, events })
    }

    /// Navigates and returns the document once the main frame's network has
    /// gone quiet.
    async fn load(&self, url: &str) -> Result<String> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(browser_error)?;
        page.set_user_agent(BROWSER_USER_AGENT)
            .await
            .map_err(browser_error)?;
        page.execute(SetLifecycleEventsEnabledParams::new(true))
            .await
            .map_err(browser_error)?;
        let lifecycle = page
            .event_listener::<EventLifecycleEvent>()
            .await
            .map_err(browser_error)?;
        let main_frame = page.mainframe().await.map_err(browser_error)?;

        let navigation = page
            .execute(NavigateParams::new(url))
            .await
            .map_err(browser_error)?
            .result;
        if let Some(reason) = navigation.error_text {
            return Err(AgentError::Browser(reason));
        }

        let target = IdleTarget {
            frame: main_frame.as_ref(),
            loader: navigation.loader_id.as_ref(),
        };
        if !wait_for_network_idle(lifecycle, target).await {
            debug!(url, "lifecycle stream ended before network idle");
        }
        page.content().await.map_err(browser_error)
    }

    async fn close(mut self) {
        if let Err(err) = self.browser.close().await {
            warn!(error = %err, "browser did not close cleanly");
        }
        if let Err(err) = self.browser.wait().await {
            debug!(error = %err, "waiting for browser exit failed");
        }
        self.events.abort();
        debug!("browser session closed");
    }
}

/// Lifecycle position of one navigation. Events recorded before the
/// navigation's `init` belong to the previous document and are ignored.
#[derive(Debug, Default)]
struct NavigationLifecycle {
    started: bool,
}

impl NavigationLifecycle {
    /// Feeds one lifecycle event name; true once the network is idle.
    fn observe(&mut self, name: &str) -> bool {
        match name {
            "init" => {
                self.started = true;
                false
            }
            "networkIdle" => self.started,
            _ => false,
        }
    }
}

/// Frame and document whose lifecycle events count. `None` matches any.
#[derive(Clone, Copy, Default)]
struct IdleTarget<'a> {
    frame: Option<&'a FrameId>,
    loader: Option<&'a LoaderId>,
}

impl IdleTarget<'_> {
    fn matches(&self, event: &EventLifecycleEvent) -> bool {
        self.frame.map_or(true, |frame| *frame == event.frame_id)
            && self.loader.map_or(true, |loader| *loader == event.loader_id)
    }
}

/// Consumes lifecycle events until the target document reports
/// `networkIdle`. Returns false if the stream ends first. The caller bounds
/// the wait.
async fn wait_for_network_idle<S, E>(mut events: S, target: IdleTarget<'_>) -> bool
where
    S: Stream<Item = E> + Unpin,
    E: std::ops::Deref<Target = EventLifecycleEvent>,
{
    let mut navigation = NavigationLifecycle::default();
    while let Some(event) = events.next().await {
        if !target.matches(&event) {
            continue;
        }
        if navigation.observe(&event.name) {
            return true;
        }
    }
    false
}
