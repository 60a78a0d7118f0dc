use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

/// File read by [`AgentConfig::load`] when `CHIKORO_CONFIG` is unset.
pub const DEFAULT_CONFIG_FILE: &str = "chikoro.toml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    #[serde(default = "default_model_host")]
    pub host: String,
    #[serde(default = "default_model_name")]
    pub model: String,
    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            host: default_model_host(),
            model: default_model_name(),
            timeout_secs: default_model_timeout(),
        }
    }
}

fn default_model_host() -> String {
    "http://localhost:11434".into()
}

fn default_model_name() -> String {
    "chikoro-ai".into()
}

fn default_model_timeout() -> u64 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchConfig {
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            max_results: default_max_results(),
            timeout_secs: default_search_timeout(),
        }
    }
}

fn default_search_endpoint() -> String {
    crate::tools::search::DEFAULT_SEARCH_ENDPOINT.into()
}

fn default_max_results() -> usize {
    crate::tools::search::DEFAULT_MAX_RESULTS
}

fn default_search_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrowserConfig {
    #[serde(default = "default_render_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    /// Chromium binary; auto-detected when unset.
    #[serde(default)]
    pub executable: Option<PathBuf>,
    /// Needed when running as root inside containers.
    #[serde(default)]
    pub no_sandbox: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_render_timeout(),
            max_length: default_max_length(),
            executable: None,
            no_sandbox: false,
        }
    }
}

fn default_render_timeout() -> u64 {
    30
}

fn default_max_length() -> usize {
    crate::tools::read_page::DEFAULT_MAX_LENGTH
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoopConfig {
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: default_max_tool_rounds(),
            system_prompt: None,
        }
    }
}

fn default_max_tool_rounds() -> usize {
    crate::agent::DEFAULT_MAX_TOOL_ROUNDS
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub agent: LoopConfig,
}

impl AgentConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        toml::from_str(&raw)
            .map_err(|err| AgentError::Config(format!("Failed to parse configuration: {err}")))
    }

    pub fn from_env_or_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut cfg = Self::from_file(path)?;
        cfg.apply_env();
        Ok(cfg)
    }

    /// Reads `$CHIKORO_CONFIG`, else `chikoro.toml` if it exists, else the
    /// defaults; environment overrides are applied on top in every case.
    pub fn load() -> Result<Self> {
        let mut cfg = match env::var("CHIKORO_CONFIG") {
            Ok(path) => Self::from_file(path)?,
            Err(_) if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(DEFAULT_CONFIG_FILE)?
            }
            Err(_) => Self::default(),
        };
        cfg.apply_env();
        Ok(cfg)
    }

    fn apply_env(&mut self) {
        if let Ok(host) = env::var("CHIKORO_MODEL_HOST") {
            self.model.host = host;
        }
        if let Ok(model) = env::var("CHIKORO_MODEL") {
            self.model.model = model;
        }
        if let Ok(endpoint) = env::var("CHIKORO_SEARCH_ENDPOINT") {
            self.search.endpoint = endpoint;
        }
        if let Ok(rounds) = env::var("CHIKORO_MAX_TOOL_ROUNDS") {
            if let Ok(parsed) = rounds.parse::<usize>() {
                self.agent.max_tool_rounds = parsed;
            }
        }
        if let Ok(chrome) = env::var("CHIKORO_CHROME") {
            self.browser.executable = Some(PathBuf::from(chrome));
        }
    }
}
