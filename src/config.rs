//! TOML configuration.
//!
//! Every section is optional; omitted keys fall back to the defaults
//! below. The generation credential is never read from this file, only
//! from the environment variable named by `generation.api_key_env`.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

use context_qa_core::prompt::{PromptTemplate, DEFAULT_CUE, DEFAULT_PREAMBLE};
use context_qa_core::segment::DEFAULT_SEGMENT_SIZE;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub segmentation: SegmentationConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SegmentationConfig {
    #[serde(default = "default_segment_size")]
    pub size: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_SEGMENT_SIZE,
        }
    }
}

fn default_segment_size() -> usize {
    DEFAULT_SEGMENT_SIZE
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            endpoint: default_endpoint(),
            api_key_env: default_api_key_env(),
            max_output_tokens: default_max_output_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "cohere".to_string()
}
fn default_model() -> String {
    "command-xlarge".to_string()
}
fn default_endpoint() -> String {
    "https://api.cohere.ai".to_string()
}
fn default_api_key_env() -> String {
    "COHERE_API_KEY".to_string()
}
fn default_max_output_tokens() -> u32 {
    200
}
fn default_temperature() -> f32 {
    0.7
}
fn default_timeout_secs() -> u64 {
    30
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConversationConfig {
    /// Most recent turns forwarded to the generation service. `0` means unbounded.
    #[serde(default = "default_max_history_turns")]
    pub max_history_turns: usize,
    #[serde(default = "default_preamble")]
    pub preamble: String,
    #[serde(default = "default_cue")]
    pub cue: String,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_history_turns: default_max_history_turns(),
            preamble: default_preamble(),
            cue: default_cue(),
        }
    }
}

fn default_max_history_turns() -> usize {
    50
}
fn default_preamble() -> String {
    DEFAULT_PREAMBLE.to_string()
}
fn default_cue() -> String {
    DEFAULT_CUE.to_string()
}

impl ConversationConfig {
    pub fn history_limit(&self) -> Option<usize> {
        match self.max_history_turns {
            0 => None,
            n => Some(n),
        }
    }

    pub fn template(&self) -> PromptTemplate {
        PromptTemplate {
            preamble: self.preamble.clone(),
            cue: self.cue.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Largest accepted document upload, in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Live sessions the server holds before refusing new ones.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
            max_sessions: default_max_sessions(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}
fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}
fn default_max_sessions() -> usize {
    256
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.segmentation.size == 0 {
            bail!("segmentation.size must be > 0");
        }

        let generation = &self.generation;
        match generation.provider.as_str() {
            "cohere" | "disabled" => {}
            other => bail!(
                "Unknown generation provider: '{}'. Must be cohere or disabled.",
                other
            ),
        }
        if generation.max_output_tokens == 0 {
            bail!("generation.max_output_tokens must be > 0");
        }
        if !(0.0..=5.0).contains(&generation.temperature) {
            bail!("generation.temperature must be in [0.0, 5.0]");
        }
        if generation.timeout_secs == 0 {
            bail!("generation.timeout_secs must be > 0");
        }
        if self.server.max_upload_bytes == 0 {
            bail!("server.max_upload_bytes must be > 0");
        }
        if self.server.max_sessions == 0 {
            bail!("server.max_sessions must be > 0");
        }
        if generation.is_enabled() && generation.model.trim().is_empty() {
            bail!("generation.model must be specified when provider is '{}'", generation.provider);
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

/// Load `path`, or fall back to defaults when the file is absent and the
/// path was not given explicitly.
pub fn load_or_default(path: &Path, explicit: bool) -> Result<Config> {
    if !explicit && !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::default());
    }
    load_config(path)
}
