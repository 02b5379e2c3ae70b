//! Configuration primitives for Dossier workspaces.
//!
//! Stored in a machine-readable TOML file located at:
//!   %APPDATA%/Dossier/config/config.toml on Windows
//!   $XDG_DATA_HOME/Dossier/config/config.toml on Linux
//!   ~/Library/Application Support/Dossier/config/config.toml on macOS
//!
//! The config tracks the scraping provider credentials and schedule, the
//! LLM endpoints used by extraction and synthesis, and per-install
//! pipeline defaults such as the provider-call budget.

use serde::{Deserialize, Serialize};

/// Root configuration persisted per installation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Scraping provider endpoint, credentials, and polling schedule.
    #[serde(default)]
    pub scraper: ScraperSettings,
    /// LLM endpoint and per-call parameters for extraction and synthesis.
    #[serde(default)]
    pub llm: LlmSettings,
    /// Embedding index knobs (dimension, truncation).
    #[serde(default)]
    pub vector: VectorSettings,
    /// Run pipeline defaults (budget, fan-out, parallelism).
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

/// Scraping provider preferences tied to the local install.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperSettings {
    /// Base URL of the dataset scraping provider.
    #[serde(default = "default_scraper_base_url")]
    pub base_url: String,
    /// Bearer token for the provider. The `DOSSIER_SCRAPER_TOKEN`
    /// environment variable takes precedence when set.
    #[serde(default)]
    pub api_token: String,
    /// Dataset id for individual profile scrapes.
    #[serde(default = "default_profile_dataset_id")]
    pub profile_dataset_id: String,
    /// Dataset id for company page scrapes.
    #[serde(default = "default_company_dataset_id")]
    pub company_dataset_id: String,
    /// Dataset id for name-based profile discovery.
    #[serde(default = "default_search_dataset_id")]
    pub search_dataset_id: String,
    /// Dataset id for general web search used as context evidence.
    #[serde(default = "default_serp_dataset_id")]
    pub serp_dataset_id: String,
    /// Host whose profile URLs are treated as direct-scrape subjects.
    #[serde(default = "default_profile_host")]
    pub profile_host: String,
    /// Seconds to wait before the first snapshot poll.
    #[serde(default = "default_initial_delay_secs")]
    pub initial_delay_secs: u64,
    /// Seconds between snapshot polls.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Total seconds a single scrape job may spend polling.
    #[serde(default = "default_poll_budget_secs")]
    pub poll_budget_secs: u64,
}

impl Default for ScraperSettings {
    fn default() -> Self {
        Self {
            base_url: default_scraper_base_url(),
            api_token: String::new(),
            profile_dataset_id: default_profile_dataset_id(),
            company_dataset_id: default_company_dataset_id(),
            search_dataset_id: default_search_dataset_id(),
            serp_dataset_id: default_serp_dataset_id(),
            profile_host: default_profile_host(),
            initial_delay_secs: default_initial_delay_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            poll_budget_secs: default_poll_budget_secs(),
        }
    }
}

impl ScraperSettings {
    /// Resolves the provider token, preferring the environment variable.
    pub fn resolved_token(&self) -> String {
        std::env::var("DOSSIER_SCRAPER_TOKEN").unwrap_or_else(|_| self.api_token.clone())
    }
}

fn default_scraper_base_url() -> String {
    "https://api.brightdata.com".to_string()
}

fn default_profile_dataset_id() -> String {
    "gd_l1viktl72bvl7bjuj0".to_string()
}

fn default_company_dataset_id() -> String {
    "gd_l1vikfnt1wgvvqz95w".to_string()
}

fn default_search_dataset_id() -> String {
    "gd_l1viktl72bvl7bjuj0".to_string()
}

fn default_serp_dataset_id() -> String {
    "gd_lvz8ah06191smkebj4".to_string()
}

fn default_profile_host() -> String {
    "linkedin.com".to_string()
}

const fn default_initial_delay_secs() -> u64 {
    15
}

const fn default_poll_interval_secs() -> u64 {
    30
}

const fn default_poll_budget_secs() -> u64 {
    900
}

/// LLM endpoint and sampling parameters for the two pipeline call sites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// Chat-completions base URL (OpenAI-compatible).
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    /// Model identifier sent with every request.
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Optional API key. `DOSSIER_LLM_API_KEY` takes precedence.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Embedding model used by the vector index.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    /// Sampling temperature for claim extraction. Conservative by contract.
    #[serde(default = "default_extraction_temperature")]
    pub extraction_temperature: f64,
    /// Token cap for extraction calls.
    #[serde(default = "default_extraction_max_tokens")]
    pub extraction_max_tokens: u32,
    /// Sampling temperature for report synthesis.
    #[serde(default = "default_synthesis_temperature")]
    pub synthesis_temperature: f64,
    /// Token cap for synthesis calls.
    #[serde(default = "default_synthesis_max_tokens")]
    pub synthesis_max_tokens: u32,
    /// Request timeout in seconds for chat and embedding calls.
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            api_key: None,
            embedding_model: default_embedding_model(),
            extraction_temperature: default_extraction_temperature(),
            extraction_max_tokens: default_extraction_max_tokens(),
            synthesis_temperature: default_synthesis_temperature(),
            synthesis_max_tokens: default_synthesis_max_tokens(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

impl LlmSettings {
    /// Resolves the API key, preferring the environment variable.
    pub fn resolved_api_key(&self) -> Option<String> {
        std::env::var("DOSSIER_LLM_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .or_else(|| self.api_key.clone().filter(|k| !k.is_empty()))
    }
}

fn default_llm_base_url() -> String {
    "http://localhost:1234/v1".to_string()
}

fn default_llm_model() -> String {
    "qwen/qwen3-8b".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-nomic-embed-text-v1.5".to_string()
}

const fn default_extraction_temperature() -> f64 {
    0.1
}

const fn default_extraction_max_tokens() -> u32 {
    1_000
}

const fn default_synthesis_temperature() -> f64 {
    0.3
}

const fn default_synthesis_max_tokens() -> u32 {
    2_000
}

const fn default_llm_timeout_secs() -> u64 {
    120
}

/// Embedding index parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorSettings {
    /// Fixed embedding width; vectors of any other width are rejected.
    #[serde(default = "default_vector_dimension")]
    pub dimension: usize,
    /// Characters of content embedded per record; longer text is truncated.
    #[serde(default = "default_max_embed_chars")]
    pub max_embed_chars: usize,
}

impl Default for VectorSettings {
    fn default() -> Self {
        Self {
            dimension: default_vector_dimension(),
            max_embed_chars: default_max_embed_chars(),
        }
    }
}

const fn default_vector_dimension() -> usize {
    768
}

const fn default_max_embed_chars() -> usize {
    5_000
}

/// Run pipeline defaults that affect intake and the harvest stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Provider trigger calls allowed per run unless intake overrides it.
    #[serde(default = "default_max_provider_calls")]
    pub default_max_provider_calls: u32,
    /// Additional profile scrapes attempted after a name search.
    #[serde(default = "default_profile_fanout_limit")]
    pub profile_fanout_limit: u32,
    /// Worker threads used by the extract stage.
    #[serde(default = "default_extract_parallelism")]
    pub extract_parallelism: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            default_max_provider_calls: default_max_provider_calls(),
            profile_fanout_limit: default_profile_fanout_limit(),
            extract_parallelism: default_extract_parallelism(),
        }
    }
}

const fn default_max_provider_calls() -> u32 {
    10
}

const fn default_profile_fanout_limit() -> u32 {
    5
}

const fn default_extract_parallelism() -> u32 {
    4
}

/// Standard relative path to the config file (resolved per OS at runtime).
pub const CONFIG_FILE_NAME: &str = "config.toml";

use anyhow::{Context, Result};
use directories::BaseDirs;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Returns the root directory where Dossier stores data.
///
/// Order of precedence:
/// 1. `DOSSIER_HOME` environment variable.
/// 2. OS-specific data directory via `directories::BaseDirs`.
pub fn workspace_root() -> Result<PathBuf> {
    if let Ok(path) = env::var("DOSSIER_HOME") {
        return Ok(PathBuf::from(path));
    }
    let base_dirs = BaseDirs::new().context("Unable to determine OS data directory")?;
    Ok(base_dirs.data_dir().join("Dossier"))
}

/// Returns the config directory under the workspace root.
pub fn config_dir() -> Result<PathBuf> {
    let root = workspace_root()?;
    Ok(root.join("config"))
}

/// Path to the config file.
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Loads the configuration from disk or returns defaults.
pub fn load_or_default() -> Result<AppConfig> {
    let path = config_file_path()?;
    if path.exists() {
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let cfg: AppConfig = toml::from_str(&data)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        Ok(cfg)
    } else {
        Ok(AppConfig::default())
    }
}

/// Persists the configuration to disk.
pub fn save(config: &AppConfig) -> Result<()> {
    let dir = config_dir()?;
    fs::create_dir_all(&dir)?;
    let path = config_file_path()?;
    let data = toml::to_string_pretty(config)?;
    fs::write(&path, data)?;
    Ok(())
}

/// Ensures the workspace structure exists (runs/ and vector/ directories).
pub fn ensure_workspace_structure() -> Result<WorkspacePaths> {
    let root = workspace_root()?;
    let runs_dir = root.join("runs");
    let vector_dir = root.join("vector");
    fs::create_dir_all(&runs_dir)?;
    fs::create_dir_all(&vector_dir)?;
    Ok(WorkspacePaths {
        root,
        runs_dir,
        vector_dir,
    })
}

/// Convenience struct exposing important workspace paths.
#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    pub root: PathBuf,
    pub runs_dir: PathBuf,
    pub vector_dir: PathBuf,
}

impl WorkspacePaths {
    pub fn run_dir(&self, run_id: &uuid::Uuid) -> PathBuf {
        self.runs_dir.join(run_id.to_string())
    }
}
