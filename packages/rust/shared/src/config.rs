//! Application configuration for AnswerForge.
//!
//! User config lives at `~/.answerforge/answerforge.toml`.
//! CLI flags override config file values, which override defaults.
//! API keys are never stored in the file; config names the env vars
//! that hold them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AnswerForgeError, Result};
use crate::personas::PersonaDefinition;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "answerforge.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".answerforge";

// ---------------------------------------------------------------------------
// Config structs (matching answerforge.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Pipeline defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Chat-completions endpoint settings.
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Google Custom Search settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Extra personas merged into the built-in registry.
    #[serde(default)]
    pub personas: Vec<PersonaDefinition>,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Default dataset file to process.
    #[serde(default = "default_dataset_path")]
    pub dataset_path: String,

    /// Default canonical output file.
    #[serde(default = "default_output_path")]
    pub output_path: String,

    /// Default persona key.
    #[serde(default = "default_persona")]
    pub persona: String,

    /// Flush the accumulator to the checkpoint file every N processed records.
    #[serde(default = "default_checkpoint_every")]
    pub checkpoint_every: usize,

    /// Pause between records, in milliseconds.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            dataset_path: default_dataset_path(),
            output_path: default_output_path(),
            persona: default_persona(),
            checkpoint_every: default_checkpoint_every(),
            request_delay_ms: default_request_delay_ms(),
        }
    }
}

fn default_dataset_path() -> String {
    "dataset/questions.csv".into()
}
fn default_output_path() -> String {
    "output/answers.jsonl".into()
}
fn default_persona() -> String {
    "default".into()
}
fn default_checkpoint_every() -> usize {
    50
}
fn default_request_delay_ms() -> u64 {
    1000
}

/// `[completion]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_completion_key_env")]
    pub api_key_env: String,

    /// OpenAI-compatible base URL; `/chat/completions` is appended.
    #[serde(default = "default_completion_base_url")]
    pub base_url: String,

    /// Model identifier sent with every request.
    #[serde(default = "default_completion_model")]
    pub model: String,

    /// Output length bound per completion.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Wall-clock bound per completion request, in seconds.
    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_completion_key_env(),
            base_url: default_completion_base_url(),
            model: default_completion_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_completion_timeout_secs(),
        }
    }
}

impl CompletionConfig {
    /// Request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_completion_key_env() -> String {
    "QWEN_AI_KEY".into()
}
fn default_completion_base_url() -> String {
    "https://dashscope.aliyuncs.com/compatible-mode/v1".into()
}
fn default_completion_model() -> String {
    "qwen-plus".into()
}
fn default_max_tokens() -> u32 {
    2000
}
fn default_temperature() -> f32 {
    0.7
}
fn default_completion_timeout_secs() -> u64 {
    60
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Name of the env var holding the API key.
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,

    /// Name of the env var holding the custom search engine id.
    #[serde(default = "default_search_engine_env")]
    pub engine_id_env: String,

    /// Search API endpoint.
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    /// Wall-clock bound per search request, in seconds.
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_search_key_env(),
            engine_id_env: default_search_engine_env(),
            endpoint: default_search_endpoint(),
            timeout_secs: default_search_timeout_secs(),
        }
    }
}

impl SearchConfig {
    /// Request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_search_key_env() -> String {
    "GOOGLE_SEARCH_KEY".into()
}
fn default_search_engine_env() -> String {
    "GOOGLE_SEARCH_CX".into()
}
fn default_search_endpoint() -> String {
    "https://www.googleapis.com/customsearch/v1".into()
}
fn default_search_timeout_secs() -> u64 {
    10
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.answerforge/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| AnswerForgeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.answerforge/answerforge.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| AnswerForgeError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        AnswerForgeError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| AnswerForgeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| AnswerForgeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| AnswerForgeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the completion API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.completion.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(AnswerForgeError::config(format!(
            "completion API key not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Read the search credentials, if both env vars are set.
///
/// Returns `None` when either var is missing; the pipeline then runs
/// without enrichment rather than failing.
pub fn search_credentials(config: &AppConfig) -> Option<(String, String)> {
    let key = std::env::var(&config.search.api_key_env).ok().filter(|v| !v.is_empty())?;
    let cx = std::env::var(&config.search.engine_id_env).ok().filter(|v| !v.is_empty())?;
    Some((key, cx))
}
