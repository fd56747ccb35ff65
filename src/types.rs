use std::fs;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Environment variables consulted, in order, for the completion endpoint credential.
pub const API_KEY_ENV_VARS: [&str; 2] = ["API_KEY", "OPENAI_API_KEY"];

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection URL, e.g. `sqlite://trades.db`.
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Rows inserted by the generator when the server starts. Zero skips seeding.
    #[serde(default = "default_seed_records")]
    pub seed_records: usize,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            seed_records: default_seed_records(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Normally empty in the file and filled from the environment.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Extra attempts on transport errors and 5xx responses.
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

// Hand-written so the credential never ends up in logs.
impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_model(),
            api_key: None,
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: default_max_tokens(),
            max_retries: 0,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PromptsConfig {
    /// JSON document holding the SQL generation instruction. The built-in
    /// instruction is used when unset.
    #[serde(default)]
    pub sql_prompt_path: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Ask the endpoint to phrase the raw rows as an answer.
    #[serde(default = "default_true")]
    pub format_response: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            format_response: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Period of the metrics log line. Zero disables it.
    #[serde(default)]
    pub metrics_log_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            metrics_log_secs: 0,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl AppConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file at {path}"))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("failed to deserialize TOML config at {path}"))
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let cfg: Self = toml::from_str(contents)?;
        Ok(cfg)
    }

    /// Fill the API credential from the process environment. An environment
    /// value wins over the file.
    pub fn apply_env(&mut self) {
        let from_env = API_KEY_ENV_VARS
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|v| !v.trim().is_empty());
        if let Some(key) = from_env {
            self.llm.api_key = Some(key);
        }
    }
}

fn default_database_url() -> String {
    "sqlite://trades.db".to_string()
}

fn default_seed_records() -> usize {
    10
}

fn default_max_connections() -> u32 {
    4
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    1.0
}

fn default_max_tokens() -> u32 {
    256
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_bind_addr() -> String {
    "127.0.0.1:7860".to_string()
}

fn default_true() -> bool {
    true
}
