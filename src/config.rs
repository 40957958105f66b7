//! Configuration loading with env-var overrides.
//!
//! Reads a TOML file (default `config/default.toml`), fills in serde defaults,
//! then applies environment overrides. Secrets never live in the file: the
//! Neo4j password and API keys are read from the environment only
//! (`NEO4J_PASSWORD`, `LLM_API_KEY`, `EMBEDDING_API_KEY`), typically loaded
//! from `.env` by the binary before config resolution.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::AppError;

// ── Sections ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct AssistantConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_graph_uri")]
    pub uri: String,
    #[serde(default = "default_graph_user")]
    pub user: String,
    #[serde(default = "default_graph_database")]
    pub database: String,
    /// Filled from `NEO4J_PASSWORD`; never deserialized from the file.
    #[serde(skip)]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "default_layout_url")]
    pub api_url: String,
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,
    #[serde(default = "default_loaded_dir")]
    pub loaded_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_url")]
    pub api_base_url: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    /// Rebuild the HTTP client every N processed items — the hosted embedding
    /// endpoint drops very long-lived connections.
    #[serde(default = "default_refresh_every")]
    pub refresh_every: usize,
    #[serde(default = "default_index_name")]
    pub index_name: String,
    #[serde(skip)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_chat_url")]
    pub api_base_url: String,
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Number of chunks retrieved per question in RAG mode.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(skip)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportsConfig {
    #[serde(default = "default_reports_dir")]
    pub dir: PathBuf,
}

// ── Top level ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_assistant")]
    pub assistant: AssistantConfig,
    #[serde(default = "default_graph")]
    pub graph: GraphConfig,
    #[serde(default = "default_layout")]
    pub layout: LayoutConfig,
    #[serde(default = "default_embedding")]
    pub embedding: EmbeddingConfig,
    #[serde(default = "default_chat")]
    pub chat: ChatConfig,
    #[serde(default = "default_reports")]
    pub reports: ReportsConfig,
}

impl Config {
    /// Load config from `path`, or `config/default.toml` when present, or
    /// built-in defaults otherwise. Environment overrides and secrets are
    /// applied in all three cases.
    pub fn load(path: Option<&str>) -> Result<Self, AppError> {
        let mut config = match path {
            Some(p) => Self::from_file(Path::new(p))?,
            None => {
                let default_path = Path::new("config/default.toml");
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::builtin_default()
                }
            }
        };
        config.apply_env();
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, AppError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str(&raw)
            .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))
    }

    fn builtin_default() -> Self {
        Self {
            assistant: default_assistant(),
            graph: default_graph(),
            layout: default_layout(),
            embedding: default_embedding(),
            chat: default_chat(),
            reports: default_reports(),
        }
    }

    /// Apply environment overrides: `LEXGRAF_LOG_LEVEL` beats the file value,
    /// and secrets are pulled from their dedicated variables.
    fn apply_env(&mut self) {
        if let Ok(level) = env::var("LEXGRAF_LOG_LEVEL") {
            self.assistant.log_level = level;
        }
        if let Ok(password) = env::var("NEO4J_PASSWORD") {
            self.graph.password = password;
        }
        self.chat.api_key = env::var("LLM_API_KEY").ok();
        self.embedding.api_key = env::var("EMBEDDING_API_KEY").ok();
    }

    /// Expand a leading `~` in the configured directories.
    pub fn expand_dirs(&mut self) {
        self.layout.input_dir = expand_home(&self.layout.input_dir);
        self.layout.loaded_dir = expand_home(&self.layout.loaded_dir);
        self.reports.dir = expand_home(&self.reports.dir);
    }
}

fn expand_home(path: &Path) -> PathBuf {
    let Some(s) = path.to_str() else {
        return path.to_path_buf();
    };
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_name() -> String {
    "lexgraf".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_graph_uri() -> String {
    "bolt://127.0.0.1:7687".to_string()
}
fn default_graph_user() -> String {
    "neo4j".to_string()
}
fn default_graph_database() -> String {
    "neo4j".to_string()
}
fn default_layout_url() -> String {
    "https://readers.llmsherpa.com/api/document/developer/parseDocument?renderFormat=all"
        .to_string()
}
fn default_input_dir() -> PathBuf {
    PathBuf::from("newdata")
}
fn default_loaded_dir() -> PathBuf {
    PathBuf::from("dataloaded")
}
fn default_embedding_url() -> String {
    "http://127.0.0.1:8080/v1/embeddings".to_string()
}
fn default_embedding_model() -> String {
    "all-MiniLM-L6-v2".to_string()
}
fn default_dimension() -> usize {
    384
}
fn default_refresh_every() -> usize {
    30
}
fn default_index_name() -> String {
    "chunkVectorIndex".to_string()
}
fn default_chat_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}
fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_timeout_seconds() -> u64 {
    60
}
fn default_top_k() -> usize {
    2
}
fn default_reports_dir() -> PathBuf {
    PathBuf::from("dashboard-data")
}

fn default_assistant() -> AssistantConfig {
    AssistantConfig {
        name: default_name(),
        log_level: default_log_level(),
    }
}
fn default_graph() -> GraphConfig {
    GraphConfig {
        uri: default_graph_uri(),
        user: default_graph_user(),
        database: default_graph_database(),
        password: String::new(),
    }
}
fn default_layout() -> LayoutConfig {
    LayoutConfig {
        api_url: default_layout_url(),
        input_dir: default_input_dir(),
        loaded_dir: default_loaded_dir(),
    }
}
fn default_embedding() -> EmbeddingConfig {
    EmbeddingConfig {
        api_base_url: default_embedding_url(),
        model: default_embedding_model(),
        dimension: default_dimension(),
        refresh_every: default_refresh_every(),
        index_name: default_index_name(),
        api_key: None,
    }
}
fn default_chat() -> ChatConfig {
    ChatConfig {
        api_base_url: default_chat_url(),
        model: default_chat_model(),
        temperature: default_temperature(),
        timeout_seconds: default_timeout_seconds(),
        top_k: default_top_k(),
        api_key: None,
    }
}
fn default_reports() -> ReportsConfig {
    ReportsConfig {
        dir: default_reports_dir(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn builtin_defaults_are_sane() {
        let config = Config::builtin_default();
        assert_eq!(config.embedding.dimension, 384);
        assert_eq!(config.embedding.refresh_every, 30);
        assert_eq!(config.embedding.index_name, "chunkVectorIndex");
        assert_eq!(config.chat.top_k, 2);
        assert_eq!(config.graph.user, "neo4j");
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(
            file,
            r#"
[graph]
uri = "bolt://graph.example:7687"

[chat]
model = "gpt-4"
top_k = 5
"#
        )
        .expect("write toml");

        let config =
            Config::from_file(file.path()).expect("load config");
        assert_eq!(config.graph.uri, "bolt://graph.example:7687");
        assert_eq!(config.chat.model, "gpt-4");
        assert_eq!(config.chat.top_k, 5);
        // Untouched sections keep their defaults.
        assert_eq!(config.embedding.dimension, 384);
        assert_eq!(config.layout.input_dir, PathBuf::from("newdata"));
    }

    #[test]
    fn missing_file_errors() {
        let err = Config::from_file(Path::new("/nonexistent/lexgraf.toml"));
        assert!(matches!(err, Err(AppError::Config(_))));
    }

    #[test]
    fn password_never_comes_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "[graph]\nuri = \"bolt://h:7687\"").expect("write toml");
        let config = Config::from_file(file.path()).expect("load config");
        assert!(config.graph.password.is_empty());
    }
}
