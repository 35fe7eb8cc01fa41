//! Configuration for the FAQ chatbot
//!
//! Values come from (lowest to highest precedence) the built-in defaults, a
//! TOML file, and environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::providers::llm::HarmBlockThreshold;

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "FAQ_RAG_CONFIG";

/// Main chatbot configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChatConfig {
    /// Conversation mode (rag or chat)
    #[serde(default)]
    pub mode: ChatMode,
    /// Generation model configuration
    #[serde(default)]
    pub generation: GenerationConfig,
    /// Warehouse (BigQuery) configuration
    #[serde(default)]
    pub warehouse: WarehouseConfig,
    /// Vector search configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Safety configuration
    #[serde(default)]
    pub safety: SafetyConfig,
    /// Console conversation configuration
    #[serde(default)]
    pub conversation: ConversationConfig,
    /// HTTP client configuration
    #[serde(default)]
    pub http: HttpConfig,
}

/// How each turn is answered
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    /// Retrieve context from the warehouse, then generate
    #[default]
    Rag,
    /// Send the running conversation history, no retrieval
    Chat,
}

impl std::str::FromStr for ChatMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "rag" => Ok(Self::Rag),
            "chat" => Ok(Self::Chat),
            other => Err(Error::config(format!("Unknown chat mode: {}", other))),
        }
    }
}

/// Which API the generation model is reached through
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GenerationBackend {
    /// Gemini developer API, authenticated with an API key
    #[default]
    Gemini,
    /// Vertex AI, authenticated with the warehouse service account
    Vertex,
}

/// Generation model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default)]
    pub backend: GenerationBackend,
    /// API key for the Gemini developer API (usually from `GEMINI_API_KEY`)
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Model identifier
    #[serde(default = "default_generation_model")]
    pub model: String,
    /// Vertex AI region (vertex backend only)
    #[serde(default = "default_vertex_location")]
    pub location: String,
    /// Fixed instruction placed at the top of every prompt
    #[serde(default = "default_system_instruction")]
    pub system_instruction: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            backend: GenerationBackend::default(),
            api_key: None,
            model: default_generation_model(),
            location: default_vertex_location(),
            system_instruction: default_system_instruction(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

fn default_generation_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_vertex_location() -> String {
    "us-central1".to_string()
}

fn default_system_instruction() -> String {
    "You are a helpful, professional assistant answering questions from a curated FAQ. \
     Provide accurate, concise answers based only on the provided context. \
     If the context does not contain the answer, say \"Sorry, I don't have that information.\""
        .to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_top_p() -> f32 {
    0.9
}

fn default_max_output_tokens() -> u32 {
    1024
}

/// Warehouse (BigQuery) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    /// GCP project that owns the dataset and is billed for queries
    #[serde(default)]
    pub project_id: Option<String>,
    /// Dataset location (e.g. "US"); left to BigQuery when unset
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default = "default_dataset")]
    pub dataset: String,
    /// Table holding the embedded FAQ rows
    #[serde(default = "default_embedded_table")]
    pub embedded_table: String,
    /// Remote embedding model registered in the dataset
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    /// Column holding the stored embedding vectors
    #[serde(default = "default_embedding_column")]
    pub embedding_column: String,
    /// Column returned as the retrieved context
    #[serde(default = "default_content_column")]
    pub content_column: String,
    /// Service account JSON key (usually from `GOOGLE_APPLICATION_CREDENTIALS`)
    #[serde(default)]
    pub service_account_key_path: Option<PathBuf>,
    /// Pre-issued OAuth access token, used instead of a service account
    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,
    /// Server-side wait for query completion, in milliseconds
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            location: None,
            dataset: default_dataset(),
            embedded_table: default_embedded_table(),
            embedding_model: default_embedding_model(),
            embedding_column: default_embedding_column(),
            content_column: default_content_column(),
            service_account_key_path: None,
            access_token: None,
            query_timeout_ms: default_query_timeout_ms(),
        }
    }
}

impl WarehouseConfig {
    /// Project id, or a configuration error when unset
    pub fn require_project_id(&self) -> Result<&str> {
        self.project_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                Error::config("warehouse.project_id is not set (or GOOGLE_CLOUD_PROJECT)")
            })
    }

    /// Fully qualified embedded table id: `project.dataset.table`
    pub fn embedded_table_id(&self) -> Result<String> {
        Ok(format!(
            "{}.{}.{}",
            self.require_project_id()?,
            self.dataset,
            self.embedded_table
        ))
    }

    /// Reject names that cannot be spliced into SQL as identifiers
    ///
    /// The project is only checked when set.
    pub fn check_identifiers(&self) -> Result<()> {
        if let Some(project) = self.project_id.as_deref().filter(|p| !p.trim().is_empty()) {
            check_segment("warehouse.project_id", project)?;
        }
        check_segment("warehouse.dataset", &self.dataset)?;
        check_segment("warehouse.embedded_table", &self.embedded_table)?;
        check_segment("warehouse.embedding_model", &self.embedding_model)?;
        check_column("warehouse.embedding_column", &self.embedding_column)?;
        check_column("warehouse.content_column", &self.content_column)
    }

    /// Fully qualified embedding model id: `project.dataset.model`
    pub fn embedding_model_id(&self) -> Result<String> {
        Ok(format!(
            "{}.{}.{}",
            self.require_project_id()?,
            self.dataset,
            self.embedding_model
        ))
    }
}

/// One part of `project.dataset.object`: letters, digits, `_`, `-`
fn check_segment(field: &str, value: &str) -> Result<()> {
    let valid = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(Error::config(format!("Invalid {}: {}", field, value)))
    }
}

fn check_column(field: &str, value: &str) -> Result<()> {
    let valid = !value.is_empty()
        && !value.starts_with(|c: char| c.is_ascii_digit())
        && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::config(format!("Invalid {}: {}", field, value)))
    }
}

fn default_dataset() -> String {
    "faq".to_string()
}

fn default_embedded_table() -> String {
    "question_answer_embedded".to_string()
}

fn default_embedding_model() -> String {
    "Embeddings".to_string()
}

fn default_embedding_column() -> String {
    "ml_generate_embedding_result".to_string()
}

fn default_content_column() -> String {
    "content".to_string()
}

fn default_query_timeout_ms() -> u64 {
    30_000
}

/// What to do when retrieval yields no context
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmptyContextPolicy {
    /// Skip generation and reply with the "no information" message
    #[default]
    Skip,
    /// Ask the model anyway, instructing it to admit it does not know
    AskModel,
}

/// Vector search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of nearest rows to request
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// `fraction_lists_to_search` option passed to VECTOR_SEARCH
    #[serde(default = "default_fraction_lists_to_search")]
    pub fraction_lists_to_search: f32,
    /// Maximum accepted distance; no filter when unset
    #[serde(default)]
    pub similarity_threshold: Option<f32>,
    #[serde(default)]
    pub empty_context: EmptyContextPolicy,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            fraction_lists_to_search: default_fraction_lists_to_search(),
            similarity_threshold: None,
            empty_context: EmptyContextPolicy::default(),
        }
    }
}

fn default_top_k() -> usize {
    1
}

fn default_fraction_lists_to_search() -> f32 {
    0.01
}

/// Safety configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// Threshold applied to every harm category
    #[serde(default = "default_harm_threshold")]
    pub threshold: HarmBlockThreshold,
    /// Classify each utterance as SAFE/UNSAFE before answering
    #[serde(default)]
    pub screen_prompts: bool,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            threshold: default_harm_threshold(),
            screen_prompts: false,
        }
    }
}

fn default_harm_threshold() -> HarmBlockThreshold {
    HarmBlockThreshold::BlockMediumAndAbove
}

/// Console conversation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Label printed in front of every reply
    #[serde(default = "default_bot_label")]
    pub bot_label: String,
    /// Most recent messages sent per call in chat mode (system entry excluded)
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            bot_label: default_bot_label(),
            history_window: default_history_window(),
        }
    }
}

fn default_bot_label() -> String {
    "Assistant".to_string()
}

fn default_history_window() -> usize {
    20
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    60
}

impl ChatConfig {
    /// Load configuration from an explicit path, `$FAQ_RAG_CONFIG`, or the
    /// default location, then apply environment overrides.
    ///
    /// A missing default file is not an error; a missing explicit file is.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// `<config dir>/faq-rag/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("faq-rag").join("config.toml"))
    }

    /// Apply environment overrides through a lookup function
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("GEMINI_API_KEY").or_else(|| non_empty("GOOGLE_API_KEY")) {
            self.generation.api_key = Some(key);
        }
        if let Some(project) = non_empty("GOOGLE_CLOUD_PROJECT") {
            self.warehouse.project_id = Some(project);
        }
        if let Some(path) = non_empty("GOOGLE_APPLICATION_CREDENTIALS") {
            self.warehouse.service_account_key_path = Some(PathBuf::from(path));
        }
        if let Some(token) = non_empty("BIGQUERY_ACCESS_TOKEN") {
            self.warehouse.access_token = Some(token);
        }
    }

    /// Check ranges and required fields
    pub fn validate(&self) -> Result<()> {
        if self.generation.model.trim().is_empty() {
            return Err(Error::config("generation.model must not be empty"));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::config("retrieval.top_k must be at least 1"));
        }
        let fraction = self.retrieval.fraction_lists_to_search;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(Error::config(format!(
                "retrieval.fraction_lists_to_search must be in (0, 1], got {}",
                fraction
            )));
        }
        if let Some(threshold) = self.retrieval.similarity_threshold {
            if !threshold.is_finite() || threshold < 0.0 {
                return Err(Error::config(format!(
                    "retrieval.similarity_threshold must be a finite distance >= 0, got {}",
                    threshold
                )));
            }
        }
        if self.conversation.history_window == 0 {
            return Err(Error::config("conversation.history_window must be at least 1"));
        }
        self.warehouse.check_identifiers()
    }

    /// Whether the warehouse client is needed at all
    pub fn needs_warehouse(&self) -> bool {
        self.mode == ChatMode::Rag
    }

    /// Resolve the Gemini API key: configured/env value first, then `prompt`.
    pub fn resolve_api_key<F>(&self, prompt: F) -> Result<String>
    where
        F: FnOnce() -> Option<String>,
    {
        self.generation
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| prompt().map(|k| k.trim().to_string()).filter(|k| !k.is_empty()))
            .ok_or_else(|| {
                Error::config("No Gemini API key found. Set GEMINI_API_KEY or enter one when prompted.")
            })
    }
}

/// Ask for the API key on the terminal without echoing it
pub fn prompt_for_api_key() -> Option<String> {
    let term = console::Term::stdout();
    if !term.is_term() {
        return None;
    }
    term.write_str("Enter your Gemini API key: ").ok()?;
    term.read_secure_line().ok()
}
