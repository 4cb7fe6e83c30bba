use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::closing::{ClosingVocabulary, DEFAULT_CLOSING_PHRASES};
use crate::errors::DomainError;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub notion: NotionConfig,
    pub knowledge: KnowledgeConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub model: String,
    pub dimensions: usize,
}

#[derive(Clone, Debug)]
pub struct NotionConfig {
    pub api_key: Option<SecretString>,
    pub database_id: Option<String>,
    pub base_url: String,
    pub api_version: String,
    pub timeout_secs: u64,
    pub title_property: String,
    pub summary_property: String,
    pub date_property: String,
}

#[derive(Clone, Debug)]
pub struct KnowledgeConfig {
    pub index_dir: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub recursion_limit: usize,
    pub closing_phrases: Option<Vec<String>>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProvider {
    Gemini,
    Hashing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_model: Option<String>,
    pub llm_base_url: Option<String>,
    pub embedding_provider: Option<EmbeddingProvider>,
    pub notion_api_key: Option<String>,
    pub notion_database_id: Option<String>,
    pub notion_base_url: Option<String>,
    pub index_dir: Option<PathBuf>,
    pub recursion_limit: Option<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl SessionConfig {
    /// The shared closing vocabulary, from the configured phrases or the built-in list.
    pub fn closing_vocabulary(&self) -> Result<ClosingVocabulary, DomainError> {
        match &self.closing_phrases {
            Some(phrases) => ClosingVocabulary::new(phrases),
            None => ClosingVocabulary::new(DEFAULT_CLOSING_PHRASES),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                api_key: None,
                base_url: "https://generativelanguage.googleapis.com".to_string(),
                model: "gemini-2.5-flash".to_string(),
                temperature: 0.0,
                timeout_secs: 60,
            },
            embedding: EmbeddingConfig {
                provider: EmbeddingProvider::Gemini,
                model: "text-embedding-004".to_string(),
                dimensions: 256,
            },
            notion: NotionConfig {
                api_key: None,
                database_id: None,
                base_url: "https://api.notion.com".to_string(),
                api_version: "2022-06-28".to_string(),
                timeout_secs: 30,
                title_property: "Consulta".to_string(),
                summary_property: "Resumen".to_string(),
                date_property: "Fecha".to_string(),
            },
            knowledge: KnowledgeConfig {
                index_dir: PathBuf::from(".delicia/index"),
                chunk_size: 500,
                chunk_overlap: 100,
                top_k: 3,
            },
            session: SessionConfig { recursion_limit: 25, closing_phrases: None },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "hashing" => Ok(Self::Hashing),
            other => Err(ConfigError::Validation(format!(
                "unsupported embedding provider `{other}` (expected gemini|hashing)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("delicia.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// The chat model cannot be reached without a key; callers that talk to it ask here.
    pub fn require_llm_api_key(&self) -> Result<&SecretString, ConfigError> {
        self.llm.api_key.as_ref().filter(|key| !key.expose_secret().trim().is_empty()).ok_or_else(
            || {
                ConfigError::Validation(
                    "llm.api_key is required (set DELICIA_LLM_API_KEY or GEMINI_API_KEY)"
                        .to_string(),
                )
            },
        )
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(embedding) = patch.embedding {
            if let Some(provider) = embedding.provider {
                self.embedding.provider = provider;
            }
            if let Some(model) = embedding.model {
                self.embedding.model = model;
            }
            if let Some(dimensions) = embedding.dimensions {
                self.embedding.dimensions = dimensions;
            }
        }

        if let Some(notion) = patch.notion {
            if let Some(notion_api_key_value) = notion.api_key {
                self.notion.api_key = Some(secret_value(notion_api_key_value));
            }
            if let Some(database_id) = notion.database_id {
                self.notion.database_id = Some(database_id);
            }
            if let Some(base_url) = notion.base_url {
                self.notion.base_url = base_url;
            }
            if let Some(api_version) = notion.api_version {
                self.notion.api_version = api_version;
            }
            if let Some(timeout_secs) = notion.timeout_secs {
                self.notion.timeout_secs = timeout_secs;
            }
            if let Some(title_property) = notion.title_property {
                self.notion.title_property = title_property;
            }
            if let Some(summary_property) = notion.summary_property {
                self.notion.summary_property = summary_property;
            }
            if let Some(date_property) = notion.date_property {
                self.notion.date_property = date_property;
            }
        }

        if let Some(knowledge) = patch.knowledge {
            if let Some(index_dir) = knowledge.index_dir {
                self.knowledge.index_dir = index_dir;
            }
            if let Some(chunk_size) = knowledge.chunk_size {
                self.knowledge.chunk_size = chunk_size;
            }
            if let Some(chunk_overlap) = knowledge.chunk_overlap {
                self.knowledge.chunk_overlap = chunk_overlap;
            }
            if let Some(top_k) = knowledge.top_k {
                self.knowledge.top_k = top_k;
            }
        }

        if let Some(session) = patch.session {
            if let Some(recursion_limit) = session.recursion_limit {
                self.session.recursion_limit = recursion_limit;
            }
            if let Some(closing_phrases) = session.closing_phrases {
                self.session.closing_phrases = Some(closing_phrases);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let llm_api_key = read_env("DELICIA_LLM_API_KEY").or_else(|| read_env("GEMINI_API_KEY"));
        if let Some(value) = llm_api_key {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("DELICIA_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("DELICIA_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("DELICIA_LLM_TEMPERATURE") {
            self.llm.temperature = parse_f32("DELICIA_LLM_TEMPERATURE", &value)?;
        }
        if let Some(value) = read_env("DELICIA_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("DELICIA_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("DELICIA_EMBEDDING_PROVIDER") {
            self.embedding.provider = value.parse()?;
        }
        if let Some(value) = read_env("DELICIA_EMBEDDING_MODEL") {
            self.embedding.model = value;
        }
        if let Some(value) = read_env("DELICIA_EMBEDDING_DIMENSIONS") {
            self.embedding.dimensions = parse_usize("DELICIA_EMBEDDING_DIMENSIONS", &value)?;
        }

        let notion_api_key =
            read_env("DELICIA_NOTION_API_KEY").or_else(|| read_env("NOTION_API_KEY"));
        if let Some(value) = notion_api_key {
            self.notion.api_key = Some(secret_value(value));
        }
        let notion_database_id =
            read_env("DELICIA_NOTION_DATABASE_ID").or_else(|| read_env("NOTION_DATABASE_ID"));
        if let Some(value) = notion_database_id {
            self.notion.database_id = Some(value);
        }
        if let Some(value) = read_env("DELICIA_NOTION_BASE_URL") {
            self.notion.base_url = value;
        }
        if let Some(value) = read_env("DELICIA_NOTION_API_VERSION") {
            self.notion.api_version = value;
        }
        if let Some(value) = read_env("DELICIA_NOTION_TIMEOUT_SECS") {
            self.notion.timeout_secs = parse_u64("DELICIA_NOTION_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("DELICIA_KNOWLEDGE_INDEX_DIR") {
            self.knowledge.index_dir = PathBuf::from(value);
        }
        if let Some(value) = read_env("DELICIA_KNOWLEDGE_CHUNK_SIZE") {
            self.knowledge.chunk_size = parse_usize("DELICIA_KNOWLEDGE_CHUNK_SIZE", &value)?;
        }
        if let Some(value) = read_env("DELICIA_KNOWLEDGE_CHUNK_OVERLAP") {
            self.knowledge.chunk_overlap = parse_usize("DELICIA_KNOWLEDGE_CHUNK_OVERLAP", &value)?;
        }
        if let Some(value) = read_env("DELICIA_KNOWLEDGE_TOP_K") {
            self.knowledge.top_k = parse_usize("DELICIA_KNOWLEDGE_TOP_K", &value)?;
        }

        if let Some(value) = read_env("DELICIA_SESSION_RECURSION_LIMIT") {
            self.session.recursion_limit =
                parse_usize("DELICIA_SESSION_RECURSION_LIMIT", &value)?;
        }
        if let Some(value) = read_env("DELICIA_SESSION_CLOSING_PHRASES") {
            let phrases = value
                .split(',')
                .map(str::trim)
                .filter(|phrase| !phrase.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>();
            self.session.closing_phrases = Some(phrases);
        }

        let log_level =
            read_env("DELICIA_LOGGING_LEVEL").or_else(|| read_env("DELICIA_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("DELICIA_LOGGING_FORMAT").or_else(|| read_env("DELICIA_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = llm_base_url;
        }
        if let Some(embedding_provider) = overrides.embedding_provider {
            self.embedding.provider = embedding_provider;
        }
        if let Some(notion_api_key) = overrides.notion_api_key {
            self.notion.api_key = Some(secret_value(notion_api_key));
        }
        if let Some(notion_database_id) = overrides.notion_database_id {
            self.notion.database_id = Some(notion_database_id);
        }
        if let Some(notion_base_url) = overrides.notion_base_url {
            self.notion.base_url = notion_base_url;
        }
        if let Some(index_dir) = overrides.index_dir {
            self.knowledge.index_dir = index_dir;
        }
        if let Some(recursion_limit) = overrides.recursion_limit {
            self.session.recursion_limit = recursion_limit;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_embedding(&self.embedding)?;
        validate_notion(&self.notion)?;
        validate_knowledge(&self.knowledge)?;
        validate_session(&self.session)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("delicia.toml"), PathBuf::from("config/delicia.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation(
            "llm.temperature must be in range 0.0..=2.0".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if !is_http_url(&llm.base_url) {
        return Err(ConfigError::Validation(
            "llm.base_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_embedding(embedding: &EmbeddingConfig) -> Result<(), ConfigError> {
    match embedding.provider {
        EmbeddingProvider::Gemini => {
            if embedding.model.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "embedding.model is required for the gemini provider".to_string(),
                ));
            }
        }
        EmbeddingProvider::Hashing => {
            if embedding.dimensions == 0 {
                return Err(ConfigError::Validation(
                    "embedding.dimensions must be greater than zero".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn validate_notion(notion: &NotionConfig) -> Result<(), ConfigError> {
    // Missing credentials are tolerated here; the report tool answers with an error text.
    if !is_http_url(&notion.base_url) {
        return Err(ConfigError::Validation(
            "notion.base_url must start with http:// or https://".to_string(),
        ));
    }

    if notion.timeout_secs == 0 || notion.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "notion.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    let property_names = [&notion.title_property, &notion.summary_property, &notion.date_property];
    if property_names.iter().any(|name| name.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "notion property names (title/summary/date) must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_knowledge(knowledge: &KnowledgeConfig) -> Result<(), ConfigError> {
    if knowledge.index_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation("knowledge.index_dir must not be empty".to_string()));
    }

    if knowledge.chunk_size == 0 {
        return Err(ConfigError::Validation(
            "knowledge.chunk_size must be greater than zero".to_string(),
        ));
    }

    if knowledge.chunk_overlap >= knowledge.chunk_size {
        return Err(ConfigError::Validation(
            "knowledge.chunk_overlap must be smaller than knowledge.chunk_size".to_string(),
        ));
    }

    if knowledge.top_k == 0 {
        return Err(ConfigError::Validation(
            "knowledge.top_k must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_session(session: &SessionConfig) -> Result<(), ConfigError> {
    if session.recursion_limit == 0 {
        return Err(ConfigError::Validation(
            "session.recursion_limit must be greater than zero".to_string(),
        ));
    }

    if let Some(phrases) = &session.closing_phrases {
        if phrases.is_empty() || phrases.iter().any(|phrase| phrase.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "session.closing_phrases must list at least one non-blank phrase".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.parse::<f32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    embedding: Option<EmbeddingPatch>,
    notion: Option<NotionPatch>,
    knowledge: Option<KnowledgePatch>,
    session: Option<SessionPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct EmbeddingPatch {
    provider: Option<EmbeddingProvider>,
    model: Option<String>,
    dimensions: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct NotionPatch {
    api_key: Option<String>,
    database_id: Option<String>,
    base_url: Option<String>,
    api_version: Option<String>,
    timeout_secs: Option<u64>,
    title_property: Option<String>,
    summary_property: Option<String>,
    date_property: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct KnowledgePatch {
    index_dir: Option<PathBuf>,
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
    top_k: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionPatch {
    recursion_limit: Option<usize>,
    closing_phrases: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
