use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use delicia_core::config::AppConfig;
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::load_config;

struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

impl Field {
    fn new(key: &'static str, value: impl Into<String>, env_keys: &'static [&'static str]) -> Self {
        Self { key, value: value.into(), env_keys }
    }
}

pub fn run(config_path: Option<PathBuf>) -> String {
    let config = match load_config(config_path.clone()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path(config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let llm_api_key = redact_secret(config.llm.api_key.as_ref().map(|key| key.expose_secret()));
    let notion_api_key =
        redact_secret(config.notion.api_key.as_ref().map(|key| key.expose_secret()));
    let notion_database_id = config
        .notion
        .database_id
        .as_deref()
        .map(redact_identifier)
        .unwrap_or_else(|| "<unset>".to_string());
    let closing_phrases = match &config.session.closing_phrases {
        Some(phrases) => phrases.join(", "),
        None => "<built-in>".to_string(),
    };

    vec![
        Field::new("llm.api_key", llm_api_key, &["DELICIA_LLM_API_KEY", "GEMINI_API_KEY"]),
        Field::new("llm.base_url", &config.llm.base_url, &["DELICIA_LLM_BASE_URL"]),
        Field::new("llm.model", &config.llm.model, &["DELICIA_LLM_MODEL"]),
        Field::new(
            "llm.temperature",
            config.llm.temperature.to_string(),
            &["DELICIA_LLM_TEMPERATURE"],
        ),
        Field::new(
            "llm.timeout_secs",
            config.llm.timeout_secs.to_string(),
            &["DELICIA_LLM_TIMEOUT_SECS"],
        ),
        Field::new(
            "embedding.provider",
            format!("{:?}", config.embedding.provider),
            &["DELICIA_EMBEDDING_PROVIDER"],
        ),
        Field::new("embedding.model", &config.embedding.model, &["DELICIA_EMBEDDING_MODEL"]),
        Field::new(
            "embedding.dimensions",
            config.embedding.dimensions.to_string(),
            &["DELICIA_EMBEDDING_DIMENSIONS"],
        ),
        Field::new("notion.api_key", notion_api_key, &["DELICIA_NOTION_API_KEY", "NOTION_API_KEY"]),
        Field::new(
            "notion.database_id",
            notion_database_id,
            &["DELICIA_NOTION_DATABASE_ID", "NOTION_DATABASE_ID"],
        ),
        Field::new("notion.base_url", &config.notion.base_url, &["DELICIA_NOTION_BASE_URL"]),
        Field::new(
            "notion.api_version",
            &config.notion.api_version,
            &["DELICIA_NOTION_API_VERSION"],
        ),
        Field::new(
            "notion.timeout_secs",
            config.notion.timeout_secs.to_string(),
            &["DELICIA_NOTION_TIMEOUT_SECS"],
        ),
        Field::new(
            "knowledge.index_dir",
            config.knowledge.index_dir.display().to_string(),
            &["DELICIA_KNOWLEDGE_INDEX_DIR"],
        ),
        Field::new(
            "knowledge.chunk_size",
            config.knowledge.chunk_size.to_string(),
            &["DELICIA_KNOWLEDGE_CHUNK_SIZE"],
        ),
        Field::new(
            "knowledge.chunk_overlap",
            config.knowledge.chunk_overlap.to_string(),
            &["DELICIA_KNOWLEDGE_CHUNK_OVERLAP"],
        ),
        Field::new(
            "knowledge.top_k",
            config.knowledge.top_k.to_string(),
            &["DELICIA_KNOWLEDGE_TOP_K"],
        ),
        Field::new(
            "session.recursion_limit",
            config.session.recursion_limit.to_string(),
            &["DELICIA_SESSION_RECURSION_LIMIT"],
        ),
        Field::new(
            "session.closing_phrases",
            closing_phrases,
            &["DELICIA_SESSION_CLOSING_PHRASES"],
        ),
        Field::new(
            "logging.level",
            &config.logging.level,
            &["DELICIA_LOGGING_LEVEL", "DELICIA_LOG_LEVEL"],
        ),
        Field::new(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["DELICIA_LOGGING_FORMAT", "DELICIA_LOG_FORMAT"],
        ),
    ]
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    let root = PathBuf::from("delicia.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/delicia.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    let from_env = env_keys.iter().find(|env_key| {
        env::var(env_key).map(|value| !value.trim().is_empty()).unwrap_or(false)
    });
    if let Some(env_key) = from_env {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_secret(secret: Option<&str>) -> String {
    match secret.map(str::trim) {
        None => "<unset>".to_string(),
        Some("") => "<empty>".to_string(),
        Some(_) => "<redacted>".to_string(),
    }
}

fn redact_identifier(identifier: &str) -> String {
    let trimmed = identifier.trim();
    if trimmed.chars().count() <= 4 {
        return "<redacted>".to_string();
    }
    let prefix = trimmed.chars().take(4).collect::<String>();
    format!("{prefix}***")
}
