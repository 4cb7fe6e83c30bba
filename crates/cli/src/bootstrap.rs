use std::sync::Arc;
use std::time::Duration;

use delicia_agent::{
    AgentRuntime, GeminiClient, GeminiSettings, NotionReportSink, Roles, SessionDriver, Toolbox,
};
use delicia_core::config::{AppConfig, ConfigError, EmbeddingProvider};
use delicia_core::errors::DomainError;
use delicia_core::knowledge::restaurant_documents;
use delicia_retrieval::{
    EmbeddingService, GeminiEmbedder, GeminiEmbedderSettings, HashingEmbedder, IndexOrigin,
    KnowledgeBase, RecursiveSplitter, RetrievalError,
};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub index_origin: IndexOrigin,
    pub driver: SessionDriver,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid closing vocabulary: {0}")]
    Vocabulary(#[from] DomainError),
    #[error("knowledge index unavailable: {0}")]
    Knowledge(#[from] RetrievalError),
    #[error("client setup failed: {0}")]
    Client(#[source] anyhow::Error),
}

impl BootstrapError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Config(_) | Self::Vocabulary(_) => "config_validation",
            Self::Knowledge(_) => "knowledge_index",
            Self::Client(_) => "client_setup",
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::Vocabulary(_) => 2,
            Self::Knowledge(_) | Self::Client(_) => 3,
        }
    }
}

pub fn build_embedder(config: &AppConfig) -> Result<Arc<dyn EmbeddingService>, BootstrapError> {
    match config.embedding.provider {
        EmbeddingProvider::Hashing => {
            Ok(Arc::new(HashingEmbedder::new(config.embedding.dimensions)))
        }
        EmbeddingProvider::Gemini => {
            let api_key = config.require_llm_api_key()?.clone();
            let embedder = GeminiEmbedder::new(GeminiEmbedderSettings {
                base_url: config.llm.base_url.clone(),
                model: config.embedding.model.clone(),
                api_key,
                timeout: Duration::from_secs(config.llm.timeout_secs),
            })?;
            Ok(Arc::new(embedder))
        }
    }
}

/// Loads the persisted index or builds it from the restaurant documents.
pub async fn open_knowledge(
    config: &AppConfig,
    rebuild: bool,
) -> Result<(KnowledgeBase, IndexOrigin), BootstrapError> {
    let embedder = build_embedder(config)?;
    let splitter =
        RecursiveSplitter::new(config.knowledge.chunk_size, config.knowledge.chunk_overlap)?;
    let opened = KnowledgeBase::open(
        &restaurant_documents(),
        &splitter,
        embedder,
        &config.knowledge.index_dir,
        rebuild,
    )
    .await?;
    Ok(opened)
}

pub async fn bootstrap(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting session bootstrap");

    let vocabulary = config.session.closing_vocabulary()?;
    let api_key = config.require_llm_api_key()?.clone();

    let (knowledge, index_origin) = open_knowledge(&config, false).await?;
    info!(
        event_name = "system.bootstrap.knowledge_ready",
        origin = index_origin.as_str(),
        chunk_count = knowledge.len(),
        "knowledge base ready"
    );

    let llm = GeminiClient::new(GeminiSettings {
        base_url: config.llm.base_url.clone(),
        model: config.llm.model.clone(),
        api_key,
        temperature: config.llm.temperature,
        timeout: Duration::from_secs(config.llm.timeout_secs),
    })
    .map_err(BootstrapError::Client)?;
    let reports = NotionReportSink::from_config(&config.notion).map_err(BootstrapError::Client)?;
    if !reports.has_credentials() {
        tracing::warn!(
            event_name = "system.bootstrap.notion_unconfigured",
            "notion credentials missing; session reports will not be saved"
        );
    }

    let runtime = AgentRuntime::new(
        Roles::new(Arc::new(llm)),
        Toolbox::new(knowledge, Arc::new(reports), config.knowledge.top_k),
        vocabulary,
        config.session.recursion_limit,
    );

    Ok(Application { config, index_origin, driver: SessionDriver::new(runtime) })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hashing_config(dir: &std::path::Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.embedding.provider = EmbeddingProvider::Hashing;
        config.embedding.dimensions = 64;
        config.knowledge.index_dir = dir.to_path_buf();
        config
    }

    #[test]
    fn hashing_provider_needs_no_api_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        let embedder = build_embedder(&hashing_config(dir.path())).expect("embedder");
        assert_eq!(embedder.model(), "hashing-64");
    }

    #[test]
    fn gemini_provider_without_key_is_a_config_error() {
        let mut config = AppConfig::default();
        config.embedding.provider = EmbeddingProvider::Gemini;
        config.llm.api_key = None;

        let error = build_embedder(&config).err().expect("missing key");
        assert_eq!(error.error_class(), "config_validation");
        assert_eq!(error.exit_code(), 2);
    }

    #[tokio::test]
    async fn bootstrap_requires_the_chat_model_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = hashing_config(dir.path());
        config.llm.api_key = None;

        let error = bootstrap(config).await.err().expect("missing key");
        assert!(matches!(error, BootstrapError::Config(_)));
    }

    #[tokio::test]
    async fn bootstrap_builds_then_reuses_the_index() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = hashing_config(dir.path());
        config.llm.api_key = Some("test-key".to_string().into());

        let first = bootstrap(config.clone()).await.expect("first bootstrap");
        assert_eq!(first.index_origin, IndexOrigin::Built);
        assert!(!first.driver.is_closed());

        let second = bootstrap(config).await.expect("second bootstrap");
        assert_eq!(second.index_origin, IndexOrigin::Loaded);
    }
}
