use std::fs;
use std::path::Path;
use std::sync::Arc;

use delicia_core::knowledge::SourceDocument;

use crate::embedding::EmbeddingService;
use crate::error::RetrievalError;
use crate::index::{SearchHit, VectorIndex};
use crate::splitter::RecursiveSplitter;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexOrigin {
    Built,
    Loaded,
}

impl IndexOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Built => "built",
            Self::Loaded => "loaded",
        }
    }
}

/// Chunked, embedded restaurant documents plus the embedder used to query them.
#[derive(Clone)]
pub struct KnowledgeBase {
    index: VectorIndex,
    embedder: Arc<dyn EmbeddingService>,
}

impl std::fmt::Debug for KnowledgeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeBase")
            .field("embedding_model", &self.index.embedding_model())
            .field("chunks", &self.index.len())
            .finish()
    }
}

impl KnowledgeBase {
    /// Splits and embeds `documents` in memory.
    pub async fn build(
        documents: &[SourceDocument],
        splitter: &RecursiveSplitter,
        embedder: Arc<dyn EmbeddingService>,
    ) -> Result<Self, RetrievalError> {
        let chunks = splitter.split_documents(documents);
        let texts = chunks.iter().map(|chunk| chunk.text.clone()).collect::<Vec<_>>();
        let embeddings = embedder.embed_documents(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(RetrievalError::EmbeddingCount {
                expected: chunks.len(),
                actual: embeddings.len(),
            });
        }

        let mut index = VectorIndex::new(embedder.model());
        for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
            index.insert(chunk, embedding)?;
        }

        tracing::info!(
            event_name = "knowledge.index.built",
            chunk_count = index.len(),
            embedding_model = %index.embedding_model(),
            "knowledge index built"
        );
        Ok(Self { index, embedder })
    }

    /// Reuses `<dir>/index.json` when present, otherwise builds and persists it.
    /// `rebuild` discards any existing file first.
    pub async fn open(
        documents: &[SourceDocument],
        splitter: &RecursiveSplitter,
        embedder: Arc<dyn EmbeddingService>,
        dir: &Path,
        rebuild: bool,
    ) -> Result<(Self, IndexOrigin), RetrievalError> {
        let path = VectorIndex::index_path(dir);
        if rebuild && path.exists() {
            fs::remove_file(&path)
                .map_err(|source| RetrievalError::Io { path: path.clone(), source })?;
        }

        if let Some(index) = VectorIndex::load(dir)? {
            if index.embedding_model() != embedder.model() {
                return Err(RetrievalError::IncompatibleIndex {
                    path,
                    reason: format!(
                        "built with embedding model `{}` but `{}` is configured; rebuild the index",
                        index.embedding_model(),
                        embedder.model()
                    ),
                });
            }
            tracing::info!(
                event_name = "knowledge.index.loaded",
                chunk_count = index.len(),
                path = %path.display(),
                "knowledge index loaded"
            );
            return Ok((Self { index, embedder }, IndexOrigin::Loaded));
        }

        let knowledge = Self::build(documents, splitter, embedder).await?;
        let written = knowledge.index.save(dir)?;
        tracing::info!(
            event_name = "knowledge.index.persisted",
            path = %written.display(),
            "knowledge index persisted"
        );
        Ok((knowledge, IndexOrigin::Built))
    }

    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>, RetrievalError> {
        let embedding = self.embedder.embed_query(query).await?;
        let hits = self.index.search(&embedding, k)?;
        tracing::debug!(
            event_name = "knowledge.search.completed",
            k,
            hit_count = hits.len(),
            "knowledge search completed"
        );
        Ok(hits)
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
