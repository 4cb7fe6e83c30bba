//! Retrieval over the restaurant's fixed documents: recursive splitting, embeddings, and a
//! persisted cosine-similarity index.

pub mod embedding;
pub mod error;
pub mod index;
pub mod knowledge_base;
pub mod splitter;

pub use embedding::{EmbeddingService, GeminiEmbedder, GeminiEmbedderSettings, HashingEmbedder};
pub use error::RetrievalError;
pub use index::{SearchHit, VectorIndex, INDEX_FILE_NAME};
pub use knowledge_base::{IndexOrigin, KnowledgeBase};
pub use splitter::{KnowledgeChunk, RecursiveSplitter};
