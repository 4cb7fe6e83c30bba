//! Brute-force cosine index over knowledge chunks, with JSON persistence.

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;
use crate::splitter::KnowledgeChunk;

pub const INDEX_FILE_NAME: &str = "index.json";
pub const INDEX_FORMAT_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq)]
pub struct SearchHit {
    pub chunk: KnowledgeChunk,
    pub score: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct IndexedChunk {
    #[serde(flatten)]
    chunk: KnowledgeChunk,
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedIndex {
    version: u32,
    embedding_model: String,
    dimensions: usize,
    chunks: Vec<IndexedChunk>,
}

/// Insert-only vector index. Entries keep insertion order, which also breaks score ties.
#[derive(Clone, Debug, Default)]
pub struct VectorIndex {
    embedding_model: String,
    dimensions: Option<usize>,
    entries: Vec<IndexedChunk>,
}

impl VectorIndex {
    pub fn new(embedding_model: impl Into<String>) -> Self {
        Self { embedding_model: embedding_model.into(), dimensions: None, entries: Vec::new() }
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    pub fn insert(
        &mut self,
        chunk: KnowledgeChunk,
        embedding: Vec<f32>,
    ) -> Result<(), RetrievalError> {
        match self.dimensions {
            Some(expected) if expected != embedding.len() => {
                return Err(RetrievalError::DimensionMismatch { expected, actual: embedding.len() });
            }
            Some(_) => {}
            None => self.dimensions = Some(embedding.len()),
        }
        self.entries.push(IndexedChunk { chunk, embedding });
        Ok(())
    }

    /// The `k` chunks closest to `query`, best first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, RetrievalError> {
        if let Some(expected) = self.dimensions {
            if expected != query.len() {
                return Err(RetrievalError::DimensionMismatch { expected, actual: query.len() });
            }
        }

        let mut scored = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (position, cosine_similarity(query, &entry.embedding)))
            .collect::<Vec<_>>();
        scored.sort_by(|(left_pos, left), (right_pos, right)| {
            right.partial_cmp(left).unwrap_or(Ordering::Equal).then(left_pos.cmp(right_pos))
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(position, score)| SearchHit {
                chunk: self.entries[position].chunk.clone(),
                score,
            })
            .collect())
    }

    pub fn chunks(&self) -> impl Iterator<Item = &KnowledgeChunk> {
        self.entries.iter().map(|entry| &entry.chunk)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index_path(dir: &Path) -> PathBuf {
        dir.join(INDEX_FILE_NAME)
    }

    /// Writes `<dir>/index.json`, creating `dir` if needed.
    pub fn save(&self, dir: &Path) -> Result<PathBuf, RetrievalError> {
        fs::create_dir_all(dir)
            .map_err(|source| RetrievalError::Io { path: dir.to_path_buf(), source })?;

        let persisted = PersistedIndex {
            version: INDEX_FORMAT_VERSION,
            embedding_model: self.embedding_model.clone(),
            dimensions: self.dimensions.unwrap_or(0),
            chunks: self.entries.clone(),
        };
        let encoded = serde_json::to_vec(&persisted).map_err(RetrievalError::Encode)?;

        let path = Self::index_path(dir);
        let staging = dir.join(format!("{INDEX_FILE_NAME}.tmp"));
        fs::write(&staging, encoded)
            .map_err(|source| RetrievalError::Io { path: staging.clone(), source })?;
        fs::rename(&staging, &path)
            .map_err(|source| RetrievalError::Io { path: path.clone(), source })?;
        Ok(path)
    }

    /// Reads `<dir>/index.json`; `Ok(None)` when no index has been written yet.
    pub fn load(dir: &Path) -> Result<Option<Self>, RetrievalError> {
        let path = Self::index_path(dir);
        if !path.exists() {
            return Ok(None);
        }

        let raw =
            fs::read(&path).map_err(|source| RetrievalError::Io { path: path.clone(), source })?;
        let persisted: PersistedIndex = serde_json::from_slice(&raw)
            .map_err(|source| RetrievalError::Decode { path: path.clone(), source })?;

        if persisted.version != INDEX_FORMAT_VERSION {
            return Err(RetrievalError::IncompatibleIndex {
                path,
                reason: format!(
                    "format version {} is not supported (expected {INDEX_FORMAT_VERSION})",
                    persisted.version
                ),
            });
        }

        let mut index = Self::new(persisted.embedding_model);
        for entry in persisted.chunks {
            index.insert(entry.chunk, entry.embedding)?;
        }
        Ok(Some(index))
    }
}

/// Cosine similarity; 0.0 for mismatched lengths or zero-magnitude vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f64 = a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    let mag_a = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    let mag_b = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}

#[cfg(test)]
mod tests {
    use super::{VectorIndex, INDEX_FILE_NAME};
    use crate::error::RetrievalError;
    use crate::splitter::KnowledgeChunk;

    fn chunk(id: &str) -> KnowledgeChunk {
        KnowledgeChunk {
            id: id.to_string(),
            source: "menu.txt".to_string(),
            text: format!("texto {id}"),
            start: 0,
            end: 7,
        }
    }

    #[test]
    fn search_orders_by_similarity_and_truncates() {
        let mut index = VectorIndex::new("test");
        index.insert(chunk("a"), vec![1.0, 0.0]).expect("insert");
        index.insert(chunk("b"), vec![0.0, 1.0]).expect("insert");
        index.insert(chunk("c"), vec![0.7, 0.7]).expect("insert");

        let hits = index.search(&[1.0, 0.1], 2).expect("search");
        let ids = hits.iter().map(|hit| hit.chunk.id.as_str()).collect::<Vec<_>>();

        assert_eq!(ids, vec!["a", "c"]);
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let mut index = VectorIndex::new("test");
        for id in ["first", "second", "third"] {
            index.insert(chunk(id), vec![0.5, 0.5]).expect("insert");
        }

        let hits = index.search(&[1.0, 1.0], 3).expect("search");
        let ids = hits.iter().map(|hit| hit.chunk.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn mixed_dimensions_are_rejected() {
        let mut index = VectorIndex::new("test");
        index.insert(chunk("a"), vec![1.0, 0.0]).expect("insert");

        assert!(matches!(
            index.insert(chunk("b"), vec![1.0]),
            Err(RetrievalError::DimensionMismatch { expected: 2, actual: 1 })
        ));
        assert!(index.search(&[1.0, 0.0, 0.0], 1).is_err());
    }

    #[test]
    fn empty_index_returns_no_hits() {
        let index = VectorIndex::new("test");
        assert!(index.search(&[1.0], 3).expect("search").is_empty());
        assert!(index.is_empty());
    }

    #[test]
    fn save_then_load_restores_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("index");
        let mut index = VectorIndex::new("hashing-2");
        index.insert(chunk("a"), vec![1.0, 0.0]).expect("insert");
        index.insert(chunk("b"), vec![0.0, 1.0]).expect("insert");

        let path = index.save(&nested).expect("save");
        assert!(path.ends_with(INDEX_FILE_NAME));

        let loaded = VectorIndex::load(&nested).expect("load").expect("index present");
        assert_eq!(loaded.embedding_model(), "hashing-2");
        assert_eq!(loaded.dimensions(), Some(2));
        assert_eq!(loaded.chunks().collect::<Vec<_>>(), index.chunks().collect::<Vec<_>>());
    }

    #[test]
    fn missing_index_loads_as_none_and_garbage_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(VectorIndex::load(dir.path()).expect("load").is_none());

        std::fs::write(dir.path().join(INDEX_FILE_NAME), b"{not json").expect("write");
        assert!(matches!(VectorIndex::load(dir.path()), Err(RetrievalError::Decode { .. })));
    }
}
