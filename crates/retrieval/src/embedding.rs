//! Embedding services.
//!
//! - [`GeminiEmbedder`] calls the Gemini embedding endpoints over HTTP.
//! - [`HashingEmbedder`] is a deterministic feature-hashing embedder that needs no network;
//!   tests and offline runs use it.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use crate::error::RetrievalError;

/// Converts text into fixed-length vectors. Documents and queries may be embedded
/// differently (Gemini uses distinct task types for the two).
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Model label recorded in the persisted index.
    fn model(&self) -> &str;

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, RetrievalError>;
}

// ---------------------------------------------------------------------------
// Gemini
// ---------------------------------------------------------------------------

const BATCH_LIMIT: usize = 100;

#[derive(Clone, Debug)]
pub struct GeminiEmbedderSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: SecretString,
    pub timeout: Duration,
}

pub struct GeminiEmbedder {
    settings: GeminiEmbedderSettings,
    client: reqwest::Client,
}

impl std::fmt::Debug for GeminiEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiEmbedder").field("model", &self.settings.model).finish()
    }
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedContentsResponse {
    #[serde(default)]
    embeddings: Vec<EmbeddingValues>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    #[serde(default)]
    values: Vec<f32>,
}

impl GeminiEmbedder {
    pub fn new(settings: GeminiEmbedderSettings) -> Result<Self, RetrievalError> {
        let client = reqwest::Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { settings, client })
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/v1beta/models/{}:{method}",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.model
        )
    }

    fn request_item(&self, text: &str, task_type: &str) -> serde_json::Value {
        json!({
            "model": format!("models/{}", self.settings.model),
            "content": { "parts": [{ "text": text }] },
            "taskType": task_type,
        })
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<T, RetrievalError> {
        let response = self
            .client
            .post(self.endpoint(method))
            .header("x-goog-api-key", self.settings.api_key.expose_secret())
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Embedding(format!(
                "Gemini {method} returned HTTP {}: {detail}",
                status.as_u16()
            )));
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl EmbeddingService for GeminiEmbedder {
    fn model(&self) -> &str {
        &self.settings.model
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_LIMIT) {
            let requests = batch
                .iter()
                .map(|text| self.request_item(text, "RETRIEVAL_DOCUMENT"))
                .collect::<Vec<_>>();
            let response: BatchEmbedContentsResponse =
                self.post("batchEmbedContents", &json!({ "requests": requests })).await?;

            if response.embeddings.len() != batch.len() {
                return Err(RetrievalError::EmbeddingCount {
                    expected: batch.len(),
                    actual: response.embeddings.len(),
                });
            }
            vectors.extend(response.embeddings.into_iter().map(|embedding| embedding.values));
        }

        tracing::debug!(
            event_name = "knowledge.embedding.documents",
            model = %self.settings.model,
            count = vectors.len(),
            "embedded documents"
        );
        Ok(vectors)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let response: EmbedContentResponse =
            self.post("embedContent", &self.request_item(text, "RETRIEVAL_QUERY")).await?;
        Ok(response.embedding.values)
    }
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

/// Bag of lowercased word tokens and their character trigrams, hashed into a fixed number
/// of signed buckets and L2-normalised. Same text always yields the same vector.
#[derive(Clone, Debug)]
pub struct HashingEmbedder {
    dimensions: usize,
    model: String,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        let dimensions = dimensions.max(1);
        Self { dimensions, model: format!("hashing-{dimensions}") }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let lowered = text.to_lowercase();

        for token in lowered.split(|ch: char| !ch.is_alphanumeric()).filter(|t| !t.is_empty()) {
            self.accumulate(&mut vector, token, 1.0);

            let padded = format!("<{token}>").chars().collect::<Vec<_>>();
            for trigram in padded.windows(3) {
                let trigram = trigram.iter().collect::<String>();
                self.accumulate(&mut vector, &trigram, 0.5);
            }
        }

        let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|value| *value /= norm);
        }
        vector
    }

    fn accumulate(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let hash = blake3::hash(feature.as_bytes());
        let bytes = hash.as_bytes();
        let mut bucket_bytes = [0u8; 8];
        bucket_bytes.copy_from_slice(&bytes[..8]);
        let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimensions as u64) as usize;
        let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

#[async_trait]
impl EmbeddingService for HashingEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        Ok(self.embed(text))
    }
}
