//! Vector store abstraction
//!
//! The schema index only needs id-keyed upsert/delete and top-k similarity
//! search. `InMemoryVectorStore` embeds documents on write and answers
//! queries with a linear cosine scan, which is plenty for catalog-sized data.

use crate::embedding::{Embedder, Embedding, EmbeddingError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("embedding dimension {actual} doesn't match store dimension {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Search hit returned by a vector store, highest score first.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: String,
    pub text: String,
    pub metadata: HashMap<String, String>,
    /// Cosine similarity in `[-1, 1]`.
    pub score: f32,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace the document stored under `id`.
    async fn upsert(
        &self,
        id: &str,
        text: &str,
        metadata: HashMap<String, String>,
    ) -> Result<(), VectorStoreError>;

    async fn delete(&self, ids: &[String]) -> Result<(), VectorStoreError>;

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<VectorHit>, VectorStoreError>;

    async fn ids(&self) -> Result<Vec<String>, VectorStoreError>;

    async fn len(&self) -> Result<usize, VectorStoreError>;
}

#[derive(Debug, Clone)]
struct StoredDocument {
    text: String,
    metadata: HashMap<String, String>,
    embedding: Embedding,
}

pub struct InMemoryVectorStore {
    embedder: Arc<dyn Embedder>,
    documents: RwLock<HashMap<String, StoredDocument>>,
}

impl InMemoryVectorStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            documents: RwLock::new(HashMap::new()),
        }
    }

    async fn embed_checked(&self, text: &str) -> Result<Embedding, VectorStoreError> {
        let embedding = self.embedder.embed(text).await?;
        let expected = self.embedder.dimension();
        if embedding.len() != expected {
            return Err(VectorStoreError::DimensionMismatch {
                expected,
                actual: embedding.len(),
            });
        }
        Ok(embedding)
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(
        &self,
        id: &str,
        text: &str,
        metadata: HashMap<String, String>,
    ) -> Result<(), VectorStoreError> {
        // embed before taking the lock so a slow backend never blocks readers
        let embedding = self.embed_checked(text).await?;
        let mut documents = self.documents.write().await;
        documents.insert(
            id.to_string(),
            StoredDocument {
                text: text.to_string(),
                metadata,
                embedding,
            },
        );
        debug!("Vector store now holds {} documents", documents.len());
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> Result<(), VectorStoreError> {
        let mut documents = self.documents.write().await;
        for id in ids {
            documents.remove(id);
        }
        Ok(())
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<VectorHit>, VectorStoreError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let query_embedding = self.embed_checked(query).await?;

        let documents = self.documents.read().await;
        let mut hits: Vec<VectorHit> = documents
            .iter()
            .map(|(id, doc)| VectorHit {
                id: id.clone(),
                text: doc.text.clone(),
                metadata: doc.metadata.clone(),
                score: cosine_similarity(&query_embedding, &doc.embedding),
            })
            .collect();

        // ties broken by id so equal scores come back in a stable order
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn ids(&self) -> Result<Vec<String>, VectorStoreError> {
        let mut ids: Vec<String> = self.documents.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn len(&self) -> Result<usize, VectorStoreError> {
        Ok(self.documents.read().await.len())
    }
}

/// Compute cosine similarity between two vectors
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
