//! Retrieval over the indexed reference text
//!
//! [`KnowledgeBase`] embeds the question with Ollama and looks it up in the
//! LanceDB passage index.

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::database::VectorStore;
use crate::embeddings::OllamaClient;
use crate::session::{Passage, Retriever};
use crate::{AyurbotError, Result};

pub struct KnowledgeBase {
    client: OllamaClient,
    store: Arc<VectorStore>,
}

impl KnowledgeBase {
    #[inline]
    pub fn new(client: OllamaClient, store: Arc<VectorStore>) -> Self {
        Self { client, store }
    }

    #[inline]
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    async fn embed(&self, query: &str) -> Result<Vec<f32>> {
        let client = self.client.clone();
        let query = query.to_string();

        tokio::task::spawn_blocking(move || client.generate_embedding(&query))
            .await
            .map_err(|e| AyurbotError::RetrievalUnavailable(format!("embedding task failed: {}", e)))?
            .map_err(|e| AyurbotError::RetrievalUnavailable(format!("embedding failed: {}", e)))
    }
}

#[async_trait]
impl Retriever for KnowledgeBase {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Passage>> {
        let embedding = self.embed(query).await?;

        let results = self
            .store
            .search_similar(&embedding, k)
            .await
            .map_err(|e| AyurbotError::RetrievalUnavailable(e.to_string()))?;

        debug!(
            "Retrieved {} passages (best similarity {:?})",
            results.len(),
            results.first().map(|r| r.similarity_score)
        );

        Ok(results
            .into_iter()
            .map(|result| Passage::from(result.passage))
            .collect())
    }
}
