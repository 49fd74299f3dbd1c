// LanceDB vector database module
// Stores reference passages with their embeddings for similarity search


pub mod vector_store;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::session::Passage;

/// Passage record stored in LanceDB
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassageRecord {
    /// Unique identifier for this record
    pub id: String,
    /// Embedding of the passage text, produced by the configured embedding model
    pub vector: Vec<f32>,
    pub metadata: PassageMetadata,
}

/// Everything stored alongside a passage embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassageMetadata {
    /// The passage text handed to the prompt
    pub content: String,
    /// Source document, usually a file name
    pub source: Option<String>,
    /// Page within the source document
    pub page: Option<u32>,
    /// Position of the passage within its source
    pub chunk_index: u32,
    /// RFC 3339 timestamp of when the passage was indexed
    pub created_at: String,
}

impl PassageRecord {
    /// Build a record with a fresh id and the current timestamp
    #[inline]
    pub fn new(vector: Vec<f32>, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            vector,
            metadata: PassageMetadata {
                content: content.into(),
                source: None,
                page: None,
                chunk_index: 0,
                created_at: Utc::now().to_rfc3339(),
            },
        }
    }

    #[inline]
    pub fn with_source(mut self, source: impl Into<String>, page: Option<u32>) -> Self {
        self.metadata.source = Some(source.into());
        self.metadata.page = page;
        self
    }

    #[inline]
    pub fn with_chunk_index(mut self, chunk_index: u32) -> Self {
        self.metadata.chunk_index = chunk_index;
        self
    }
}

impl From<PassageMetadata> for Passage {
    #[inline]
    fn from(metadata: PassageMetadata) -> Self {
        Self {
            text: metadata.content,
            source: metadata.source,
            page: metadata.page,
        }
    }
}
