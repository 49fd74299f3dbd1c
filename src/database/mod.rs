// Database module
// LanceDB holds the passage index searched by the knowledge base

pub mod lancedb;

pub use lancedb::vector_store::{SearchResult, VectorStore};
pub use lancedb::{PassageMetadata, PassageRecord};
