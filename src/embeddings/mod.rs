// Embeddings module
// Ollama integration for query embeddings and answer generation

pub mod ollama;

pub use ollama::{OllamaClient, OllamaError};
