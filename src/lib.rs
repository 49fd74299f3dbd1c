use thiserror::Error;

use crate::session::store::SessionId;

pub type Result<T> = std::result::Result<T, AyurbotError>;

#[derive(Error, Debug)]
pub enum AyurbotError {
    #[error("Invalid input: no quiz answers were given")]
    InvalidInput,

    #[error("Question cannot be empty")]
    EmptyQuestion,

    #[error("Knowledge base unavailable: {0}")]
    RetrievalUnavailable(String),

    #[error("Language model unavailable: {0}")]
    GenerationUnavailable(String),

    #[error("Language model did not answer within {seconds} seconds")]
    GenerationTimeout { seconds: u64 },

    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("Session {0} was restarted by a new quiz while the question was being answered")]
    SessionReset(SessionId),

    #[error("Database error: {0}")]
    Database(String),
}

impl AyurbotError {
    /// Whether the error only aborted the current turn and the session can keep going
    #[inline]
    pub fn is_turn_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyQuestion
                | Self::RetrievalUnavailable(_)
                | Self::GenerationUnavailable(_)
                | Self::GenerationTimeout { .. }
                | Self::SessionReset(_)
        )
    }
}

pub mod commands;
pub mod config;
pub mod database;
pub mod dosha;
pub mod embeddings;
pub mod knowledge;
pub mod prompt;
pub mod session;
