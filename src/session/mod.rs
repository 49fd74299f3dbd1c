//! Conversation sessions
//!
//! A [`ConversationSession`] owns one dosha label and one transcript. Each call
//! to [`ConversationSession::ask`] retrieves supporting passages, builds the
//! dosha-conditioned prompt and asks the language model. The turn is recorded
//! only when both backend calls succeed.

#[cfg(test)]
pub(crate) mod testing;

pub mod service;
pub mod store;

use async_trait::async_trait;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::dosha::Dosha;
use crate::prompt::{build_prompt, format_context};
use crate::{AyurbotError, Result};

pub use service::ChatService;
pub use store::{InMemorySessionStore, SessionId, SessionState, SessionStore};

pub const DEFAULT_TOP_K: usize = 2;
pub const DEFAULT_RETRIEVAL_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_GENERATION_TIMEOUT_SECONDS: u64 = 120;

/// A passage returned by the knowledge base
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    pub source: Option<String>,
    pub page: Option<u32>,
}

impl Passage {
    /// Where the passage came from, e.g. `ayurveda.pdf (Page 12)`
    #[inline]
    pub fn citation(&self) -> Option<String> {
        let source = self.source.as_deref()?;
        Some(match self.page {
            Some(page) => format!("{} (Page {})", source, page),
            None => source.to_string(),
        })
    }
}

/// An answer together with the passages it was grounded on, most relevant first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub answer: String,
    pub passages: Vec<Passage>,
}

impl Reply {
    /// Distinct citations in ranking order
    #[inline]
    pub fn citations(&self) -> Vec<String> {
        self.passages
            .iter()
            .filter_map(Passage::citation)
            .unique()
            .collect()
    }
}

/// Looks up passages relevant to a query, most relevant first
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Passage>>;
}

/// Produces text from a prompt
#[async_trait]
pub trait Generator: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speaker {
    User,
    Assistant,
}

impl Speaker {
    #[inline]
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "You",
            Self::Assistant => "Ayurbot",
        }
    }
}

impl fmt::Display for Speaker {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
}

/// Append-only log of question/answer turns. Always holds an even number of entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over (question, answer) pairs
    #[inline]
    pub fn turns(&self) -> impl Iterator<Item = (&TranscriptEntry, &TranscriptEntry)> {
        self.entries
            .chunks_exact(2)
            .map(|pair| (&pair[0], &pair[1]))
    }

    fn push_turn(&mut self, question: String, answer: String) {
        self.entries.push(TranscriptEntry {
            speaker: Speaker::User,
            text: question,
        });
        self.entries.push(TranscriptEntry {
            speaker: Speaker::Assistant,
            text: answer,
        });
    }
}

/// Per-turn knobs for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Number of passages requested from the retriever
    pub top_k: usize,
    pub retrieval_timeout: Duration,
    pub generation_timeout: Duration,
}

impl Default for SessionOptions {
    #[inline]
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            retrieval_timeout: Duration::from_secs(DEFAULT_RETRIEVAL_TIMEOUT_SECONDS),
            generation_timeout: Duration::from_secs(DEFAULT_GENERATION_TIMEOUT_SECONDS),
        }
    }
}

pub struct ConversationSession {
    state: SessionState,
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn Generator>,
    options: SessionOptions,
}

impl ConversationSession {
    #[inline]
    pub fn new(
        dosha: Dosha,
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn Generator>,
        options: SessionOptions,
    ) -> Self {
        Self::resume(SessionState::new(dosha), retriever, generator, options)
    }

    /// Continue a session from previously saved state
    #[inline]
    pub fn resume(
        state: SessionState,
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn Generator>,
        options: SessionOptions,
    ) -> Self {
        Self {
            state,
            retriever,
            generator,
            options: SessionOptions {
                top_k: options.top_k.max(1),
                ..options
            },
        }
    }

    #[inline]
    pub fn dosha(&self) -> Dosha {
        self.state.dosha
    }

    #[inline]
    pub fn history(&self) -> &Transcript {
        &self.state.transcript
    }

    /// Hand the state back for storage
    #[inline]
    pub fn into_state(self) -> SessionState {
        self.state
    }

    /// Answer one question.
    ///
    /// On any error the transcript is left untouched and the session stays usable.
    #[inline]
    pub async fn ask(&mut self, question: &str) -> Result<String> {
        self.ask_with_sources(question)
            .await
            .map(|reply| reply.answer)
    }

    /// Like [`ask`](Self::ask), also returning the passages the answer was grounded on
    #[inline]
    pub async fn ask_with_sources(&mut self, question: &str) -> Result<Reply> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AyurbotError::EmptyQuestion);
        }

        let dosha = self.state.dosha;
        debug!(
            "Asking as {} (top_k={}): {}",
            dosha, self.options.top_k, question
        );

        let passages = self.retrieve(question).await?;
        debug!("Retrieved {} passages", passages.len());

        let context = format_context(&passages);
        let prompt = build_prompt(dosha, &context, question);

        let answer = self.generate(&prompt).await?;

        self.state
            .transcript
            .push_turn(question.to_string(), answer.clone());
        self.state.touch();
        info!(
            "Recorded turn {} for {} session",
            self.state.transcript.len() / 2,
            dosha
        );

        Ok(Reply { answer, passages })
    }

    async fn retrieve(&self, question: &str) -> Result<Vec<Passage>> {
        let limit = self.options.retrieval_timeout;
        match timeout(limit, self.retriever.search(question, self.options.top_k)).await {
            Ok(Ok(passages)) => Ok(passages),
            Ok(Err(e)) => {
                warn!("Retrieval failed: {}", e);
                Err(match e {
                    AyurbotError::RetrievalUnavailable(_) => e,
                    other => AyurbotError::RetrievalUnavailable(other.to_string()),
                })
            }
            Err(_) => {
                warn!("Retrieval timed out after {:?}", limit);
                Err(AyurbotError::RetrievalUnavailable(format!(
                    "no response within {} seconds",
                    limit.as_secs()
                )))
            }
        }
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let limit = self.options.generation_timeout;
        match timeout(limit, self.generator.complete(prompt)).await {
            Ok(Ok(answer)) => Ok(answer),
            Ok(Err(e)) => {
                warn!("Generation failed: {}", e);
                Err(match e {
                    AyurbotError::GenerationUnavailable(_) | AyurbotError::GenerationTimeout { .. } => e,
                    other => AyurbotError::GenerationUnavailable(other.to_string()),
                })
            }
            Err(_) => {
                warn!("Generation timed out after {:?}", limit);
                Err(AyurbotError::GenerationTimeout {
                    seconds: limit.as_secs(),
                })
            }
        }
    }
}
