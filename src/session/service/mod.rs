
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::store::{SessionId, SessionState, SessionStore};
use super::{ConversationSession, Generator, Reply, Retriever, SessionOptions, Transcript};
use crate::dosha::{Dosha, classify};
use crate::{AyurbotError, Result};

/// Session-id based front door for callers that cannot hold a
/// [`ConversationSession`] between requests, such as a web handler.
pub struct ChatService<S: SessionStore> {
    store: S,
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn Generator>,
    options: SessionOptions,
}

impl<S: SessionStore> ChatService<S> {
    #[inline]
    pub fn new(
        store: S,
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn Generator>,
        options: SessionOptions,
    ) -> Self {
        Self {
            store,
            retriever,
            generator,
            options,
        }
    }

    #[inline]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Classify quiz answers and start a fresh conversation.
    ///
    /// When `existing` names a live session it is reset in place: the new dosha
    /// replaces the old one and the transcript is cleared.
    #[inline]
    pub fn complete_quiz<A: AsRef<str>>(
        &self,
        existing: Option<SessionId>,
        answers: &[A],
    ) -> Result<(SessionId, Dosha)> {
        let dosha = classify(answers)?;

        if let Some(id) = existing {
            if let Some(current) = self.store.read(id) {
                self.store.update(id, current.reset(dosha))?;
                info!("Reset session {} to {}", id, dosha);
                return Ok((id, dosha));
            }
            debug!("Session {} no longer exists, starting a new one", id);
        }

        let id = self.store.create(dosha);
        Ok((id, dosha))
    }

    /// Ask within a stored session. The stored transcript only changes when the turn succeeds.
    #[inline]
    pub async fn ask(&self, id: SessionId, question: &str) -> Result<String> {
        self.ask_with_sources(id, question)
            .await
            .map(|reply| reply.answer)
    }

    /// Ask within a stored session and return the supporting passages too.
    ///
    /// The turn is written back only to the session it was asked in. When a new
    /// quiz reset the session while the answer was being generated, the answer is
    /// discarded with [`AyurbotError::SessionReset`]. When the session expired in
    /// the meantime it is discarded with [`AyurbotError::SessionNotFound`] and the
    /// session is not recreated.
    #[inline]
    pub async fn ask_with_sources(&self, id: SessionId, question: &str) -> Result<Reply> {
        let state = self
            .store
            .read(id)
            .ok_or(AyurbotError::SessionNotFound(id))?;

        let mut session = ConversationSession::resume(
            state,
            Arc::clone(&self.retriever),
            Arc::clone(&self.generator),
            self.options,
        );

        let reply = session.ask_with_sources(question).await?;

        if let Err(e) = self.store.update_if_current(id, session.into_state()) {
            warn!("Discarding answer for session {}: {}", id, e);
            return Err(e);
        }

        Ok(reply)
    }

    #[inline]
    pub fn dosha(&self, id: SessionId) -> Result<Dosha> {
        self.store
            .read(id)
            .map(|state| state.dosha)
            .ok_or(AyurbotError::SessionNotFound(id))
    }

    #[inline]
    pub fn history(&self, id: SessionId) -> Result<Transcript> {
        self.store
            .read(id)
            .map(|state| state.transcript)
            .ok_or(AyurbotError::SessionNotFound(id))
    }

    #[inline]
    pub fn end(&self, id: SessionId) -> bool {
        self.store.expire(id)
    }
}
