#[cfg(test)]
mod tests;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use super::Transcript;
use crate::dosha::Dosha;
use crate::{AyurbotError, Result};

/// Opaque identifier handed to a caller (cookie value, CLI run, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    #[inline]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for SessionId {
    type Err = uuid::Error;

    #[inline]
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Everything that must survive between turns of one user session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub dosha: Dosha,
    pub transcript: Transcript,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    /// Bumped every time a new quiz resets the session
    #[serde(default)]
    pub generation: u64,
}

impl SessionState {
    #[inline]
    pub fn new(dosha: Dosha) -> Self {
        let now = Utc::now();
        Self {
            dosha,
            transcript: Transcript::new(),
            created_at: now,
            last_active: now,
            generation: 0,
        }
    }

    /// Fresh state for a retaken quiz, one generation after `self`
    #[inline]
    pub fn reset(&self, dosha: Dosha) -> Self {
        Self {
            generation: self.generation.wrapping_add(1),
            ..Self::new(dosha)
        }
    }

    #[inline]
    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }
}

/// Keyed storage for session state
pub trait SessionStore: Send + Sync {
    /// Start a session with an empty transcript
    fn create(&self, dosha: Dosha) -> SessionId;

    fn read(&self, id: SessionId) -> Option<SessionState>;

    /// Replace the stored state. Fails with [`AyurbotError::SessionNotFound`] for unknown ids.
    fn update(&self, id: SessionId, state: SessionState) -> Result<()>;

    /// Replace the stored state only if it is still the generation `state` was read from.
    /// Fails with [`AyurbotError::SessionReset`] when a new quiz replaced it in the meantime.
    fn update_if_current(&self, id: SessionId, state: SessionState) -> Result<()>;

    /// Drop one session, returning whether it existed
    fn expire(&self, id: SessionId) -> bool;

    /// Drop every session idle for longer than `max_idle`, returning how many were removed
    fn expire_idle(&self, max_idle: Duration) -> usize;
}

/// Process-local store
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<SessionId, SessionState>>,
}

impl InMemorySessionStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SessionId, SessionState>> {
        // A poisoned map is still structurally valid
        self.sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl SessionStore for InMemorySessionStore {
    #[inline]
    fn create(&self, dosha: Dosha) -> SessionId {
        let id = SessionId::new();
        self.lock().insert(id, SessionState::new(dosha));
        info!("Created {} session {}", dosha, id);
        id
    }

    #[inline]
    fn read(&self, id: SessionId) -> Option<SessionState> {
        self.lock().get(&id).cloned()
    }

    #[inline]
    fn update(&self, id: SessionId, state: SessionState) -> Result<()> {
        let mut sessions = self.lock();
        let slot = sessions
            .get_mut(&id)
            .ok_or(AyurbotError::SessionNotFound(id))?;
        *slot = state;
        debug!("Updated session {}", id);
        Ok(())
    }

    #[inline]
    fn update_if_current(&self, id: SessionId, state: SessionState) -> Result<()> {
        let mut sessions = self.lock();
        let slot = sessions
            .get_mut(&id)
            .ok_or(AyurbotError::SessionNotFound(id))?;
        if slot.generation != state.generation {
            debug!(
                "Session {} moved to generation {}, dropping write from {}",
                id, slot.generation, state.generation
            );
            return Err(AyurbotError::SessionReset(id));
        }
        *slot = state;
        debug!("Updated session {}", id);
        Ok(())
    }

    #[inline]
    fn expire(&self, id: SessionId) -> bool {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            info!("Expired session {}", id);
        }
        removed
    }

    #[inline]
    fn expire_idle(&self, max_idle: Duration) -> usize {
        let cutoff = Utc::now() - max_idle;
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, state| state.last_active >= cutoff);
        let removed = before - sessions.len();
        if removed > 0 {
            info!("Expired {} idle sessions", removed);
        }
        removed
    }
}
