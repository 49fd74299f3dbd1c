// Test doubles for the retrieval and generation capabilities

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use super::{Generator, Passage, Retriever};
use crate::{AyurbotError, Result};

pub(crate) fn passage(text: &str) -> Passage {
    Passage {
        text: text.to_string(),
        source: Some("ayurveda.pdf".to_string()),
        page: Some(12),
    }
}

#[derive(Default)]
pub(crate) struct FakeRetriever {
    pub passages: Vec<Passage>,
    pub fail: bool,
    pub delay: Option<Duration>,
    pub calls: Mutex<Vec<(String, usize)>>,
}

impl FakeRetriever {
    pub(crate) fn returning(passages: Vec<Passage>) -> Self {
        Self {
            passages,
            ..Self::default()
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn calls(&self) -> Vec<(String, usize)> {
        self.calls.lock().expect("lock should not be poisoned").clone()
    }
}

#[async_trait]
impl Retriever for FakeRetriever {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Passage>> {
        self.calls
            .lock()
            .expect("lock should not be poisoned")
            .push((query.to_string(), k));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(AyurbotError::RetrievalUnavailable(
                "index offline".to_string(),
            ));
        }
        Ok(self.passages.iter().take(k).cloned().collect())
    }
}

#[derive(Default)]
pub(crate) struct FakeGenerator {
    pub answer: String,
    pub error: Option<fn() -> AyurbotError>,
    pub delay: Option<Duration>,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub(crate) fn answering(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            ..Self::default()
        }
    }

    pub(crate) fn failing_with(error: fn() -> AyurbotError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .expect("lock should not be poisoned")
            .clone()
    }
}

#[async_trait]
impl Generator for FakeGenerator {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .expect("lock should not be poisoned")
            .push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.error {
            Some(make_error) => Err(make_error()),
            None => Ok(self.answer.clone()),
        }
    }
}
