#[cfg(test)]
mod tests;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::AyurbotError;
use crate::config::Config;
use crate::session::Generator;

const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

#[derive(Debug, Error)]
pub enum OllamaError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Ollama unreachable: {0}")]
    Unavailable(String),

    #[error("Ollama returned HTTP {0}")]
    Status(u16),

    #[error("Unexpected response from Ollama: {0}")]
    InvalidResponse(String),
}

/// Blocking client for a local Ollama server
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    chat_model: String,
    embedding_model: String,
    max_tokens: u32,
    timeout: Duration,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
    pub details: Option<ModelDetails>,
}

#[derive(Debug, Deserialize)]
pub struct ModelDetails {
    pub format: Option<String>,
    pub family: Option<String>,
    pub families: Option<Vec<String>>,
    pub parameter_size: Option<String>,
    pub quantization_level: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let base_url = config
            .ollama_url()
            .context("Failed to generate Ollama URL from config")?;
        let timeout = Duration::from_secs(config.ollama.timeout_seconds);

        Ok(Self {
            base_url,
            chat_model: config.ollama.chat_model.clone(),
            embedding_model: config.ollama.embedding_model.clone(),
            max_tokens: config.ollama.max_tokens,
            timeout,
            agent: Self::build_agent(timeout),
            retry_attempts: config.ollama.retry_attempts.max(1),
        })
    }

    fn build_agent(timeout: Duration) -> ureq::Agent {
        ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into()
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.agent = Self::build_agent(timeout);
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Test connection to the Ollama server and verify both models are pulled
    #[inline]
    pub fn health_check(&self) -> anyhow::Result<()> {
        debug!("Performing health check for Ollama at {}", self.base_url);

        self.ping().context("Server ping failed")?;

        let models = self.list_models().context("Failed to list models")?;
        for model in [&self.chat_model, &self.embedding_model] {
            Self::ensure_model(&models, model)?;
        }

        info!(
            "Health check passed for Ollama server at {} with models {} and {}",
            self.base_url, self.chat_model, self.embedding_model
        );
        Ok(())
    }

    fn ensure_model(models: &[ModelInfo], wanted: &str) -> anyhow::Result<()> {
        // Ollama reports untagged models with an implicit ":latest"
        let tagged = format!("{}:latest", wanted);
        if models.iter().any(|m| m.name == wanted || m.name == tagged) {
            debug!("Model {} is available", wanted);
            return Ok(());
        }

        let available_models: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
        warn!(
            "Model {} not found. Available models: {:?}",
            wanted, available_models
        );
        Err(anyhow::anyhow!(
            "Model '{}' is not available. Available models: {:?}",
            wanted,
            available_models
        ))
    }

    /// Ping the Ollama server to check if it's responsive
    #[inline]
    pub fn ping(&self) -> Result<(), OllamaError> {
        let url = self.endpoint("/api/tags")?;
        debug!("Pinging Ollama server at {}", url);

        self.make_request_with_retry(|| {
            self.agent
                .get(url.as_str())
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        debug!("Server ping successful");
        Ok(())
    }

    /// List all pulled models
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>, OllamaError> {
        let url = self.endpoint("/api/tags")?;
        debug!("Fetching available models from {}", url);

        let response_text = self.make_request_with_retry(|| {
            self.agent
                .get(url.as_str())
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        let models_response: ModelsResponse = serde_json::from_str(&response_text)
            .map_err(|e| OllamaError::InvalidResponse(format!("models list: {}", e)))?;

        debug!("Found {} models", models_response.models.len());
        Ok(models_response.models)
    }

    /// Embed a query with the configured embedding model
    #[inline]
    pub fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, OllamaError> {
        debug!("Generating embedding for text (length: {})", text.len());

        let request = EmbedRequest {
            model: &self.embedding_model,
            input: text,
        };
        let response_text = self.post_json("/api/embed", &request)?;

        let embed_response: EmbedResponse = serde_json::from_str(&response_text)
            .map_err(|e| OllamaError::InvalidResponse(format!("embedding: {}", e)))?;

        let embedding = embed_response
            .embeddings
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| OllamaError::InvalidResponse("no embedding returned".to_string()))?;

        debug!("Generated embedding with {} dimensions", embedding.len());
        Ok(embedding)
    }

    /// Run a single non-streaming completion with the configured chat model
    #[inline]
    pub fn generate_completion(&self, prompt: &str) -> Result<String, OllamaError> {
        debug!(
            "Generating completion with {} (prompt length: {})",
            self.chat_model,
            prompt.len()
        );

        let request = GenerateRequest {
            model: &self.chat_model,
            prompt,
            stream: false,
            options: GenerateOptions {
                num_predict: self.max_tokens,
            },
        };
        let response_text = self.post_json("/api/generate", &request)?;

        let generated: GenerateResponse = serde_json::from_str(&response_text)
            .map_err(|e| OllamaError::InvalidResponse(format!("completion: {}", e)))?;

        if !generated.done {
            warn!("Ollama reported an unfinished completion");
        }

        Ok(generated.response.trim().to_string())
    }

    fn endpoint(&self, path: &str) -> Result<Url, OllamaError> {
        self.base_url
            .join(path)
            .map_err(|e| OllamaError::InvalidResponse(format!("bad endpoint {}: {}", path, e)))
    }

    fn post_json<T: Serialize>(&self, path: &str, body: &T) -> Result<String, OllamaError> {
        let url = self.endpoint(path)?;
        let request_json = serde_json::to_string(body)
            .map_err(|e| OllamaError::InvalidResponse(format!("request encoding: {}", e)))?;

        self.make_request_with_retry(|| {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    fn classify_error(&self, error: ureq::Error) -> OllamaError {
        match error {
            ureq::Error::StatusCode(status) => OllamaError::Status(status),
            ureq::Error::Timeout(_) => OllamaError::Timeout(self.timeout),
            ureq::Error::Io(ref e) if e.kind() == io::ErrorKind::TimedOut => {
                OllamaError::Timeout(self.timeout)
            }
            other => OllamaError::Unavailable(other.to_string()),
        }
    }

    fn make_request_with_retry<F>(&self, mut request_fn: F) -> Result<String, OllamaError>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok(response_text) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(response_text);
                }
                Err(error) => {
                    let should_retry = match &error {
                        ureq::Error::StatusCode(status) => {
                            if *status >= 500 {
                                warn!(
                                    "Server error (status {}), attempt {}/{}",
                                    status, attempt, self.retry_attempts
                                );
                                true
                            } else {
                                warn!("Client error (status {}), not retrying", status);
                                false
                            }
                        }
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!(
                                "Transport error: {}, attempt {}/{}",
                                error, attempt, self.retry_attempts
                            );
                            true
                        }
                        _ => {
                            warn!("Non-retryable error: {}", error);
                            false
                        }
                    };

                    let classified = self.classify_error(error);
                    if !should_retry {
                        return Err(classified);
                    }
                    last_error = Some(classified);

                    if attempt < self.retry_attempts {
                        let delay_ms = EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000;
                        let delay = Duration::from_millis(delay_ms);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("All attempts failed for request to {}", self.base_url);

        Err(last_error
            .unwrap_or_else(|| OllamaError::Unavailable("request failed after retries".to_string())))
    }
}

impl OllamaError {
    /// Map a failed completion onto the turn-level error taxonomy
    #[inline]
    pub fn into_generation_error(self) -> AyurbotError {
        match self {
            Self::Timeout(after) => AyurbotError::GenerationTimeout {
                seconds: after.as_secs(),
            },
            other => AyurbotError::GenerationUnavailable(other.to_string()),
        }
    }
}

#[async_trait]
impl Generator for OllamaClient {
    async fn complete(&self, prompt: &str) -> crate::Result<String> {
        let client = self.clone();
        let prompt = prompt.to_string();

        // ureq blocks, so keep it off the async workers
        tokio::task::spawn_blocking(move || client.generate_completion(&prompt))
            .await
            .map_err(|e| AyurbotError::GenerationUnavailable(format!("generation task failed: {}", e)))?
            .map_err(OllamaError::into_generation_error)
    }
}
