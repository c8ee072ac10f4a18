//! Generation service backends.
//!
//! The external LLM is an opaque prompt-in/text-out service. Each backend
//! sends one request per call and hands back the raw model text; parsing and
//! schema validation are the invoker's job.

pub mod gemini;
pub mod mock;
pub mod openai;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Config;
use crate::prompt::PromptRequest;

pub use gemini::GeminiBackend;
pub use mock::{MockGenerator, MockResponse};
pub use openai::OpenAiCompatBackend;

/// Longest response body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("generation service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("rate limited (429)")]
    RateLimited,
    #[error("request blocked by the generation service: {0}")]
    Blocked(String),
    #[error("generation service returned no content")]
    EmptyResponse,
    #[error("no API key configured for {0}")]
    MissingApiKey(&'static str),
}

/// Which hosted API to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    #[serde(rename = "openai")]
    OpenAiCompat,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenAiCompat => "openai",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini-2.0-flash",
            ProviderKind::OpenAiCompat => "gpt-4o-mini",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" | "googleai" => Ok(ProviderKind::Gemini),
            "openai" | "openai-compat" | "openai_compat" => Ok(ProviderKind::OpenAiCompat),
            other => Err(format!(
                "unknown provider '{}' (expected 'gemini' or 'openai')",
                other
            )),
        }
    }
}

/// A generation service that turns a prompt into model text.
pub trait GenerationBackend: Send + Sync {
    /// Display name used in logs (e.g. "Gemini").
    fn name(&self) -> &str;

    /// Send `request` once and return the raw text of the model's answer.
    fn generate<'a>(
        &'a self,
        request: &'a PromptRequest,
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<String, GenerationError>> + Send + 'a>>;
}

/// Build the backend selected by `config`.
pub fn backend_from_config(
    config: &Config,
) -> Result<Arc<dyn GenerationBackend>, GenerationError> {
    match config.provider {
        ProviderKind::Gemini => {
            let key = config
                .api_key
                .clone()
                .ok_or(GenerationError::MissingApiKey("Gemini"))?;
            let mut backend = GeminiBackend::new(key, config.model.clone());
            if let Some(ref url) = config.base_url {
                backend = backend.with_base_url(url.clone());
            }
            backend.temperature = config.temperature;
            Ok(Arc::new(backend))
        }
        ProviderKind::OpenAiCompat => {
            // Local OpenAI-compatible servers usually run without a key.
            if config.api_key.is_none() && config.base_url.is_none() {
                return Err(GenerationError::MissingApiKey("OpenAI"));
            }
            let mut backend = OpenAiCompatBackend::new(config.api_key.clone(), config.model.clone());
            if let Some(ref url) = config.base_url {
                backend = backend.with_base_url(url.clone());
            }
            backend.temperature = config.temperature;
            Ok(Arc::new(backend))
        }
    }
}

/// Turn a non-success response into a [`GenerationError`].
pub(crate) async fn status_error(resp: reqwest::Response) -> GenerationError {
    let status = resp.status();
    if status.as_u16() == 429 {
        return GenerationError::RateLimited;
    }
    let body = resp.text().await.unwrap_or_default();
    GenerationError::Status {
        status: status.as_u16(),
        body: truncate(&body, MAX_ERROR_BODY),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}
