use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde_json::json;

use super::{GenerationBackend, GenerationError, status_error};
use crate::prompt::PromptRequest;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const SYSTEM_PROMPT: &str =
    "Respond only with a single JSON object that matches the provided JSON schema.";

/// OpenAI `/chat/completions`, or any server speaking the same protocol.
pub struct OpenAiCompatBackend {
    api_key: Option<String>,
    model: String,
    base_url: String,
    pub temperature: Option<f32>,
}

impl OpenAiCompatBackend {
    pub fn new(api_key: Option<String>, model: String) -> Self {
        Self {
            api_key,
            model,
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: None,
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn request_body(&self, request: &PromptRequest) -> serde_json::Value {
        let mut body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": request.render() },
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": request.capability().name(),
                    "schema": request.schema().to_json_schema(),
                },
            },
        });
        if let Some(t) = self.temperature {
            body["temperature"] = json!(t);
        }
        body
    }
}

impl GenerationBackend for OpenAiCompatBackend {
    fn name(&self) -> &str {
        "OpenAI-compatible"
    }

    fn generate<'a>(
        &'a self,
        request: &'a PromptRequest,
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<String, GenerationError>> + Send + 'a>> {
        Box::pin(async move {
            let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
            let mut req = client
                .post(&url)
                .timeout(timeout)
                .json(&self.request_body(request));
            if let Some(ref key) = self.api_key {
                req = req.bearer_auth(key);
            }

            let resp = req.send().await?;
            if !resp.status().is_success() {
                return Err(status_error(resp).await);
            }

            let data: serde_json::Value = resp.json().await?;
            let choice = &data["choices"][0];
            if choice["finish_reason"].as_str() == Some("content_filter") {
                return Err(GenerationError::Blocked("content_filter".into()));
            }
            match choice["message"]["content"].as_str() {
                Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
                _ => Err(GenerationError::EmptyResponse),
            }
        })
    }
}
