use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde_json::json;

use super::{GenerationBackend, GenerationError, status_error};
use crate::prompt::PromptRequest;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Generative Language API (`models/{model}:generateContent`).
///
/// Requests JSON output constrained by the capability's schema, so the text
/// of the first candidate is expected to be a JSON object.
pub struct GeminiBackend {
    api_key: String,
    model: String,
    base_url: String,
    pub temperature: Option<f32>,
}

impl GeminiBackend {
    pub fn new(api_key: String, model: String) -> Self {
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

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

impl GenerationBackend for GeminiBackend {
    fn name(&self) -> &str {
        "Gemini"
    }

    fn generate<'a>(
        &'a self,
        request: &'a PromptRequest,
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<String, GenerationError>> + Send + 'a>> {
        Box::pin(async move {
            let mut generation_config = json!({
                "responseMimeType": "application/json",
                "responseSchema": request.schema().to_gemini_schema(),
            });
            if let Some(t) = self.temperature {
                generation_config["temperature"] = json!(t);
            }

            let body = json!({
                "contents": [{
                    "role": "user",
                    "parts": [{ "text": request.render() }],
                }],
                "generationConfig": generation_config,
            });

            let resp = client
                .post(self.endpoint())
                .header("x-goog-api-key", &self.api_key)
                .timeout(timeout)
                .json(&body)
                .send()
                .await?;

            if !resp.status().is_success() {
                return Err(status_error(resp).await);
            }

            let data: serde_json::Value = resp.json().await?;
            extract_candidate_text(&data)
        })
    }
}

/// Concatenate the text parts of the first candidate.
fn extract_candidate_text(data: &serde_json::Value) -> Result<String, GenerationError> {
    let Some(candidate) = data["candidates"].as_array().and_then(|c| c.first()) else {
        if let Some(reason) = data["promptFeedback"]["blockReason"].as_str() {
            return Err(GenerationError::Blocked(reason.to_string()));
        }
        return Err(GenerationError::EmptyResponse);
    };

    let text: String = candidate["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["text"].as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return match candidate["finishReason"].as_str() {
            Some(reason @ ("SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT")) => {
                Err(GenerationError::Blocked(reason.to_string()))
            }
            _ => Err(GenerationError::EmptyResponse),
        };
    }
    Ok(text)
}
