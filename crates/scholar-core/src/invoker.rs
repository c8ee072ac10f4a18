//! Capability Invoker: one generation call per request, then validation of the
//! returned JSON against the capability's output schema.

use std::sync::Arc;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::generation::GenerationBackend;
use crate::html::{self, ReformatResult};
use crate::prompt::{self, FieldKind, PromptRequest};
use crate::{Capability, Config, CoreError, ExtractedText, SectionSuggestion, TemplateSpec};

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\s*```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)\s*```\s*$").unwrap());

/// Sends built requests to a [`GenerationBackend`] and shapes the answers.
///
/// Holds no per-request state, so one invoker can serve concurrent calls.
#[derive(Clone)]
pub struct CapabilityInvoker {
    backend: Arc<dyn GenerationBackend>,
    client: reqwest::Client,
    timeout: Duration,
}

impl CapabilityInvoker {
    pub fn new(backend: Arc<dyn GenerationBackend>, config: &Config) -> Self {
        let client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self::with_client(backend, client, config.request_timeout())
    }

    pub fn with_client(
        backend: Arc<dyn GenerationBackend>,
        client: reqwest::Client,
        timeout: Duration,
    ) -> Self {
        Self {
            backend,
            client,
            timeout,
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Send `request` once and return the raw model text.
    pub async fn generate(&self, request: &PromptRequest) -> Result<String, CoreError> {
        let capability = request.capability();
        tracing::debug!(
            capability = %capability,
            backend = self.backend.name(),
            "invoking capability"
        );
        let start = Instant::now();
        let raw = self
            .backend
            .generate(request, &self.client, self.timeout)
            .await?;
        tracing::info!(
            capability = %capability,
            backend = self.backend.name(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            response_len = raw.len(),
            "generation completed"
        );
        Ok(raw)
    }

    /// Generate, parse, and check every required field of the request's schema.
    pub async fn invoke(&self, request: &PromptRequest) -> Result<Map<String, Value>, CoreError> {
        let raw = self.generate(request).await?;
        let object = parse_response(request.capability(), &raw)?;
        check_required(request, &object)?;
        Ok(object)
    }

    pub async fn summarize(&self, paper_text: &ExtractedText) -> Result<String, CoreError> {
        let request = prompt::summarize(paper_text);
        let object = self.invoke(&request).await?;
        text_field(Capability::Summarize, &object, "summary")
    }

    /// Formatting suggestions in paper order.
    ///
    /// A response that is unparseable or lacks a `suggestions` array yields an
    /// empty list. Only a failed generation call is an error.
    pub async fn suggest_formatting(
        &self,
        paper_text: &ExtractedText,
    ) -> Result<Vec<SectionSuggestion>, CoreError> {
        let request = prompt::suggest_formatting(paper_text);
        let raw = self.generate(&request).await?;
        match parse_response(Capability::SuggestFormatting, &raw) {
            Ok(object) => Ok(suggestions_from(object.get("suggestions"))),
            Err(e) => {
                tracing::warn!(error = %e, "treating unparseable suggestions as empty");
                Ok(Vec::new())
            }
        }
    }

    pub async fn reformat(
        &self,
        paper_text: &ExtractedText,
        template: &TemplateSpec,
    ) -> Result<ReformatResult, CoreError> {
        let request = prompt::reformat(paper_text, template);
        let object = self.invoke(&request).await?;
        let raw_html = text_field(Capability::Reformat, &object, "reformattedContent")?;
        let result = html::sanitize(&raw_html);
        if result.text_is_blank() {
            return Err(CoreError::SchemaValidation {
                capability: Capability::Reformat,
                reason: "reformattedContent has no text after sanitizing".into(),
            });
        }
        if result.as_str().len() != raw_html.trim().len() {
            tracing::debug!(
                before = raw_html.len(),
                after = result.as_str().len(),
                "sanitized reformatted content"
            );
        }
        Ok(result)
    }

    pub async fn chat(&self, paper_text: &ExtractedText, question: &str) -> Result<String, CoreError> {
        let request = prompt::chat(paper_text, question);
        let object = self.invoke(&request).await?;
        text_field(Capability::Chat, &object, "answer")
    }
}

/// Remove a surrounding Markdown code fence, if any.
pub fn strip_code_fences(raw: &str) -> &str {
    match CODE_FENCE.captures(raw).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => raw.trim(),
    }
}

/// Parse model text as a JSON object.
pub fn parse_response(capability: Capability, raw: &str) -> Result<Map<String, Value>, CoreError> {
    let body = strip_code_fences(raw);
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(CoreError::SchemaValidation {
            capability,
            reason: format!("expected a JSON object, got {}", json_kind(&other)),
        }),
        Err(e) => Err(CoreError::SchemaValidation {
            capability,
            reason: format!("response is not valid JSON: {}", e),
        }),
    }
}

fn check_required(request: &PromptRequest, object: &Map<String, Value>) -> Result<(), CoreError> {
    for field in request.schema().fields {
        if field.required && field.kind == FieldKind::Text {
            text_field(request.capability(), object, field.name)?;
        }
    }
    Ok(())
}

fn text_field(
    capability: Capability,
    object: &Map<String, Value>,
    name: &str,
) -> Result<String, CoreError> {
    match object.get(name) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(Value::String(_)) => Err(CoreError::SchemaValidation {
            capability,
            reason: format!("field '{}' is empty", name),
        }),
        Some(other) => Err(CoreError::SchemaValidation {
            capability,
            reason: format!("field '{}' should be a string, got {}", name, json_kind(other)),
        }),
        None => Err(CoreError::SchemaValidation {
            capability,
            reason: format!("missing required field '{}'", name),
        }),
    }
}

/// Keep well-formed `{sectionName, suggestion}` entries in order.
pub fn suggestions_from(value: Option<&Value>) -> Vec<SectionSuggestion> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let name = item.get("sectionName")?.as_str()?.trim();
            let suggestion = item.get("suggestion")?.as_str()?.trim();
            if name.is_empty() || suggestion.is_empty() {
                return None;
            }
            Some(SectionSuggestion {
                section_name: name.to_string(),
                suggestion: suggestion.to_string(),
            })
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
