use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod actions;
pub mod backend;
pub mod config_file;
pub mod generation;
pub mod html;
pub mod invoker;
pub mod prompt;
pub mod session;

// Re-export for convenience
pub use actions::{ActionPhase, ActionResult, Actions};
pub use backend::{BackendError, PdfBackend};
pub use generation::{GenerationBackend, GenerationError, ProviderKind};
pub use html::ReformatResult;
pub use invoker::CapabilityInvoker;
pub use prompt::PromptRequest;

/// MIME type browsers send for PDF uploads.
pub const PDF_MIME: &str = "application/pdf";
/// MIME type browsers send for Word (.docx) uploads.
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Declared media type of an uploaded document.
///
/// Dispatch happens on this tag alone; the bytes are never sniffed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaType {
    Pdf,
    Docx,
    /// Anything else, carrying what the client declared.
    Unsupported(String),
}

impl MediaType {
    /// Map a declared MIME type (parameters such as `; charset=` are ignored).
    pub fn from_mime(mime: &str) -> Self {
        let essence = mime.split(';').next().unwrap_or("").trim().to_lowercase();
        match essence.as_str() {
            PDF_MIME => MediaType::Pdf,
            DOCX_MIME => MediaType::Docx,
            _ => MediaType::Unsupported(mime.trim().to_string()),
        }
    }

    /// Map a filename by extension. Used when the caller declared no MIME type.
    pub fn from_filename(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.ends_with(".pdf") {
            MediaType::Pdf
        } else if lower.ends_with(".docx") {
            MediaType::Docx
        } else {
            let ext = lower.rsplit_once('.').map(|(_, e)| e).unwrap_or("");
            MediaType::Unsupported(if ext.is_empty() {
                "unknown".to_string()
            } else {
                format!(".{}", ext)
            })
        }
    }

    pub fn label(&self) -> &str {
        match self {
            MediaType::Pdf => "PDF",
            MediaType::Docx => "DOCX",
            MediaType::Unsupported(declared) => declared,
        }
    }
}

/// An uploaded document awaiting extraction.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    media_type: MediaType,
    bytes: Vec<u8>,
    filename: Option<String>,
}

impl SourceDocument {
    pub fn new(media_type: MediaType, bytes: Vec<u8>) -> Self {
        Self {
            media_type,
            bytes,
            filename: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn media_type(&self) -> &MediaType {
        &self.media_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }
}

/// Plain text of a paper, in page/paragraph order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractedText(String);

impl ExtractedText {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Number of Unicode scalar values.
    pub fn char_count(&self) -> usize {
        self.0.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for ExtractedText {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ExtractedText {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for ExtractedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Target layout for reformatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateFormat {
    #[serde(rename = "IEEE")]
    Ieee,
    #[serde(rename = "APA")]
    Apa,
    #[serde(rename = "ACM")]
    Acm,
    Custom,
}

impl TemplateFormat {
    pub const ALL: [TemplateFormat; 4] = [
        TemplateFormat::Ieee,
        TemplateFormat::Apa,
        TemplateFormat::Acm,
        TemplateFormat::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateFormat::Ieee => "IEEE",
            TemplateFormat::Apa => "APA",
            TemplateFormat::Acm => "ACM",
            TemplateFormat::Custom => "Custom",
        }
    }
}

impl fmt::Display for TemplateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        TemplateFormat::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Unknown template format '{}'. Choose IEEE, APA, ACM, or Custom.",
                    trimmed
                ))
            })
    }
}

/// A template selection. `Custom` always carries a non-blank exemplar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSpec {
    format: TemplateFormat,
    exemplar: Option<ExtractedText>,
}

impl TemplateSpec {
    /// Build a spec. A blank exemplar counts as absent; `Custom` without one fails.
    pub fn new(format: TemplateFormat, exemplar: Option<ExtractedText>) -> Result<Self, CoreError> {
        let exemplar = exemplar.filter(|e| !e.is_blank());
        if format == TemplateFormat::Custom && exemplar.is_none() {
            return Err(CoreError::Validation(
                "Custom template content is required when using the Custom format.".to_string(),
            ));
        }
        Ok(Self { format, exemplar })
    }

    pub fn standard(format: TemplateFormat) -> Result<Self, CoreError> {
        Self::new(format, None)
    }

    pub fn format(&self) -> TemplateFormat {
        self.format
    }

    pub fn exemplar(&self) -> Option<&ExtractedText> {
        self.exemplar.as_ref()
    }
}

/// One entry of the formatting-suggestions list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionSuggestion {
    pub section_name: String,
    pub suggestion: String,
}

/// The AI-backed operations the assistant offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Summarize,
    SuggestFormatting,
    Reformat,
    Chat,
}

impl Capability {
    pub fn name(&self) -> &'static str {
        match self {
            Capability::Summarize => "summarize",
            Capability::SuggestFormatting => "suggestFormatting",
            Capability::Reformat => "reformat",
            Capability::Chat => "chat",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),
    #[error("response did not match the {capability} schema: {reason}")]
    SchemaValidation {
        capability: Capability,
        reason: String,
    },
}

/// Runtime configuration for the generation service and the server.
#[derive(Clone)]
pub struct Config {
    pub provider: ProviderKind,
    pub api_key: Option<String>,
    pub model: String,
    /// Override for the provider's API root (e.g. a local OpenAI-compatible server).
    pub base_url: Option<String>,
    pub request_timeout_secs: u64,
    pub temperature: Option<f32>,
    pub bind_addr: String,
    pub max_upload_mb: u32,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("temperature", &self.temperature)
            .field("bind_addr", &self.bind_addr)
            .field("max_upload_mb", &self.max_upload_mb)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Gemini,
            api_key: None,
            model: ProviderKind::Gemini.default_model().to_string(),
            base_url: None,
            request_timeout_secs: 120,
            temperature: None,
            bind_addr: "0.0.0.0:9002".to_string(),
            max_upload_mb: 25,
        }
    }
}

impl Config {
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb as usize * 1024 * 1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_type_from_mime() {
        assert_eq!(MediaType::from_mime("application/pdf"), MediaType::Pdf);
        assert_eq!(MediaType::from_mime(DOCX_MIME), MediaType::Docx);
        assert_eq!(
            MediaType::from_mime("Application/PDF; charset=binary"),
            MediaType::Pdf
        );
        assert_eq!(
            MediaType::from_mime("text/plain"),
            MediaType::Unsupported("text/plain".into())
        );
    }

    #[test]
    fn media_type_from_filename() {
        assert_eq!(MediaType::from_filename("Paper.PDF"), MediaType::Pdf);
        assert_eq!(MediaType::from_filename("draft.docx"), MediaType::Docx);
        assert_eq!(
            MediaType::from_filename("old.doc"),
            MediaType::Unsupported(".doc".into())
        );
        assert_eq!(
            MediaType::from_filename("README"),
            MediaType::Unsupported("unknown".into())
        );
    }

    #[test]
    fn char_count_differs_from_byte_len() {
        let text = ExtractedText::from("Résumé");
        assert_eq!(text.char_count(), 6);
        assert_eq!(text.len(), 8);
    }

    #[test]
    fn template_format_parses_case_insensitively() {
        assert_eq!("ieee".parse::<TemplateFormat>().unwrap(), TemplateFormat::Ieee);
        assert_eq!(" APA ".parse::<TemplateFormat>().unwrap(), TemplateFormat::Apa);
        assert_eq!("custom".parse::<TemplateFormat>().unwrap(), TemplateFormat::Custom);
        let err = "MLA".parse::<TemplateFormat>().unwrap_err();
        assert!(err.to_string().contains("MLA"));
    }

    #[test]
    fn custom_template_requires_exemplar() {
        assert!(TemplateSpec::new(TemplateFormat::Custom, None).is_err());
        assert!(TemplateSpec::new(TemplateFormat::Custom, Some("  \n".into())).is_err());
        let spec =
            TemplateSpec::new(TemplateFormat::Custom, Some("Title\n\nAbstract".into())).unwrap();
        assert_eq!(spec.exemplar().unwrap().as_str(), "Title\n\nAbstract");
    }

    #[test]
    fn standard_template_drops_blank_exemplar() {
        let spec = TemplateSpec::new(TemplateFormat::Ieee, Some("   ".into())).unwrap();
        assert!(spec.exemplar().is_none());
        assert_eq!(spec.format().to_string(), "IEEE");
    }

    #[test]
    fn section_suggestion_uses_camel_case() {
        let s = SectionSuggestion {
            section_name: "introduction".into(),
            suggestion: "State the problem.".into(),
        };
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["sectionName"], "introduction");
    }

    #[test]
    fn config_debug_redacts_key() {
        let config = Config {
            api_key: Some("secret-key".into()),
            ..Config::default()
        };
        let dbg = format!("{:?}", config);
        assert!(!dbg.contains("secret-key"));
        assert!(dbg.contains("***"));
    }
}
