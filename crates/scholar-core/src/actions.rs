//! Action Layer: user-triggered entry points.
//!
//! Each handler validates its inputs, invokes one capability, and returns an
//! [`ActionResult`]. Internal errors are logged here and replaced by a fixed
//! user-facing message; they never cross this boundary.

use serde::Serialize;

use crate::html::ReformatResult;
use crate::invoker::CapabilityInvoker;
use crate::{Capability, CoreError, ExtractedText, SectionSuggestion, TemplateFormat, TemplateSpec};

pub const EMPTY_PAPER: &str = "Paper content cannot be empty.";
pub const EMPTY_PAPER_FOR_CHAT: &str = "Paper content cannot be empty to ask questions.";
pub const EMPTY_QUESTION: &str = "Question cannot be empty.";
pub const MISSING_FORMAT: &str = "Template format must be selected.";

pub const SUMMARIZE_FAILED: &str = "Failed to summarize paper. Please try again.";
pub const SUGGEST_FAILED: &str = "Failed to get formatting suggestions. Please try again.";
pub const REFORMAT_FAILED: &str = "Failed to reformat paper. Please try again.";
pub const CHAT_FAILED: &str = "Failed to get answer from chatbot. Please try again.";

/// Lifecycle of one action invocation.
///
/// `Idle -> Validating -> Invoking -> {Succeeded | Failed}`, or
/// `Validating -> Rejected` when input validation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionPhase {
    #[default]
    Idle,
    Validating,
    Invoking,
    Succeeded,
    Failed,
    Rejected,
}

impl ActionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ActionPhase::Succeeded | ActionPhase::Failed | ActionPhase::Rejected
        )
    }

    pub fn can_advance_to(&self, next: ActionPhase) -> bool {
        use ActionPhase::*;
        matches!(
            (self, next),
            (Idle, Validating)
                | (Validating, Invoking)
                | (Validating, Rejected)
                | (Invoking, Succeeded)
                | (Invoking, Failed)
        )
    }
}

/// Uniform `{data, error}` result of an action. Exactly one side is set.
#[derive(Debug, Clone, Serialize)]
pub struct ActionResult<T> {
    data: Option<T>,
    error: Option<String>,
    #[serde(skip)]
    phase: ActionPhase,
}

impl<T> ActionResult<T> {
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            phase: ActionPhase::Succeeded,
        }
    }

    /// A downstream call failed after validation passed.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            data: None,
            error: Some(message.into()),
            phase: ActionPhase::Failed,
        }
    }

    /// Input was rejected before anything downstream ran.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            data: None,
            error: Some(message.into()),
            phase: ActionPhase::Rejected,
        }
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn phase(&self) -> ActionPhase {
        self.phase
    }

    pub fn is_success(&self) -> bool {
        self.data.is_some()
    }

    pub fn into_result(self) -> Result<T, String> {
        match (self.data, self.error) {
            (Some(data), _) => Ok(data),
            (None, Some(error)) => Err(error),
            (None, None) => Err(String::new()),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ActionResult<U> {
        ActionResult {
            data: self.data.map(f),
            error: self.error,
            phase: self.phase,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryData {
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuggestionsData {
    pub suggestions: Vec<SectionSuggestion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReformatData {
    pub reformatted_content: ReformatResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatData {
    pub answer: String,
}

/// Debug-logged phase tracking for one invocation.
struct PhaseLog {
    capability: Capability,
    phase: ActionPhase,
}

impl PhaseLog {
    fn start(capability: Capability) -> Self {
        let mut log = Self {
            capability,
            phase: ActionPhase::Idle,
        };
        log.advance(ActionPhase::Validating);
        log
    }

    fn advance(&mut self, next: ActionPhase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "illegal action transition {:?} -> {:?}",
            self.phase,
            next
        );
        tracing::debug!(
            capability = %self.capability,
            from = ?self.phase,
            to = ?next,
            "action phase"
        );
        self.phase = next;
    }

    fn reject<T>(mut self, message: impl Into<String>) -> ActionResult<T> {
        let message = message.into();
        self.advance(ActionPhase::Rejected);
        tracing::info!(capability = %self.capability, reason = %message, "action rejected");
        ActionResult::rejected(message)
    }

    fn finish<T>(mut self, outcome: Result<T, CoreError>, failure_message: &str) -> ActionResult<T> {
        match outcome {
            Ok(data) => {
                self.advance(ActionPhase::Succeeded);
                ActionResult::success(data)
            }
            Err(e) => {
                self.advance(ActionPhase::Failed);
                tracing::error!(capability = %self.capability, error = %e, "action failed");
                ActionResult::failure(failure_message)
            }
        }
    }
}

/// The action entry points, bound to one invoker.
#[derive(Clone)]
pub struct Actions {
    invoker: CapabilityInvoker,
}

impl Actions {
    pub fn new(invoker: CapabilityInvoker) -> Self {
        Self { invoker }
    }

    pub fn invoker(&self) -> &CapabilityInvoker {
        &self.invoker
    }

    pub async fn handle_summarize(&self, paper_text: &str) -> ActionResult<SummaryData> {
        let mut log = PhaseLog::start(Capability::Summarize);
        let text = match required_text(paper_text, EMPTY_PAPER) {
            Ok(text) => text,
            Err(message) => return log.reject(message),
        };
        log.advance(ActionPhase::Invoking);
        let outcome = self
            .invoker
            .summarize(&text)
            .await
            .map(|summary| SummaryData { summary });
        log.finish(outcome, SUMMARIZE_FAILED)
    }

    pub async fn handle_suggest_formatting(&self, paper_text: &str) -> ActionResult<SuggestionsData> {
        let mut log = PhaseLog::start(Capability::SuggestFormatting);
        let text = match required_text(paper_text, EMPTY_PAPER) {
            Ok(text) => text,
            Err(message) => return log.reject(message),
        };
        log.advance(ActionPhase::Invoking);
        let outcome = self
            .invoker
            .suggest_formatting(&text)
            .await
            .map(|suggestions| SuggestionsData { suggestions });
        log.finish(outcome, SUGGEST_FAILED)
    }

    /// `template_format` is one of IEEE, APA, ACM, Custom (any case).
    /// `custom_template_content` is required for Custom and optional otherwise.
    pub async fn handle_reformat(
        &self,
        paper_text: &str,
        template_format: Option<&str>,
        custom_template_content: Option<&str>,
    ) -> ActionResult<ReformatData> {
        let mut log = PhaseLog::start(Capability::Reformat);
        let text = match required_text(paper_text, EMPTY_PAPER) {
            Ok(text) => text,
            Err(message) => return log.reject(message),
        };
        let spec = match template_spec(template_format, custom_template_content) {
            Ok(spec) => spec,
            Err(message) => return log.reject(message),
        };
        log.advance(ActionPhase::Invoking);
        let outcome = self
            .invoker
            .reformat(&text, &spec)
            .await
            .map(|reformatted_content| ReformatData {
                reformatted_content,
            });
        log.finish(outcome, REFORMAT_FAILED)
    }

    pub async fn handle_chat(&self, paper_text: &str, question: &str) -> ActionResult<ChatData> {
        let mut log = PhaseLog::start(Capability::Chat);
        let text = match required_text(paper_text, EMPTY_PAPER_FOR_CHAT) {
            Ok(text) => text,
            Err(message) => return log.reject(message),
        };
        if question.trim().is_empty() {
            return log.reject(EMPTY_QUESTION);
        }
        log.advance(ActionPhase::Invoking);
        let outcome = self
            .invoker
            .chat(&text, question)
            .await
            .map(|answer| ChatData { answer });
        log.finish(outcome, CHAT_FAILED)
    }
}

fn required_text(value: &str, message: &str) -> Result<ExtractedText, String> {
    let text = ExtractedText::from(value);
    if text.is_blank() {
        return Err(message.to_string());
    }
    Ok(text)
}

fn template_spec(format: Option<&str>, custom: Option<&str>) -> Result<TemplateSpec, String> {
    let format = match format.map(str::trim) {
        Some(f) if !f.is_empty() => f,
        _ => return Err(MISSING_FORMAT.to_string()),
    };
    let format: TemplateFormat = format.parse().map_err(validation_message)?;
    TemplateSpec::new(format, custom.map(ExtractedText::from)).map_err(validation_message)
}

fn validation_message(e: CoreError) -> String {
    match e {
        CoreError::Validation(message) => message,
        other => other.to_string(),
    }
}
