//! Caller-owned session state.
//!
//! Everything a front end keeps between user actions lives in a
//! [`PaperSession`] the caller owns and passes around. Each event that used to
//! be a UI callback is a method here, one per transition.

use std::collections::BTreeSet;

use serde::Serialize;
use thiserror::Error;

use crate::actions::{ActionResult, ChatData, ReformatData, SuggestionsData, SummaryData};
use crate::html::ReformatResult;
use crate::{ExtractedText, SectionSuggestion};

/// Prefix of the AI message shown when a chat question fails.
pub const CHAT_ERROR_PREFIX: &str = "Sorry, I couldn't process that. ";

/// Number of suggestion items expanded when a list is loaded.
pub const INITIALLY_OPEN: usize = 3;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot {action} while {state}")]
pub struct TransitionError {
    pub action: &'static str,
    pub state: &'static str,
}

// ── Upload ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UploadState {
    #[default]
    Idle,
    Extracting {
        filename: Option<String>,
    },
    Extracted {
        filename: Option<String>,
        chars: usize,
    },
    Error(String),
}

impl UploadState {
    pub fn name(&self) -> &'static str {
        match self {
            UploadState::Idle => "idle",
            UploadState::Extracting { .. } => "extracting",
            UploadState::Extracted { .. } => "extracted",
            UploadState::Error(_) => "error",
        }
    }

    /// A file was chosen. Not allowed while another extraction runs.
    pub fn begin(&mut self, filename: Option<String>) -> Result<(), TransitionError> {
        if matches!(self, UploadState::Extracting { .. }) {
            return Err(self.refuse("start an upload"));
        }
        *self = UploadState::Extracting { filename };
        Ok(())
    }

    pub fn complete(&mut self, chars: usize) -> Result<(), TransitionError> {
        let UploadState::Extracting { filename } = self else {
            return Err(self.refuse("complete an upload"));
        };
        *self = UploadState::Extracted {
            filename: filename.take(),
            chars,
        };
        Ok(())
    }

    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), TransitionError> {
        if !matches!(self, UploadState::Extracting { .. }) {
            return Err(self.refuse("fail an upload"));
        }
        *self = UploadState::Error(message.into());
        Ok(())
    }

    pub fn reset(&mut self) {
        *self = UploadState::Idle;
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, UploadState::Extracting { .. })
    }

    fn refuse(&self, action: &'static str) -> TransitionError {
        TransitionError {
            action,
            state: self.name(),
        }
    }
}

// ── Speech ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeechPlayback {
    #[default]
    Idle,
    Speaking,
    Paused,
    Stopped,
}

/// What the speech engine should do after [`SpeechPlayback::play`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechCommand {
    /// Cancel anything queued and speak from the start.
    Start,
    /// Continue a paused utterance.
    Resume,
}

impl SpeechPlayback {
    pub fn name(&self) -> &'static str {
        match self {
            SpeechPlayback::Idle => "idle",
            SpeechPlayback::Speaking => "speaking",
            SpeechPlayback::Paused => "paused",
            SpeechPlayback::Stopped => "stopped",
        }
    }

    /// Play: resumes when paused, otherwise (re)starts from the beginning.
    pub fn play(&mut self) -> SpeechCommand {
        let command = match self {
            SpeechPlayback::Paused => SpeechCommand::Resume,
            _ => SpeechCommand::Start,
        };
        *self = SpeechPlayback::Speaking;
        command
    }

    pub fn pause(&mut self) -> Result<(), TransitionError> {
        if *self != SpeechPlayback::Speaking {
            return Err(self.refuse("pause"));
        }
        *self = SpeechPlayback::Paused;
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), TransitionError> {
        match self {
            SpeechPlayback::Speaking | SpeechPlayback::Paused => {
                *self = SpeechPlayback::Stopped;
                Ok(())
            }
            _ => Err(self.refuse("stop")),
        }
    }

    /// The utterance reached its end.
    pub fn finish(&mut self) {
        *self = SpeechPlayback::Idle;
    }

    /// The speech engine reported an error.
    pub fn fail(&mut self) {
        *self = SpeechPlayback::Idle;
    }

    pub fn is_active(&self) -> bool {
        matches!(self, SpeechPlayback::Speaking | SpeechPlayback::Paused)
    }

    fn refuse(&self, action: &'static str) -> TransitionError {
        TransitionError {
            action,
            state: self.name(),
        }
    }
}

// ── Suggestions ─────────────────────────────────────────────────────────

/// Loaded formatting suggestions and which of them are expanded.
#[derive(Debug, Clone, Default)]
pub struct SuggestionPanel {
    suggestions: Vec<SectionSuggestion>,
    open: BTreeSet<usize>,
}

impl SuggestionPanel {
    /// Replace the list and expand the first [`INITIALLY_OPEN`] items.
    pub fn load(&mut self, suggestions: Vec<SectionSuggestion>) {
        self.open = (0..suggestions.len().min(INITIALLY_OPEN)).collect();
        self.suggestions = suggestions;
    }

    pub fn clear(&mut self) {
        self.suggestions.clear();
        self.open.clear();
    }

    /// Flip one item. Returns its new open state, or `None` if out of range.
    pub fn toggle(&mut self, index: usize) -> Option<bool> {
        if index >= self.suggestions.len() {
            return None;
        }
        if self.open.remove(&index) {
            Some(false)
        } else {
            self.open.insert(index);
            Some(true)
        }
    }

    pub fn is_open(&self, index: usize) -> bool {
        self.open.contains(&index)
    }

    pub fn suggestions(&self) -> &[SectionSuggestion] {
        &self.suggestions
    }

    pub fn is_empty(&self) -> bool {
        self.suggestions.is_empty()
    }

    /// `(display name, suggestion, open)` in list order.
    pub fn items(&self) -> impl Iterator<Item = (String, &str, bool)> + '_ {
        self.suggestions.iter().enumerate().map(|(i, s)| {
            (
                display_name(&s.section_name),
                s.suggestion.as_str(),
                self.is_open(i),
            )
        })
    }
}

/// `"literature_review"` → `"Literature review"`.
pub fn display_name(section_name: &str) -> String {
    let mut chars = section_name.chars();
    match chars.next() {
        Some(first) => {
            let mut out: String = first.to_uppercase().collect();
            out.push_str(&chars.as_str().replace('_', " "));
            out
        }
        None => String::new(),
    }
}

// ── Chat ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Ai,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

// ── Session ─────────────────────────────────────────────────────────────

/// Everything the user is working on in one sitting.
#[derive(Debug, Clone, Default)]
pub struct PaperSession {
    text: String,
    processed: bool,
    summary: Option<String>,
    reformatted: Option<ReformatResult>,
    chat: Vec<ChatMessage>,
    last_error: Option<String>,
    pub upload: UploadState,
    pub speech: SpeechPlayback,
    pub suggestions: SuggestionPanel,
}

impl PaperSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(text: impl Into<String>) -> Self {
        let mut session = Self::new();
        session.set_text(text);
        session
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the paper text. Any change clears the processed flag.
    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text != self.text {
            self.text = text;
            self.processed = false;
        }
    }

    /// The immutable text a request is built from.
    pub fn snapshot(&self) -> ExtractedText {
        ExtractedText::new(self.text.clone())
    }

    pub fn is_processed(&self) -> bool {
        self.processed
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn reformatted(&self) -> Option<&ReformatResult> {
        self.reformatted.as_ref()
    }

    pub fn chat_history(&self) -> &[ChatMessage] {
        &self.chat
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Upload finished: store extracted text or the error message.
    pub fn finish_upload(
        &mut self,
        outcome: Result<ExtractedText, String>,
    ) -> Result<(), TransitionError> {
        match outcome {
            Ok(text) => {
                self.upload.complete(text.char_count())?;
                self.set_text(text.into_string());
                self.last_error = None;
            }
            Err(message) => {
                self.upload.fail(message.clone())?;
                self.last_error = Some(message);
            }
        }
        Ok(())
    }

    pub fn apply_summary(&mut self, result: ActionResult<SummaryData>) {
        match result.into_result() {
            Ok(data) => {
                self.summary = Some(data.summary);
                self.processed = true;
                self.last_error = None;
            }
            Err(e) => self.last_error = Some(e),
        }
    }

    pub fn apply_suggestions(&mut self, result: ActionResult<SuggestionsData>) {
        match result.into_result() {
            Ok(data) => {
                self.suggestions.load(data.suggestions);
                self.processed = true;
                self.last_error = None;
            }
            Err(e) => self.last_error = Some(e),
        }
    }

    pub fn apply_reformat(&mut self, result: ActionResult<ReformatData>) {
        match result.into_result() {
            Ok(data) => {
                self.reformatted = Some(data.reformatted_content);
                self.last_error = None;
            }
            Err(e) => self.last_error = Some(e),
        }
    }

    pub fn push_question(&mut self, question: impl Into<String>) {
        self.chat.push(ChatMessage {
            role: ChatRole::User,
            text: question.into(),
        });
    }

    /// Append the AI side of a chat turn. Failures become an apology message.
    pub fn apply_answer(&mut self, result: ActionResult<ChatData>) {
        let text = match result.into_result() {
            Ok(data) => data.answer,
            Err(e) => format!("{}{}", CHAT_ERROR_PREFIX, e),
        };
        self.chat.push(ChatMessage {
            role: ChatRole::Ai,
            text,
        });
    }

    pub fn clear_chat(&mut self) {
        self.chat.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::CHAT_FAILED;

    #[test]
    fn upload_happy_path() {
        let mut upload = UploadState::default();
        upload.begin(Some("paper.pdf".into())).unwrap();
        assert!(upload.is_busy());
        upload.complete(42).unwrap();
        assert_eq!(
            upload,
            UploadState::Extracted {
                filename: Some("paper.pdf".into()),
                chars: 42
            }
        );
        upload.begin(None).unwrap();
        upload.fail("bad file").unwrap();
        assert_eq!(upload, UploadState::Error("bad file".into()));
    }

    #[test]
    fn upload_rejects_illegal_transitions() {
        let mut upload = UploadState::Idle;
        let err = upload.complete(1).unwrap_err();
        assert_eq!(err.to_string(), "cannot complete an upload while idle");
        upload.begin(None).unwrap();
        assert!(upload.begin(None).is_err());
        upload.reset();
        assert!(upload.fail("x").is_err());
    }

    #[test]
    fn speech_play_pause_resume_stop() {
        let mut speech = SpeechPlayback::default();
        assert!(speech.pause().is_err());
        assert_eq!(speech.play(), SpeechCommand::Start);
        speech.pause().unwrap();
        assert_eq!(speech, SpeechPlayback::Paused);
        assert_eq!(speech.play(), SpeechCommand::Resume);
        speech.stop().unwrap();
        assert_eq!(speech, SpeechPlayback::Stopped);
        assert!(speech.stop().is_err());
        assert_eq!(speech.play(), SpeechCommand::Start);
        speech.finish();
        assert_eq!(speech, SpeechPlayback::Idle);
        speech.play();
        speech.fail();
        assert!(!speech.is_active());
    }

    fn suggestion(name: &str) -> SectionSuggestion {
        SectionSuggestion {
            section_name: name.into(),
            suggestion: format!("about {}", name),
        }
    }

    #[test]
    fn panel_opens_first_three() {
        let mut panel = SuggestionPanel::default();
        panel.load(
            ["abstract", "introduction", "methods", "results", "conclusion"]
                .into_iter()
                .map(suggestion)
                .collect(),
        );
        let open: Vec<bool> = panel.items().map(|(_, _, open)| open).collect();
        assert_eq!(open, [true, true, true, false, false]);
        assert_eq!(panel.toggle(0), Some(false));
        assert_eq!(panel.toggle(4), Some(true));
        assert_eq!(panel.toggle(9), None);

        panel.load(vec![suggestion("abstract")]);
        assert!(panel.is_open(0));
        assert!(!panel.is_open(1));
    }

    #[test]
    fn display_name_capitalizes_and_spaces() {
        assert_eq!(display_name("literature_review"), "Literature review");
        assert_eq!(display_name("abstract"), "Abstract");
        assert_eq!(display_name(""), "");
    }

    #[test]
    fn editing_text_resets_processed() {
        let mut session = PaperSession::with_text("Paper");
        session.apply_summary(ActionResult::success(SummaryData {
            summary: "S".into(),
        }));
        assert!(session.is_processed());
        session.set_text("Paper");
        assert!(session.is_processed());
        session.set_text("Paper v2");
        assert!(!session.is_processed());
        assert_eq!(session.snapshot().as_str(), "Paper v2");
    }

    #[test]
    fn failed_answer_becomes_apology() {
        let mut session = PaperSession::with_text("Paper");
        session.push_question("Why?");
        session.apply_answer(ActionResult::failure(CHAT_FAILED));
        let history = session.chat_history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, ChatRole::User);
        assert_eq!(
            history[1].text,
            format!("Sorry, I couldn't process that. {}", CHAT_FAILED)
        );
    }

    #[test]
    fn finish_upload_sets_text() {
        let mut session = PaperSession::new();
        session.upload.begin(Some("a.docx".into())).unwrap();
        session.finish_upload(Ok("Extracted words".into())).unwrap();
        assert_eq!(session.text(), "Extracted words");
        assert!(session.finish_upload(Ok("again".into())).is_err());
    }

    #[test]
    fn finish_upload_counts_characters() {
        let mut session = PaperSession::new();
        session.upload.begin(None).unwrap();
        session.finish_upload(Ok("Naïve café".into())).unwrap();
        assert_eq!(
            session.upload,
            UploadState::Extracted {
                filename: None,
                chars: 10
            }
        );
    }
}
