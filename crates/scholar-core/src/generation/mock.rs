//! Mock generation backend for testing.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{GenerationBackend, GenerationError};
use crate::prompt::PromptRequest;

/// A configurable mock response for [`MockGenerator`].
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// Return this JSON value serialized as the model text.
    Json(serde_json::Value),
    /// Return this exact model text.
    Raw(String),
    /// Simulate a 429 rate-limit response.
    RateLimited,
    /// Simulate a non-success HTTP status.
    Status(u16),
}

/// A hand-rolled mock implementing [`GenerationBackend`] for tests.
///
/// Returns responses in order, repeating the last one once the sequence is
/// exhausted. Every rendered prompt is recorded.
pub struct MockGenerator {
    responses: Mutex<Vec<MockResponse>>,
    fallback: MockResponse,
    delay: Option<Duration>,
    call_count: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockGenerator {
    /// Create a mock that always returns `response`.
    pub fn new(response: MockResponse) -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            fallback: response,
            delay: None,
            call_count: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Shorthand for a mock that always answers with `value`.
    pub fn json(value: serde_json::Value) -> Self {
        Self::new(MockResponse::Json(value))
    }

    /// Create a mock that returns responses in order, repeating the last one.
    pub fn with_sequence(mut responses: Vec<MockResponse>) -> Self {
        assert!(
            !responses.is_empty(),
            "sequence must have at least one response"
        );
        // Reverse so we can pop() from the front cheaply.
        responses.reverse();
        let fallback = responses[0].clone();
        Self {
            responses: Mutex::new(responses),
            fallback,
            delay: None,
            call_count: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Set simulated latency per call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many times `generate()` has been called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Rendered prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn next_response(&self) -> MockResponse {
        match self.responses.lock() {
            Ok(mut seq) => seq.pop().unwrap_or_else(|| self.fallback.clone()),
            Err(_) => self.fallback.clone(),
        }
    }
}

impl GenerationBackend for MockGenerator {
    fn name(&self) -> &str {
        "Mock"
    }

    fn generate<'a>(
        &'a self,
        request: &'a PromptRequest,
        _client: &'a reqwest::Client,
        _timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<String, GenerationError>> + Send + 'a>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(request.render());
        }
        let response = self.next_response();
        let delay = self.delay;

        Box::pin(async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }

            match response {
                MockResponse::Json(value) => Ok(value.to_string()),
                MockResponse::Raw(text) => Ok(text),
                MockResponse::RateLimited => Err(GenerationError::RateLimited),
                MockResponse::Status(status) => Err(GenerationError::Status {
                    status,
                    body: "mock failure".into(),
                }),
            }
        })
    }
}
