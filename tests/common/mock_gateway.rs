/*!
 * Scripted stand-ins for the chat gateway and the progress sink.
 */

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use lingosub::errors::GatewayError;
use lingosub::gateway::{ChatApi, ChatRequest};
use lingosub::translation::ProgressSink;

/// Gateway double that replays queued responses in order and records
/// every request for assertions.
///
/// When the queue runs dry it answers with the configured fallback, so
/// a test can model an endpoint that keeps returning the same thing.
pub struct ScriptedGateway {
    responses: Mutex<VecDeque<Result<String, GatewayError>>>,
    requests: Mutex<Vec<Value>>,
    fallback: String,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::with_fallback("")
    }

    pub fn with_fallback(fallback: &str) -> Self {
        ScriptedGateway {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            fallback: fallback.to_string(),
        }
    }

    /// Queue a successful response
    pub fn push_ok(&self, response: &str) {
        self.responses.lock().push_back(Ok(response.to_string()));
    }

    /// Queue an error response
    pub fn push_err(&self, error: GatewayError) {
        self.responses.lock().push_back(Err(error));
    }

    /// Number of requests received so far
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// All message contents of the nth request, joined with newlines
    pub fn request_text(&self, call: usize) -> String {
        let requests = self.requests.lock();
        let messages = requests[call]["messages"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        messages
            .iter()
            .filter_map(|message| message["content"].as_str().map(str::to_string))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatApi for ScriptedGateway {
    async fn chat(&self, request: ChatRequest) -> Result<String, GatewayError> {
        self.requests
            .lock()
            .push(serde_json::to_value(&request).expect("request serializes"));
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }

    fn model(&self) -> &str {
        "scripted-model"
    }
}

/// Progress sink that collects everything it is told
#[derive(Default)]
pub struct CollectorSink {
    pub progress: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<String>>,
    pub finished: Mutex<usize>,
}

impl CollectorSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressSink for CollectorSink {
    fn progress(&self, message: &str) {
        self.progress.lock().push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.errors.lock().push(message.to_string());
    }

    fn finished(&self) {
        *self.finished.lock() += 1;
    }
}
