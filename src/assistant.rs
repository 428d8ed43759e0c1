//! Chat with a local language-model server (Ollama's HTTP API).

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AssistantConfig;

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

const GREETING: &str = "Hi! I'm your local assistant. How can I help you today?";
const CLEARED: &str = "Chat cleared. How can I help you?";
const NOT_RUNNING: &str =
    "The assistant server is not running. Start it to use the chat feature.";

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("invalid server url '{0}'")]
    InvalidUrl(String),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server answered {0}")]
    Status(reqwest::StatusCode),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Availability {
    Available,
    Unavailable { reason: String },
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }
}

pub trait Assistant: Send + Sync {
    fn probe(&self) -> Availability;
    fn generate(&self, prompt: &str) -> Result<String, AssistantError>;
}

impl<A: Assistant + ?Sized> Assistant for Box<A> {
    fn probe(&self) -> Availability {
        (**self).probe()
    }

    fn generate(&self, prompt: &str) -> Result<String, AssistantError> {
        (**self).generate(prompt)
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

pub struct AssistantBridge {
    client: Client,
    base_url: String,
    model: String,
}

impl AssistantBridge {
    pub fn new(config: &AssistantConfig) -> Result<Self, AssistantError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if reqwest::Url::parse(&base_url).is_err() {
            return Err(AssistantError::InvalidUrl(config.base_url.clone()));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;
        Ok(Self {
            client,
            base_url,
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

impl Assistant for AssistantBridge {
    fn probe(&self) -> Availability {
        let result = self
            .client
            .get(self.endpoint("api/tags"))
            .timeout(PROBE_TIMEOUT)
            .send();
        match result {
            Ok(resp) if resp.status().is_success() => Availability::Available,
            Ok(resp) => Availability::Unavailable {
                reason: format!("server answered {}", resp.status()),
            },
            Err(e) => Availability::Unavailable {
                reason: e.to_string(),
            },
        }
    }

    fn generate(&self, prompt: &str) -> Result<String, AssistantError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };
        let resp = self
            .client
            .post(self.endpoint("api/generate"))
            .json(&request)
            .send()?;
        if !resp.status().is_success() {
            return Err(AssistantError::Status(resp.status()));
        }
        let body: GenerateResponse = resp.json()?;
        Ok(body.response)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub content: String,
    pub is_user: bool,
    pub timestamp: DateTime<Local>,
}

impl ChatMessage {
    fn user(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_user: true,
            timestamp: Local::now(),
        }
    }

    fn assistant(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_user: false,
            timestamp: Local::now(),
        }
    }
}

/// Conversation history plus the last known server availability.
///
/// Callers that share the session lock it for `begin` and `finish` only;
/// `PendingReply::resolve` talks to the server without it.
pub struct ChatSession<A: Assistant> {
    assistant: Arc<A>,
    messages: Vec<ChatMessage>,
    availability: Availability,
}

/// A user message waiting for its answer.
pub struct PendingReply<A: Assistant> {
    /// `None` when the server was unavailable at `begin`.
    assistant: Option<Arc<A>>,
    prompt: String,
}

impl<A: Assistant> PendingReply<A> {
    /// Blocks until the server answers or fails.
    pub fn resolve(&self) -> String {
        let Some(assistant) = &self.assistant else {
            return NOT_RUNNING.to_string();
        };
        match assistant.generate(&self.prompt) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("Assistant request failed: {}", e);
                format!("Sorry, I encountered an error: {}", e)
            }
        }
    }
}

impl<A: Assistant> ChatSession<A> {
    pub fn new(assistant: A) -> Self {
        let availability = assistant.probe();
        log::info!("Assistant availability: {:?}", availability);
        Self {
            assistant: Arc::new(assistant),
            messages: vec![ChatMessage::assistant(GREETING)],
            availability,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn availability(&self) -> &Availability {
        &self.availability
    }

    /// Handle for probing or generating without holding the session.
    pub fn assistant(&self) -> Arc<A> {
        Arc::clone(&self.assistant)
    }

    pub fn set_availability(&mut self, availability: Availability) -> &Availability {
        self.availability = availability;
        &self.availability
    }

    /// Records a user message. Blank input is ignored.
    pub fn begin(&mut self, input: &str) -> Option<PendingReply<A>> {
        if input.trim().is_empty() {
            return None;
        }
        self.messages.push(ChatMessage::user(input));
        Some(PendingReply {
            assistant: self
                .availability
                .is_available()
                .then(|| Arc::clone(&self.assistant)),
            prompt: input.to_string(),
        })
    }

    /// Records the answer to the last `begin`.
    pub fn finish(&mut self, reply: String) -> &ChatMessage {
        self.messages.push(ChatMessage::assistant(reply));
        &self.messages[self.messages.len() - 1]
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.messages.push(ChatMessage::assistant(CLEARED));
    }
}
