//! Chat transport module
//!
//! This module performs the two remote chat operations:
//! - GET history endpoint, mapped into confirmed messages
//! - POST send endpoint with the message text and its context
//!
//! The transport holds no session state and never retries; every failure is
//! classified as a network, server or protocol error and handed back.

use crate::{
    config::ChatConfig,
    store::{Author, Message},
    Error, Result,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// Body of a send request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SendRequest {
    /// Message text
    pub chat: String,
    /// Course context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<u64>,
    /// Document context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_id: Option<u64>,
}

/// Body of a successful send response
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SendResponse {
    /// Assistant reply, absent when there is none
    #[serde(default)]
    pub ai_response: Option<String>,
}

/// Error payload of a rejected request
#[derive(Debug, Clone, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Reply to a sent message; empty text means no reply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssistantReply {
    /// Reply text
    pub text: String,
}

impl AssistantReply {
    /// Whether the backend produced no reply
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A history entry as returned by the backend
///
/// Entries are either bare strings or objects with a text field and an
/// optional author.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ServerMessage {
    /// Bare text, treated as user-authored
    Text(String),
    /// Structured record
    Record(ServerRecord),
}

/// Structured history entry
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServerRecord {
    /// Message text
    #[serde(alias = "chat", alias = "content", alias = "message")]
    pub text: String,
    /// Author label (`user`, `assistant`, `ai`, ...)
    #[serde(default, alias = "role", alias = "sender")]
    pub author: Option<String>,
    /// Course context
    #[serde(default)]
    pub course_id: Option<u64>,
    /// Document context
    #[serde(default, alias = "document_id")]
    pub pdf_id: Option<u64>,
    /// Creation time
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl ServerMessage {
    /// Convert into a confirmed message; fails on blank text
    pub fn into_message(self) -> Result<Message> {
        match self {
            ServerMessage::Text(text) => Message::confirmed(Author::User, &text, None, None, None),
            ServerMessage::Record(record) => {
                let author = match record.author.as_deref().map(str::to_ascii_lowercase) {
                    Some(label) if matches!(label.as_str(), "assistant" | "ai" | "bot" | "system") => {
                        Author::Assistant
                    }
                    _ => Author::User,
                };
                Message::confirmed(
                    author,
                    &record.text,
                    record.course_id,
                    record.pdf_id,
                    record.created_at,
                )
            }
        }
    }
}

/// Remote chat operations
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Fetch the stored conversation, oldest first
    async fn fetch_history(&self) -> Result<Vec<Message>>;

    /// Send a message with optional context and return the assistant reply
    async fn send(
        &self,
        text: &str,
        course_id: Option<u64>,
        document_id: Option<u64>,
    ) -> Result<AssistantReply>;
}

/// HTTP implementation of [`ChatTransport`]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    history_url: String,
    send_url: String,
}

impl HttpTransport {
    /// Create a transport for the backend described by `config`
    ///
    /// # Example
    /// ```rust,no_run
    /// use coursechat::config::ChatConfig;
    /// use coursechat::transport::{ChatTransport, HttpTransport};
    ///
    /// # async fn example() -> coursechat::Result<()> {
    /// let transport = HttpTransport::new(&ChatConfig::default())?;
    /// let reply = transport.send("What is a derivative?", Some(1), Some(1)).await?;
    /// println!("{}", reply.text);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(config: &ChatConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            history_url: config.endpoint(&config.history_path),
            send_url: config.endpoint(&config.send_path),
        })
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn fetch_history(&self) -> Result<Vec<Message>> {
        info!("Fetching chat history from {}", self.history_url);

        let response = self
            .client
            .get(&self.history_url)
            .send()
            .await
            .map_err(|e| network_error("History request", &self.history_url, e))?;

        let status = response.status();
        let body = read_body(response, &self.history_url).await?;

        if !status.is_success() {
            warn!("History fetch failed with status {}: {}", status, self.history_url);
            let detail = error_text(&body).unwrap_or_else(|| status_line(status));
            return Err(Error::Protocol(format!(
                "History fetch failed with status {}: {}",
                status.as_u16(),
                detail
            )));
        }

        // Decoded per entry; undecodable records are skipped
        let entries: Vec<serde_json::Value> = serde_json::from_slice(&body).map_err(|e| {
            error!("Malformed history payload from {}: {}", self.history_url, e);
            Error::Protocol(format!("Malformed history payload: {}", e))
        })?;

        let mut messages = Vec::with_capacity(entries.len());
        for (position, value) in entries.into_iter().enumerate() {
            let decoded = serde_json::from_value::<ServerMessage>(value)
                .map_err(Error::from)
                .and_then(ServerMessage::into_message);
            match decoded {
                Ok(message) => messages.push(message),
                Err(e) => warn!("Skipping history entry {}: {}", position, e),
            }
        }

        info!("Fetched {} history messages", messages.len());
        Ok(messages)
    }

    async fn send(
        &self,
        text: &str,
        course_id: Option<u64>,
        document_id: Option<u64>,
    ) -> Result<AssistantReply> {
        info!(
            "Sending message to {} (course: {:?}, document: {:?})",
            self.send_url, course_id, document_id
        );

        let request = SendRequest {
            chat: text.to_string(),
            course_id,
            pdf_id: document_id,
        };

        let response = self
            .client
            .post(&self.send_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| network_error("Send", &self.send_url, e))?;

        let status = response.status();
        let body = read_body(response, &self.send_url).await?;

        if !status.is_success() {
            warn!("Send failed with status {}: {}", status, self.send_url);
            return Err(match error_text(&body) {
                Some(text) => Error::Server(text),
                None => Error::Protocol(format!(
                    "Send failed with status {} and no error payload",
                    status.as_u16()
                )),
            });
        }

        if body.iter().all(u8::is_ascii_whitespace) {
            debug!("Empty send response body, treating as no reply");
            return Ok(AssistantReply::default());
        }

        let parsed: SendResponse = serde_json::from_slice(&body).map_err(|e| {
            error!("Malformed send response from {}: {}", self.send_url, e);
            Error::Protocol(format!("Malformed send response: {}", e))
        })?;

        info!("Message accepted by {}", self.send_url);
        Ok(AssistantReply {
            text: parsed.ai_response.unwrap_or_default(),
        })
    }
}

/// Classify a failed request as a network error
pub(crate) fn network_error(what: &str, url: &str, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        error!("{} to {} timed out: {}", what, url, e);
        Error::Network(format!("{} timed out: {}", what, e))
    } else {
        error!("{} to {} failed: {}", what, url, e);
        Error::Network(format!("{} failed: {}", what, e))
    }
}

/// Read a response body; a connection dropped mid-body is a network error
pub(crate) async fn read_body(response: reqwest::Response, url: &str) -> Result<Vec<u8>> {
    response
        .bytes()
        .await
        .map(|b| b.to_vec())
        .map_err(|e| network_error("Reading response", url, e))
}

/// Extract the human-readable text of an error payload
pub(crate) fn error_text(body: &[u8]) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_slice(body).ok()?;
    parsed
        .error
        .or(parsed.message)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

fn status_line(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("unknown status")
        .to_string()
}
