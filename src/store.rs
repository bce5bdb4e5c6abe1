//! Message store
//!
//! Holds the ordered conversation log of one chat session. Messages are only
//! ever appended; status changes happen in place so a message never moves.

use crate::{context::ChatContext, Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Who wrote a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    /// The learner using the client
    User,
    /// The remote assistant
    Assistant,
}

/// Delivery status of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Sent, waiting for the backend to settle
    Pending,
    /// Accepted by the backend (or received from it)
    Confirmed,
    /// Rejected or undeliverable
    Failed,
}

impl MessageStatus {
    /// Whether `self -> next` is an allowed transition
    pub fn can_transition_to(self, next: MessageStatus) -> bool {
        matches!(
            (self, next),
            (MessageStatus::Pending, MessageStatus::Confirmed)
                | (MessageStatus::Pending, MessageStatus::Failed)
        )
    }
}

/// Category of a delivery failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Connectivity problem or timeout
    Network,
    /// Backend rejected the message
    Server,
    /// Backend answered with something unreadable
    Protocol,
}

/// Why a message failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Failure category
    pub kind: FailureKind,
    /// Human-readable reason
    pub reason: String,
}

impl Failure {
    /// Build a failure record from a transport error
    ///
    /// Server errors keep the payload text verbatim; other kinds use the
    /// error's display form. Errors that are not delivery failures are
    /// classified as protocol failures.
    pub fn from_error(err: &Error) -> Self {
        let kind = err.failure_kind().unwrap_or(FailureKind::Protocol);
        let reason = match err {
            Error::Server(text) => text.clone(),
            other => other.to_string(),
        };
        Self { kind, reason }
    }
}

/// One turn in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Locally generated id, unique within the session
    pub id: String,
    /// Message author
    pub author: Author,
    /// Trimmed, non-empty text
    pub text: String,
    /// Delivery status
    pub status: MessageStatus,
    /// Course the message is bound to
    pub course_id: Option<u64>,
    /// Document the message is bound to
    pub document_id: Option<u64>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Failure details, set only when `status` is `Failed`
    #[serde(default)]
    pub failure: Option<Failure>,
}

impl Message {
    fn build(
        author: Author,
        text: &str,
        status: MessageStatus,
        context: Option<ChatContext>,
    ) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Validation("message text is empty".to_string()));
        }

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            author,
            text: text.to_string(),
            status,
            course_id: context.map(|c| c.course_id),
            document_id: context.map(|c| c.document_id),
            created_at: Utc::now(),
            failure: None,
        })
    }

    /// Create a pending user message stamped with `context`
    pub fn user(text: &str, context: Option<ChatContext>) -> Result<Self> {
        Self::build(Author::User, text, MessageStatus::Pending, context)
    }

    /// Create an assistant message; these are always confirmed
    pub fn assistant(text: &str, context: Option<ChatContext>) -> Result<Self> {
        Self::build(Author::Assistant, text, MessageStatus::Confirmed, context)
    }

    /// Create a confirmed message loaded from history
    pub fn confirmed(
        author: Author,
        text: &str,
        course_id: Option<u64>,
        document_id: Option<u64>,
        created_at: Option<DateTime<Utc>>,
    ) -> Result<Self> {
        let mut message = Self::build(author, text, MessageStatus::Confirmed, None)?;
        message.course_id = course_id;
        message.document_id = document_id;
        if let Some(ts) = created_at {
            message.created_at = ts;
        }
        Ok(message)
    }

    /// The context this message was sent under, if both ids are present
    pub fn context(&self) -> Option<ChatContext> {
        match (self.course_id, self.document_id) {
            (Some(course_id), Some(document_id)) => Some(ChatContext {
                course_id,
                document_id,
            }),
            _ => None,
        }
    }

    /// Short status marker for text front-ends
    pub fn status_indicator(&self) -> &'static str {
        match self.status {
            MessageStatus::Pending => "…",
            MessageStatus::Confirmed => "✓",
            MessageStatus::Failed => "✗",
        }
    }

    /// Status text including the failure reason when there is one
    pub fn status_text(&self) -> String {
        match (self.status, &self.failure) {
            (MessageStatus::Pending, _) => "sending".to_string(),
            (MessageStatus::Confirmed, _) => "sent".to_string(),
            (MessageStatus::Failed, Some(failure)) => format!("failed: {}", failure.reason),
            (MessageStatus::Failed, None) => "failed".to_string(),
        }
    }
}

/// Ordered, append-only conversation log
#[derive(Debug, Default)]
pub struct MessageStore {
    messages: Vec<Message>,
    index: HashMap<String, usize>,
}

impl MessageStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message at the tail and return its id
    pub fn append(&mut self, message: Message) -> String {
        let id = message.id.clone();
        debug!("Appending {:?} message {}", message.author, id);
        self.index.insert(id.clone(), self.messages.len());
        self.messages.push(message);
        id
    }

    /// Move a pending message to `confirmed` or `failed` in place
    pub fn update_status(&mut self, id: &str, status: MessageStatus) -> Result<()> {
        let message = self.get_mut(id)?;

        if !message.status.can_transition_to(status) {
            return Err(Error::InvalidTransition {
                id: id.to_string(),
                from: message.status,
                to: status,
            });
        }

        debug!("Message {} {:?} -> {:?}", id, message.status, status);
        message.status = status;
        Ok(())
    }

    /// Mark a pending message failed and attach the reason
    pub fn fail(&mut self, id: &str, failure: Failure) -> Result<()> {
        self.update_status(id, MessageStatus::Failed)?;
        self.get_mut(id)?.failure = Some(failure);
        Ok(())
    }

    /// Look up a message by id
    pub fn get(&self, id: &str) -> Option<&Message> {
        self.index.get(id).map(|&pos| &self.messages[pos])
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Message> {
        let pos = *self
            .index
            .get(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        Ok(&mut self.messages[pos])
    }

    /// Copy of the log in insertion order
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
