//! Context binding
//!
//! Tracks the (course, document) pair stamped onto outgoing messages. Ids are
//! passed through as-is; an unknown id only surfaces when the backend rejects
//! a send.

use crate::catalog::{CatalogProvider, Document};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The (course, document) pair scoping a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatContext {
    /// Course id
    pub course_id: u64,
    /// Document id within the course
    pub document_id: u64,
}

/// Holds the active context of a session
#[derive(Debug, Clone, Default)]
pub struct ContextBinder {
    current: Option<ChatContext>,
}

impl ContextBinder {
    /// Create a binder with no context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the active context for messages issued from now on
    pub fn bind(&mut self, course_id: u64, document_id: u64) {
        let context = ChatContext {
            course_id,
            document_id,
        };
        if self.current != Some(context) {
            debug!("Binding context course={} document={}", course_id, document_id);
        }
        self.current = Some(context);
    }

    /// Drop the active context; later messages are context-free
    pub fn clear(&mut self) {
        self.current = None;
    }

    /// The active context, if any
    pub fn current_context(&self) -> Option<ChatContext> {
        self.current
    }

    /// Documents the user can bind for `course_id`
    pub fn choices(catalog: &dyn CatalogProvider, course_id: u64) -> Vec<Document> {
        catalog.documents_for(course_id)
    }
}
