//! Chat session controller
//!
//! Drives one conversation from user intent to a settled message:
//! - hydrates the message store from history once on mount
//! - appends outgoing messages optimistically as `pending`
//! - confirms or fails them in place when the transport settles
//! - appends assistant replies after the message they answer
//!
//! The store is only touched between transport awaits, so concurrent submits
//! interleave without reordering the log. After [`ChatSession::unmount`] any
//! settling call is observed but never applied.

use crate::{
    auth::{AuthClient, Identity},
    config::RetryPolicy,
    context::{ChatContext, ContextBinder},
    store::{Author, Failure, FailureKind, Message, MessageStatus, MessageStore},
    transport::ChatTransport,
    Error, Result,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Lifecycle phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Waiting for the history fetch
    Hydrating,
    /// Accepting input
    Ready,
    /// View is gone; nothing is applied anymore
    Unmounted,
}

/// Result of hydrating a session from history
#[derive(Debug, Clone, PartialEq)]
pub enum HydrationOutcome {
    /// History loaded with this many messages
    Loaded(usize),
    /// History could not be loaded; the session is ready with an empty log
    Failed(Failure),
    /// Session was unmounted before history arrived
    Discarded,
}

/// Result of submitting or resending a message
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Blank input, nothing happened
    Ignored,
    /// Backend accepted the message
    Confirmed {
        /// The user message
        message_id: String,
        /// The assistant reply, if the backend sent one
        reply_id: Option<String>,
    },
    /// Message was marked failed
    Failed {
        /// The user message
        message_id: String,
        /// Why it failed
        failure: Failure,
    },
    /// Session was unmounted while the send was in flight
    Discarded {
        /// The user message
        message_id: String,
    },
}

/// A message that has been appended and is about to be sent
struct Outgoing {
    id: String,
    text: String,
    context: Option<ChatContext>,
}

#[derive(Debug)]
struct SessionState {
    phase: SessionPhase,
    store: MessageStore,
    binder: ContextBinder,
    draft: String,
    load_warning: Option<Failure>,
    hydration_started: bool,
}

impl SessionState {
    fn ensure_ready(&self) -> Result<()> {
        match self.phase {
            SessionPhase::Ready => Ok(()),
            SessionPhase::Hydrating => Err(Error::NotReady("history is still loading".to_string())),
            SessionPhase::Unmounted => Err(Error::NotReady("session was unmounted".to_string())),
        }
    }

    /// Clear the draft and append a pending message for `raw`
    fn issue(&mut self, raw: &str, context: Option<ChatContext>) -> Result<Outgoing> {
        self.ensure_ready()?;
        self.draft.clear();

        let message = Message::user(raw, context)?;
        let text = message.text.clone();
        let id = self.store.append(message);

        Ok(Outgoing { id, text, context })
    }
}

/// One active conversation bound to a view's lifetime
///
/// # Example
/// ```rust,no_run
/// use coursechat::auth::HttpAuthClient;
/// use coursechat::config::ChatConfig;
/// use coursechat::session::{ChatSession, SubmitOutcome};
/// use coursechat::transport::HttpTransport;
/// use std::sync::Arc;
///
/// # async fn example() -> coursechat::Result<()> {
/// let config = ChatConfig::default();
/// let auth = HttpAuthClient::new(&config)?;
/// auth.login("ana", "secret").await?;
///
/// let transport = HttpTransport::new(&config)?;
/// let (session, _history) =
///     ChatSession::mount(Arc::new(transport), Arc::new(auth), config.retry.clone()).await?;
///
/// session.bind(1, 1).await;
/// if let SubmitOutcome::Failed { failure, .. } = session.submit("What is a derivative?").await? {
///     println!("Send failed: {}", failure.reason);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ChatSession {
    state: Arc<Mutex<SessionState>>,
    transport: Arc<dyn ChatTransport>,
    auth: Arc<dyn AuthClient>,
    retry: RetryPolicy,
}

impl ChatSession {
    /// Create a session in the `Hydrating` phase
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        auth: Arc<dyn AuthClient>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState {
                phase: SessionPhase::Hydrating,
                store: MessageStore::new(),
                binder: ContextBinder::new(),
                draft: String::new(),
                load_warning: None,
                hydration_started: false,
            })),
            transport,
            auth,
            retry,
        }
    }

    /// Create a session and hydrate it from history
    pub async fn mount(
        transport: Arc<dyn ChatTransport>,
        auth: Arc<dyn AuthClient>,
        retry: RetryPolicy,
    ) -> Result<(Self, HydrationOutcome)> {
        let session = Self::new(transport, auth, retry);
        let outcome = session.hydrate().await?;
        Ok((session, outcome))
    }

    fn identity(&self) -> Result<Identity> {
        self.auth.current_user().ok_or(Error::Unauthenticated)
    }

    /// Load history into the store and move to `Ready`
    ///
    /// A failed fetch is not fatal: the session becomes ready with an empty
    /// log and the failure is kept as [`ChatSession::load_warning`].
    pub async fn hydrate(&self) -> Result<HydrationOutcome> {
        let identity = self.identity()?;

        {
            let mut state = self.state.lock().await;
            if state.phase != SessionPhase::Hydrating {
                return Err(Error::NotReady(format!(
                    "cannot hydrate a session in phase {:?}",
                    state.phase
                )));
            }
            // Claimed before the fetch so a concurrent caller cannot load the log twice
            if state.hydration_started {
                return Err(Error::NotReady(
                    "hydration is already in progress".to_string(),
                ));
            }
            state.hydration_started = true;
        }

        info!("Hydrating chat session for {}", identity.username);
        let result = self.transport.fetch_history().await;

        let mut state = self.state.lock().await;
        if state.phase == SessionPhase::Unmounted {
            debug!("History settled after unmount, ignoring");
            return Ok(HydrationOutcome::Discarded);
        }

        let outcome = match result {
            Ok(messages) => {
                let count = messages.len();
                for message in messages {
                    state.store.append(message);
                }
                info!("Session ready with {} history messages", count);
                HydrationOutcome::Loaded(count)
            }
            Err(e) => {
                warn!("Failed to load chat history: {}. Starting with an empty log.", e);
                let failure = Failure::from_error(&e);
                state.load_warning = Some(failure.clone());
                HydrationOutcome::Failed(failure)
            }
        };
        state.phase = SessionPhase::Ready;

        Ok(outcome)
    }

    /// Send `raw_text` under the current context
    ///
    /// Blank input is ignored. Otherwise the draft is cleared, a pending
    /// message is appended, and the call settles when the backend answers.
    pub async fn submit(&self, raw_text: &str) -> Result<SubmitOutcome> {
        if raw_text.trim().is_empty() {
            debug!("Ignoring blank submit");
            return Ok(SubmitOutcome::Ignored);
        }
        self.identity()?;

        let outgoing = {
            let mut state = self.state.lock().await;
            let context = state.binder.current_context();
            state.issue(raw_text, context)?
        };

        self.deliver(outgoing).await
    }

    /// Take the current draft and submit it
    pub async fn submit_draft(&self) -> Result<SubmitOutcome> {
        self.identity()?;

        let outgoing = {
            let mut state = self.state.lock().await;
            if state.draft.trim().is_empty() {
                debug!("Ignoring blank draft");
                return Ok(SubmitOutcome::Ignored);
            }
            let raw = std::mem::take(&mut state.draft);
            let context = state.binder.current_context();
            state.issue(&raw, context)?
        };

        self.deliver(outgoing).await
    }

    /// Send a failed message again as a new message
    ///
    /// The failed entry stays where it is; the copy is appended at the tail
    /// with the original text and context.
    pub async fn resend(&self, failed_id: &str) -> Result<SubmitOutcome> {
        self.identity()?;

        let outgoing = {
            let mut state = self.state.lock().await;
            state.ensure_ready()?;

            let original = state
                .store
                .get(failed_id)
                .ok_or_else(|| Error::NotFound(failed_id.to_string()))?;

            if original.author != Author::User || original.status != MessageStatus::Failed {
                return Err(Error::InvalidTransition {
                    id: failed_id.to_string(),
                    from: original.status,
                    to: MessageStatus::Pending,
                });
            }

            let text = original.text.clone();
            let context = original.context();
            info!("Resending failed message {}", failed_id);
            state.issue(&text, context)?
        };

        self.deliver(outgoing).await
    }

    async fn deliver(&self, outgoing: Outgoing) -> Result<SubmitOutcome> {
        let Outgoing { id, text, context } = outgoing;
        let course_id = context.map(|c| c.course_id);
        let document_id = context.map(|c| c.document_id);

        let mut attempt = 1;
        let result = loop {
            match self.transport.send(&text, course_id, document_id).await {
                Err(e @ Error::Network(_)) if self.retry.should_retry(attempt) => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        "Send of {} failed (attempt {}): {}. Retrying in {:?}",
                        id, attempt, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    if self.phase().await == SessionPhase::Unmounted {
                        debug!("Session unmounted during backoff, dropping {}", id);
                        return Ok(SubmitOutcome::Discarded { message_id: id });
                    }
                    attempt += 1;
                }
                other => break other,
            }
        };

        let mut state = self.state.lock().await;
        if state.phase == SessionPhase::Unmounted {
            debug!("Send of {} settled after unmount, ignoring", id);
            return Ok(SubmitOutcome::Discarded { message_id: id });
        }

        match result {
            Ok(reply) => {
                contract(state.store.update_status(&id, MessageStatus::Confirmed))?;
                info!("Message {} confirmed", id);

                let reply_id = if reply.is_empty() {
                    debug!("No assistant reply for {}", id);
                    None
                } else {
                    let message = Message::assistant(&reply.text, context)?;
                    Some(state.store.append(message))
                };

                Ok(SubmitOutcome::Confirmed {
                    message_id: id,
                    reply_id,
                })
            }
            Err(e) => {
                let failure = Failure::from_error(&e);
                match failure.kind {
                    FailureKind::Protocol => error!("Message {} failed: {}", id, e),
                    FailureKind::Network | FailureKind::Server => {
                        warn!("Message {} failed: {}", id, e)
                    }
                }
                contract(state.store.fail(&id, failure.clone()))?;

                Ok(SubmitOutcome::Failed {
                    message_id: id,
                    failure,
                })
            }
        }
    }

    /// Bind the context for messages issued from now on
    pub async fn bind(&self, course_id: u64, document_id: u64) {
        self.state.lock().await.binder.bind(course_id, document_id);
    }

    /// Clear the active context
    pub async fn clear_context(&self) {
        self.state.lock().await.binder.clear();
    }

    /// The active context, if any
    pub async fn current_context(&self) -> Option<ChatContext> {
        self.state.lock().await.binder.current_context()
    }

    /// Replace the input draft
    pub async fn set_draft(&self, text: impl Into<String>) {
        self.state.lock().await.draft = text.into();
    }

    /// The input draft
    pub async fn draft(&self) -> String {
        self.state.lock().await.draft.clone()
    }

    /// Conversation log in order
    pub async fn messages(&self) -> Vec<Message> {
        self.state.lock().await.store.snapshot()
    }

    /// One message by id
    pub async fn message(&self, id: &str) -> Option<Message> {
        self.state.lock().await.store.get(id).cloned()
    }

    /// Current lifecycle phase
    pub async fn phase(&self) -> SessionPhase {
        self.state.lock().await.phase
    }

    /// Why history failed to load, if it did
    pub async fn load_warning(&self) -> Option<Failure> {
        self.state.lock().await.load_warning.clone()
    }

    /// Discard the session; in-flight calls settle without effect
    pub async fn unmount(&self) {
        let mut state = self.state.lock().await;
        if state.phase == SessionPhase::Unmounted {
            return;
        }
        info!("Unmounting chat session ({} messages)", state.store.len());
        state.phase = SessionPhase::Unmounted;
        state.store = MessageStore::new();
        state.draft.clear();
    }
}

/// Store contract violations are bugs: loud in debug builds, errors in release
fn contract<T>(result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        error!("Message store contract violated: {}", e);
        debug_assert!(!e.is_contract_violation(), "message store contract violated: {}", e);
    }
    result
}
