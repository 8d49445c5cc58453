use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::sender::{EmailSender, SendOutcome};
use super::transport::OutboundEmail;
use crate::error::{RepositoryError, ServiceError};
use crate::hiring::domain::{ApplicationId, JobId, OwnerId};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub String);

impl ThreadId {
    pub fn generate() -> Self {
        Self(format!("thr-{}", Uuid::new_v4().simple()))
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn generate() -> Self {
        Self(format!("msg-{}", Uuid::new_v4().simple()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Conversation container; `unread_count` mirrors unread inbound messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailThread {
    pub id: ThreadId,
    pub owner: OwnerId,
    pub application_id: Option<ApplicationId>,
    pub job_id: Option<JobId>,
    pub subject: String,
    pub participants: Vec<String>,
    pub unread_count: u32,
    pub last_message_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub id: MessageId,
    pub thread_id: ThreadId,
    pub direction: Direction,
    pub is_read: bool,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

impl EmailMessage {
    pub fn counts_as_unread(&self) -> bool {
        self.direction == Direction::Inbound && !self.is_read
    }
}

/// Storage abstraction over the `email_threads` and `email_messages` tables.
pub trait ThreadRepository: Send + Sync {
    fn insert_thread(&self, thread: EmailThread) -> Result<EmailThread, RepositoryError>;
    fn fetch_thread(&self, id: &ThreadId) -> Result<Option<EmailThread>, RepositoryError>;
    fn list_threads(&self, owner: &OwnerId) -> Result<Vec<EmailThread>, RepositoryError>;
    fn insert_message(&self, message: EmailMessage) -> Result<EmailMessage, RepositoryError>;
    fn messages(&self, thread_id: &ThreadId) -> Result<Vec<EmailMessage>, RepositoryError>;
    /// Increment the stored counter and move `last_message_at` forward.
    fn bump_unread(&self, thread_id: &ThreadId, at: DateTime<Utc>) -> Result<EmailThread, RepositoryError>;
    /// Mark every inbound message read; returns how many changed.
    fn mark_inbound_read(&self, thread_id: &ThreadId) -> Result<usize, RepositoryError>;
    fn set_unread_count(&self, thread_id: &ThreadId, count: u32) -> Result<(), RepositoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewThread {
    pub to: String,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub application_id: Option<ApplicationId>,
    #[serde(default)]
    pub job_id: Option<JobId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub from: String,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartedThread {
    pub thread: EmailThread,
    pub message: EmailMessage,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub threads_checked: usize,
    pub threads_corrected: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ThreadError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    /// The thread row exists but holds no message; it is not rolled back.
    #[error("thread {thread_id} was created but its first message was not stored: {reason}")]
    Incomplete { thread_id: ThreadId, reason: String },
}

impl From<RepositoryError> for ThreadError {
    fn from(err: RepositoryError) -> Self {
        ThreadError::Service(err.into())
    }
}

/// Inbox bookkeeping for candidate conversations. Outbound mail goes through the shared
/// [`EmailSender`] so every attempt lands in the e-mail log.
pub struct ThreadService {
    threads: Arc<dyn ThreadRepository>,
    sender: Arc<EmailSender>,
}

impl ThreadService {
    pub fn new(threads: Arc<dyn ThreadRepository>, sender: Arc<EmailSender>) -> Self {
        Self { threads, sender }
    }

    /// Create the thread, deliver and log the opening message, then store it.
    pub async fn start_thread(
        &self,
        owner: &OwnerId,
        request: NewThread,
    ) -> Result<StartedThread, ThreadError> {
        let to = request.to.trim().to_ascii_lowercase();
        if !to.contains('@') {
            return Err(ServiceError::validation("a valid recipient address is required").into());
        }
        if request.subject.trim().is_empty() || request.body.trim().is_empty() {
            return Err(ServiceError::validation("subject and body are required").into());
        }

        let now = Utc::now();
        let thread = self.threads.insert_thread(EmailThread {
            id: ThreadId::generate(),
            owner: owner.clone(),
            application_id: request.application_id,
            job_id: request.job_id,
            subject: request.subject.trim().to_string(),
            participants: vec![to.clone()],
            unread_count: 0,
            last_message_at: now,
            created_at: now,
        })?;

        let outbound = OutboundEmail {
            from: self.sender.from_address().to_string(),
            to: to.clone(),
            subject: thread.subject.clone(),
            text: request.body.clone(),
            reply_to: None,
        };
        let outcome = self
            .sender
            .deliver(owner, outbound.clone(), None, thread.application_id.clone())
            .await;
        if let SendOutcome::Failed { error } = outcome {
            warn!(thread_id = %thread.id, error = %error, "opening message delivery failed");
            return Err(ThreadError::Incomplete {
                thread_id: thread.id,
                reason: format!("delivery failed: {error}"),
            });
        }

        let message = EmailMessage {
            id: MessageId::generate(),
            thread_id: thread.id.clone(),
            direction: Direction::Outbound,
            is_read: true,
            from: outbound.from,
            to,
            subject: outbound.subject,
            body: outbound.text,
            sent_at: now,
        };
        let message = match self.threads.insert_message(message) {
            Ok(message) => message,
            Err(err) => {
                warn!(thread_id = %thread.id, error = %err, "thread left without messages");
                return Err(ThreadError::Incomplete {
                    thread_id: thread.id,
                    reason: err.to_string(),
                });
            }
        };

        info!(thread_id = %thread.id, owner = %owner, "thread started");
        Ok(StartedThread { thread, message })
    }

    pub fn record_inbound(
        &self,
        thread_id: &ThreadId,
        inbound: InboundMessage,
    ) -> Result<EmailMessage, ServiceError> {
        let thread = self
            .threads
            .fetch_thread(thread_id)?
            .ok_or(RepositoryError::NotFound)?;
        let received_at = inbound.received_at.unwrap_or_else(Utc::now);
        let to = thread
            .participants
            .first()
            .cloned()
            .unwrap_or_default();
        let message = self.threads.insert_message(EmailMessage {
            id: MessageId::generate(),
            thread_id: thread.id.clone(),
            direction: Direction::Inbound,
            is_read: false,
            from: inbound.from.trim().to_ascii_lowercase(),
            to,
            subject: inbound.subject,
            body: inbound.body,
            sent_at: received_at,
        })?;
        self.threads.bump_unread(&thread.id, received_at)?;
        Ok(message)
    }

    pub fn mark_read(&self, owner: &OwnerId, thread_id: &ThreadId) -> Result<EmailThread, ServiceError> {
        self.owned(owner, thread_id)?;
        let changed = self.threads.mark_inbound_read(thread_id)?;
        self.threads.set_unread_count(thread_id, 0)?;
        info!(thread_id = %thread_id, changed, "thread marked read");
        self.owned(owner, thread_id)
    }

    pub fn list_threads(&self, owner: &OwnerId) -> Result<Vec<EmailThread>, ServiceError> {
        Ok(self.threads.list_threads(owner)?)
    }

    pub fn messages(
        &self,
        owner: &OwnerId,
        thread_id: &ThreadId,
    ) -> Result<Vec<EmailMessage>, ServiceError> {
        self.owned(owner, thread_id)?;
        Ok(self.threads.messages(thread_id)?)
    }

    /// Re-derive every thread's unread counter from its messages.
    pub fn reconcile_unread_counts(&self, owner: &OwnerId) -> Result<ReconcileReport, ServiceError> {
        let mut report = ReconcileReport::default();
        for thread in self.threads.list_threads(owner)? {
            report.threads_checked += 1;
            let actual = self
                .threads
                .messages(&thread.id)?
                .iter()
                .filter(|message| message.counts_as_unread())
                .count() as u32;
            if actual != thread.unread_count {
                warn!(
                    thread_id = %thread.id,
                    stored = thread.unread_count,
                    actual,
                    "unread counter drifted"
                );
                self.threads.set_unread_count(&thread.id, actual)?;
                report.threads_corrected += 1;
            }
        }
        Ok(report)
    }

    fn owned(&self, owner: &OwnerId, thread_id: &ThreadId) -> Result<EmailThread, ServiceError> {
        let thread = self
            .threads
            .fetch_thread(thread_id)?
            .ok_or(RepositoryError::NotFound)?;
        if &thread.owner != owner {
            return Err(RepositoryError::PermissionDenied.into());
        }
        Ok(thread)
    }
}
