use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::sender::{EmailLogEntry, EmailLogRepository};
use super::threads::{EmailMessage, EmailThread, ThreadId, ThreadRepository};
use super::transport::{DeliveryReceipt, EmailTransport, OutboundEmail, TransportError};
use crate::error::RepositoryError;
use crate::hiring::domain::OwnerId;

fn lock<'a, T>(mutex: &'a Mutex<T>, name: &str) -> Result<MutexGuard<'a, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable(format!("{name} lock poisoned")))
}

#[derive(Default, Clone)]
pub struct InMemoryEmailLog {
    entries: Arc<Mutex<Vec<EmailLogEntry>>>,
}

impl InMemoryEmailLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EmailLogRepository for InMemoryEmailLog {
    fn record(&self, entry: EmailLogEntry) -> Result<(), RepositoryError> {
        lock(&self.entries, "email log")?.push(entry);
        Ok(())
    }

    fn entries_for(&self, owner: &OwnerId) -> Result<Vec<EmailLogEntry>, RepositoryError> {
        Ok(lock(&self.entries, "email log")?
            .iter()
            .filter(|entry| &entry.owner == owner)
            .cloned()
            .collect())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryThreadStore {
    threads: Arc<Mutex<HashMap<ThreadId, EmailThread>>>,
    messages: Arc<Mutex<Vec<EmailMessage>>>,
}

impl InMemoryThreadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ThreadRepository for InMemoryThreadStore {
    fn insert_thread(&self, thread: EmailThread) -> Result<EmailThread, RepositoryError> {
        let mut guard = lock(&self.threads, "threads")?;
        if guard.contains_key(&thread.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(thread.id.clone(), thread.clone());
        Ok(thread)
    }

    fn fetch_thread(&self, id: &ThreadId) -> Result<Option<EmailThread>, RepositoryError> {
        Ok(lock(&self.threads, "threads")?.get(id).cloned())
    }

    fn list_threads(&self, owner: &OwnerId) -> Result<Vec<EmailThread>, RepositoryError> {
        let guard = lock(&self.threads, "threads")?;
        let mut threads: Vec<EmailThread> = guard
            .values()
            .filter(|thread| &thread.owner == owner)
            .cloned()
            .collect();
        threads.sort_by(|left, right| {
            right
                .last_message_at
                .cmp(&left.last_message_at)
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(threads)
    }

    fn insert_message(&self, message: EmailMessage) -> Result<EmailMessage, RepositoryError> {
        if !lock(&self.threads, "threads")?.contains_key(&message.thread_id) {
            return Err(RepositoryError::ConstraintViolation(
                "message references an unknown thread".to_string(),
            ));
        }
        lock(&self.messages, "messages")?.push(message.clone());
        Ok(message)
    }

    fn messages(&self, thread_id: &ThreadId) -> Result<Vec<EmailMessage>, RepositoryError> {
        let mut messages: Vec<EmailMessage> = lock(&self.messages, "messages")?
            .iter()
            .filter(|message| &message.thread_id == thread_id)
            .cloned()
            .collect();
        messages.sort_by_key(|message| message.sent_at);
        Ok(messages)
    }

    fn bump_unread(
        &self,
        thread_id: &ThreadId,
        at: DateTime<Utc>,
    ) -> Result<EmailThread, RepositoryError> {
        let mut guard = lock(&self.threads, "threads")?;
        let thread = guard.get_mut(thread_id).ok_or(RepositoryError::NotFound)?;
        thread.unread_count += 1;
        if at > thread.last_message_at {
            thread.last_message_at = at;
        }
        Ok(thread.clone())
    }

    fn mark_inbound_read(&self, thread_id: &ThreadId) -> Result<usize, RepositoryError> {
        let mut guard = lock(&self.messages, "messages")?;
        let mut changed = 0;
        for message in guard
            .iter_mut()
            .filter(|message| &message.thread_id == thread_id && message.counts_as_unread())
        {
            message.is_read = true;
            changed += 1;
        }
        Ok(changed)
    }

    fn set_unread_count(&self, thread_id: &ThreadId, count: u32) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.threads, "threads")?;
        let thread = guard.get_mut(thread_id).ok_or(RepositoryError::NotFound)?;
        thread.unread_count = count;
        Ok(())
    }
}

/// Transport that keeps every message in memory instead of calling a vendor.
///
/// Addresses registered with [`RecordingTransport::fail_for`] are refused.
#[derive(Default, Clone)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<OutboundEmail>>>,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, address: &str) {
        if let Ok(mut guard) = self.failing.lock() {
            guard.insert(address.to_ascii_lowercase());
        }
    }

    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl EmailTransport for RecordingTransport {
    async fn send(&self, email: &OutboundEmail) -> Result<DeliveryReceipt, TransportError> {
        let refused = self
            .failing
            .lock()
            .map(|guard| guard.contains(&email.to.to_ascii_lowercase()))
            .map_err(|_| TransportError::Unavailable("transport lock poisoned".to_string()))?;
        if refused {
            return Err(TransportError::Rejected {
                status: 422,
                message: format!("recipient {} refused", email.to),
            });
        }
        let mut guard = self
            .sent
            .lock()
            .map_err(|_| TransportError::Unavailable("transport lock poisoned".to_string()))?;
        guard.push(email.clone());
        Ok(DeliveryReceipt {
            provider_id: format!("local-{}", guard.len()),
        })
    }
}
