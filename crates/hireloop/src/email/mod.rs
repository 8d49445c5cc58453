//! Candidate communication: templated sends, delivery logging and inbox threads.

pub mod memory;
pub mod sender;
pub mod template;
pub mod threads;
pub mod transport;

#[cfg(test)]
mod tests;

pub use memory::{InMemoryEmailLog, InMemoryThreadStore, RecordingTransport};
pub use sender::{
    DeliveryReport, EmailLogEntry, EmailLogRepository, EmailSender, Recipient, RecipientResult,
    SendOutcome,
};
pub use template::{substitute, EmailTemplate, RenderedEmail, TemplateValues};
pub use threads::{
    Direction, EmailMessage, EmailThread, InboundMessage, MessageId, NewThread, ReconcileReport,
    StartedThread, ThreadError, ThreadId, ThreadRepository, ThreadService,
};
pub use transport::{DeliveryReceipt, EmailTransport, HttpEmailTransport, OutboundEmail, TransportError};
