use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::template::{EmailTemplate, TemplateValues};
use super::transport::{EmailTransport, OutboundEmail};
use crate::billing::{Feature, PlanGate};
use crate::error::{RepositoryError, ServiceError};
use crate::hiring::domain::{ApplicationId, OwnerId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SendOutcome {
    Sent { provider_id: String },
    Failed { error: String },
}

impl SendOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, SendOutcome::Sent { .. })
    }
}

/// One row per delivery attempt, successful or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailLogEntry {
    pub id: String,
    pub owner: OwnerId,
    pub recipient: String,
    pub subject: String,
    pub content: String,
    pub template_id: Option<String>,
    pub application_id: Option<ApplicationId>,
    pub outcome: SendOutcome,
    pub attempted_at: DateTime<Utc>,
}

pub trait EmailLogRepository: Send + Sync {
    fn record(&self, entry: EmailLogEntry) -> Result<(), RepositoryError>;
    fn entries_for(&self, owner: &OwnerId) -> Result<Vec<EmailLogEntry>, RepositoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    #[serde(flatten)]
    pub values: TemplateValues,
    #[serde(default)]
    pub application_id: Option<ApplicationId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipientResult {
    pub email: String,
    pub outcome: SendOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub attempted: usize,
    pub sent: usize,
    pub failed: usize,
    pub results: Vec<RecipientResult>,
}

/// Renders templates per recipient and hands each message to the vendor.
pub struct EmailSender {
    transport: Arc<dyn EmailTransport>,
    log: Arc<dyn EmailLogRepository>,
    plans: Arc<PlanGate>,
    from_address: String,
}

impl EmailSender {
    pub fn new(
        transport: Arc<dyn EmailTransport>,
        log: Arc<dyn EmailLogRepository>,
        plans: Arc<PlanGate>,
        from_address: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            log,
            plans,
            from_address: from_address.into(),
        }
    }

    pub fn from_address(&self) -> &str {
        &self.from_address
    }

    /// Send to a single recipient. Failures are reported in the result, never raised.
    pub async fn send_one(
        &self,
        owner: &OwnerId,
        template: &EmailTemplate,
        recipient: &Recipient,
    ) -> RecipientResult {
        let rendered = template.render(&recipient.values);
        let email = OutboundEmail {
            from: self.from_address.clone(),
            to: recipient.values.email.clone(),
            subject: rendered.subject,
            text: rendered.body,
            reply_to: None,
        };
        let to = email.to.clone();
        let outcome = self
            .deliver(owner, email, template.id.clone(), recipient.application_id.clone())
            .await;
        RecipientResult { email: to, outcome }
    }

    /// Hand an already composed message to the vendor and log the attempt.
    pub async fn deliver(
        &self,
        owner: &OwnerId,
        email: OutboundEmail,
        template_id: Option<String>,
        application_id: Option<ApplicationId>,
    ) -> SendOutcome {
        let outcome = match self.transport.send(&email).await {
            Ok(receipt) => SendOutcome::Sent {
                provider_id: receipt.provider_id,
            },
            Err(err) => {
                warn!(to = %email.to, error = %err, "e-mail delivery failed");
                SendOutcome::Failed {
                    error: err.to_string(),
                }
            }
        };

        let entry = EmailLogEntry {
            id: Uuid::new_v4().to_string(),
            owner: owner.clone(),
            recipient: email.to.clone(),
            subject: email.subject,
            content: email.text,
            template_id,
            application_id,
            outcome: outcome.clone(),
            attempted_at: Utc::now(),
        };
        if let Err(err) = self.log.record(entry) {
            warn!(to = %email.to, error = %err, "failed to record e-mail log entry");
        }
        outcome
    }

    /// Send one message per recipient; more than one recipient requires the bulk e-mail feature.
    pub async fn send_batch(
        &self,
        owner: &OwnerId,
        template: &EmailTemplate,
        recipients: &[Recipient],
    ) -> Result<DeliveryReport, ServiceError> {
        if template.subject.trim().is_empty() || template.body.trim().is_empty() {
            return Err(ServiceError::validation("subject and body are required"));
        }
        if recipients.is_empty() {
            return Err(ServiceError::validation("at least one recipient is required"));
        }
        if let Some(invalid) = recipients
            .iter()
            .find(|recipient| !recipient.values.email.contains('@'))
        {
            return Err(ServiceError::validation(format!(
                "invalid recipient address '{}'",
                invalid.values.email
            )));
        }
        if recipients.len() > 1 {
            self.plans.ensure_feature(owner, Feature::BulkEmail)?;
        }

        let mut report = DeliveryReport::default();
        for recipient in recipients {
            let result = self.send_one(owner, template, recipient).await;
            report.attempted += 1;
            if result.outcome.is_sent() {
                report.sent += 1;
            } else {
                report.failed += 1;
            }
            report.results.push(result);
        }

        info!(
            owner = %owner,
            attempted = report.attempted,
            sent = report.sent,
            failed = report.failed,
            "templated e-mail batch finished"
        );
        Ok(report)
    }
}
