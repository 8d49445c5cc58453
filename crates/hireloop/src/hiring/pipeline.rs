use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use super::domain::{Application, ApplicationId, ApplicationStatus, OwnerId, PipelineStage};
use super::intake::owned_application;
use super::repository::{ApplicationPatch, ApplicationRepository, JobRepository, StageRepository};
use crate::email::{EmailSender, EmailTemplate, Recipient, SendOutcome, TemplateValues};
use crate::error::{RepositoryError, ServiceError};

/// Result of the e-mail step of a rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum NotificationOutcome {
    Sent { provider_id: String },
    Failed { error: String },
    Skipped { reason: String },
}

impl NotificationOutcome {
    pub fn was_attempted(&self) -> bool {
        !matches!(self, NotificationOutcome::Skipped { .. })
    }
}

impl From<SendOutcome> for NotificationOutcome {
    fn from(outcome: SendOutcome) -> Self {
        match outcome {
            SendOutcome::Sent { provider_id } => NotificationOutcome::Sent { provider_id },
            SendOutcome::Failed { error } => NotificationOutcome::Failed { error },
        }
    }
}

/// Result of the row update step of a rejection.
#[derive(Debug, Clone, PartialEq)]
pub enum StateOutcome {
    Applied(Application),
    Failed(RepositoryError),
}

/// The two rejection steps reported independently; neither rolls back the other.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectionReport {
    pub application_id: ApplicationId,
    pub notification: NotificationOutcome,
    pub state: StateOutcome,
}

impl RejectionReport {
    pub fn application(&self) -> Option<&Application> {
        match &self.state {
            StateOutcome::Applied(application) => Some(application),
            StateOutcome::Failed(_) => None,
        }
    }
}

/// Moves applications between hiring stages and in and out of the rejected state.
pub struct PipelineService {
    applications: Arc<dyn ApplicationRepository>,
    jobs: Arc<dyn JobRepository>,
    stages: Arc<dyn StageRepository>,
    sender: Arc<EmailSender>,
}

impl PipelineService {
    pub fn new(
        applications: Arc<dyn ApplicationRepository>,
        jobs: Arc<dyn JobRepository>,
        stages: Arc<dyn StageRepository>,
        sender: Arc<EmailSender>,
    ) -> Self {
        Self {
            applications,
            jobs,
            stages,
            sender,
        }
    }

    /// Notify the candidate, then write the rejected state.
    ///
    /// The e-mail is attempted at most once per call and its failure does not block the write.
    /// Re-rejecting an already rejected application updates the reason without a second e-mail.
    pub async fn reject(
        &self,
        owner: &OwnerId,
        id: &ApplicationId,
        reason: &str,
    ) -> Result<RejectionReport, ServiceError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ServiceError::validation("a rejection reason is required"));
        }
        let application = owned_application(self.applications.as_ref(), owner, id)?;

        let notification = if application.is_rejected() {
            NotificationOutcome::Skipped {
                reason: "application was already rejected".to_string(),
            }
        } else {
            let recipient = self.rejection_recipient(&application);
            self.sender
                .send_one(owner, &EmailTemplate::rejection(), &recipient)
                .await
                .outcome
                .into()
        };

        let patch = ApplicationPatch {
            status: Some(ApplicationStatus::Rejected),
            pipeline_stage: Some(PipelineStage::rejected()),
            rejection_reason: Some(Some(reason.to_string())),
            ..ApplicationPatch::default()
        };
        let state = match self.applications.patch(id, patch, Utc::now()) {
            Ok(updated) => {
                info!(application_id = %id, reason, "application rejected");
                StateOutcome::Applied(updated)
            }
            Err(err) => {
                warn!(application_id = %id, error = %err, "rejection state write failed");
                StateOutcome::Failed(err)
            }
        };

        Ok(RejectionReport {
            application_id: id.clone(),
            notification,
            state,
        })
    }

    /// Return a rejected application to the first stage. Applications that are not rejected are
    /// returned unchanged.
    pub fn unreject(&self, owner: &OwnerId, id: &ApplicationId) -> Result<Application, ServiceError> {
        let application = owned_application(self.applications.as_ref(), owner, id)?;
        if !application.is_rejected() {
            return Ok(application);
        }

        let patch = ApplicationPatch {
            status: Some(ApplicationStatus::Pending),
            pipeline_stage: Some(PipelineStage::applied()),
            rejection_reason: Some(None),
            ..ApplicationPatch::default()
        };
        let updated = self.applications.patch(id, patch, Utc::now())?;
        info!(application_id = %id, "application restored");
        Ok(updated)
    }

    /// Mark an application approved. The stage is left where it is; rejected applications must
    /// be restored first.
    pub fn approve(&self, owner: &OwnerId, id: &ApplicationId) -> Result<Application, ServiceError> {
        self.set_review_status(owner, id, ApplicationStatus::Approved)
    }

    /// Return an approved application to pending review.
    pub fn unapprove(&self, owner: &OwnerId, id: &ApplicationId) -> Result<Application, ServiceError> {
        self.set_review_status(owner, id, ApplicationStatus::Pending)
    }

    fn set_review_status(
        &self,
        owner: &OwnerId,
        id: &ApplicationId,
        status: ApplicationStatus,
    ) -> Result<Application, ServiceError> {
        let application = owned_application(self.applications.as_ref(), owner, id)?;
        if application.is_rejected() {
            return Err(ServiceError::validation(
                "rejected applications must be restored before review",
            ));
        }
        if application.status == status {
            return Ok(application);
        }

        let patch = ApplicationPatch {
            status: Some(status),
            ..ApplicationPatch::default()
        };
        let updated = self.applications.patch(id, patch, Utc::now())?;
        info!(application_id = %id, status = status.label(), "review status changed");
        Ok(updated)
    }

    pub fn move_stage(
        &self,
        owner: &OwnerId,
        id: &ApplicationId,
        stage: &str,
    ) -> Result<Application, ServiceError> {
        let stage = self.validated_stage(owner, stage)?;
        let application = owned_application(self.applications.as_ref(), owner, id)?;
        if application.is_rejected() {
            return Err(ServiceError::validation(
                "rejected applications must be restored before changing stage",
            ));
        }
        if application.pipeline_stage == stage {
            return Ok(application);
        }

        let patch = ApplicationPatch {
            pipeline_stage: Some(stage.clone()),
            ..ApplicationPatch::default()
        };
        let updated = self.applications.patch(id, patch, Utc::now())?;
        info!(application_id = %id, stage = %stage, "application moved");
        Ok(updated)
    }

    /// Move every owned, non-rejected application in `ids` with one store call.
    pub fn bulk_move_stage(
        &self,
        owner: &OwnerId,
        ids: &[ApplicationId],
        stage: &str,
    ) -> Result<usize, ServiceError> {
        let stage = self.validated_stage(owner, stage)?;
        let owned: HashSet<ApplicationId> = self
            .applications
            .list_for_owner(owner)?
            .into_iter()
            .map(|application| application.id)
            .collect();
        let targets: Vec<ApplicationId> = ids
            .iter()
            .filter(|id| owned.contains(*id))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if targets.is_empty() {
            return Ok(0);
        }

        let updated = self
            .applications
            .update_stage_many(&targets, &stage, Utc::now())?;
        info!(
            owner = %owner,
            stage = %stage,
            requested = ids.len(),
            affected = updated.len(),
            "bulk stage move"
        );
        Ok(updated.len())
    }

    fn validated_stage(&self, owner: &OwnerId, stage: &str) -> Result<PipelineStage, ServiceError> {
        let stage = PipelineStage::new(stage);
        if stage.is_empty() {
            return Err(ServiceError::validation("a stage is required"));
        }
        if stage.is_rejected() {
            return Err(ServiceError::validation(
                "use reject to move an application to the rejected stage",
            ));
        }
        let known = stage.as_str() == PipelineStage::APPLIED
            || self
                .stages
                .stages_for(owner)?
                .iter()
                .any(|defined| defined.label == stage);
        if !known {
            return Err(ServiceError::validation(format!("unknown hiring stage '{stage}'")));
        }
        Ok(stage)
    }

    fn rejection_recipient(&self, application: &Application) -> Recipient {
        let job = match self.jobs.fetch(&application.job_id) {
            Ok(job) => job,
            Err(err) => {
                warn!(job_id = %application.job_id, error = %err, "job lookup failed for rejection e-mail");
                None
            }
        };
        Recipient {
            values: TemplateValues {
                name: application.candidate.name.clone(),
                email: application.candidate.email.clone(),
                position: job.as_ref().map(|job| job.title.clone()).unwrap_or_default(),
                company: job
                    .and_then(|job| job.company_name)
                    .unwrap_or_default(),
            },
            application_id: Some(application.id.clone()),
        }
    }
}
