use std::sync::Arc;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{
    Application, ApplicationId, ApplicationStatus, CandidateIdentity, JobId, JobStatus, OwnerId,
    PipelineStage, ScreeningAnswer,
};
use super::repository::{ApplicationPatch, ApplicationRepository, JobRepository};
use crate::billing::PlanGate;
use crate::error::{RepositoryError, ServiceError};

/// Candidate supplied payload for a new application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationSubmission {
    pub candidate: CandidateIdentity,
    #[serde(default)]
    pub answers: Vec<ScreeningAnswer>,
}

/// Candidate submissions plus owner-side reads of the application store.
pub struct IntakeService {
    applications: Arc<dyn ApplicationRepository>,
    jobs: Arc<dyn JobRepository>,
    plans: Arc<PlanGate>,
}

impl IntakeService {
    pub fn new(
        applications: Arc<dyn ApplicationRepository>,
        jobs: Arc<dyn JobRepository>,
        plans: Arc<PlanGate>,
    ) -> Self {
        Self {
            applications,
            jobs,
            plans,
        }
    }

    pub fn submit(
        &self,
        job_id: &JobId,
        submission: ApplicationSubmission,
    ) -> Result<Application, ServiceError> {
        let candidate = validate_candidate(submission.candidate)?;
        let job = self.jobs.fetch(job_id)?.ok_or(RepositoryError::NotFound)?;
        if job.status != JobStatus::Active {
            return Err(ServiceError::validation(format!(
                "job is {} and not accepting applications",
                job.status.label()
            )));
        }

        let now = Utc::now();
        let month_start = start_of_month(now);
        let received_this_month = self
            .applications
            .list_for_owner(&job.owner)?
            .iter()
            .filter(|application| application.created_at >= month_start)
            .count();
        self.plans
            .ensure_can_accept_application(&job.owner, received_this_month)?;

        let answers = submission
            .answers
            .into_iter()
            .map(|answer| ScreeningAnswer {
                question: answer.question.trim().to_string(),
                answer: answer.answer.trim().to_string(),
            })
            .collect();

        let application = Application {
            id: ApplicationId::generate(),
            job_id: job.id.clone(),
            owner: job.owner.clone(),
            candidate,
            answers,
            resume: None,
            parsed_resume: None,
            ai_rating: None,
            ai_summary: None,
            manual_rating: None,
            status: ApplicationStatus::Pending,
            pipeline_stage: PipelineStage::applied(),
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        };

        let stored = self.applications.insert(application)?;
        info!(application_id = %stored.id, job_id = %stored.job_id, "application received");
        Ok(stored)
    }

    pub fn get(&self, owner: &OwnerId, id: &ApplicationId) -> Result<Application, ServiceError> {
        owned_application(self.applications.as_ref(), owner, id)
    }

    pub fn list_for_job(
        &self,
        owner: &OwnerId,
        job_id: &JobId,
    ) -> Result<Vec<Application>, ServiceError> {
        let job = self.jobs.fetch(job_id)?.ok_or(RepositoryError::NotFound)?;
        if &job.owner != owner {
            return Err(RepositoryError::PermissionDenied.into());
        }
        Ok(self.applications.list_for_job(job_id)?)
    }

    pub fn list_for_owner(&self, owner: &OwnerId) -> Result<Vec<Application>, ServiceError> {
        Ok(self.applications.list_for_owner(owner)?)
    }

    pub fn set_manual_rating(
        &self,
        owner: &OwnerId,
        id: &ApplicationId,
        rating: u8,
    ) -> Result<Application, ServiceError> {
        if !(1..=5).contains(&rating) {
            return Err(ServiceError::validation("manual rating must be between 1 and 5"));
        }
        owned_application(self.applications.as_ref(), owner, id)?;
        let patch = ApplicationPatch {
            manual_rating: Some(rating),
            ..ApplicationPatch::default()
        };
        let updated = self.applications.patch(id, patch, Utc::now())?;
        Ok(updated)
    }
}

/// Fetch an application and check it belongs to the caller.
pub(crate) fn owned_application(
    applications: &dyn ApplicationRepository,
    owner: &OwnerId,
    id: &ApplicationId,
) -> Result<Application, ServiceError> {
    let application = applications.fetch(id)?.ok_or(RepositoryError::NotFound)?;
    if &application.owner != owner {
        return Err(RepositoryError::PermissionDenied.into());
    }
    Ok(application)
}

fn validate_candidate(candidate: CandidateIdentity) -> Result<CandidateIdentity, ServiceError> {
    let name = candidate.name.trim().to_string();
    let email = candidate.email.trim().to_ascii_lowercase();
    if name.is_empty() {
        return Err(ServiceError::validation("candidate name is required"));
    }
    let well_formed = email
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
        .unwrap_or(false);
    if !well_formed {
        return Err(ServiceError::validation("a valid candidate e-mail is required"));
    }
    Ok(CandidateIdentity {
        name,
        email,
        phone: candidate
            .phone
            .map(|phone| phone.trim().to_string())
            .filter(|phone| !phone.is_empty()),
        links: candidate
            .links
            .into_iter()
            .map(|link| link.trim().to_string())
            .filter(|link| !link.is_empty())
            .collect(),
    })
}

fn start_of_month(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}
