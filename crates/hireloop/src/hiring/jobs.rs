use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};

use super::domain::{Job, JobDraft, JobId, JobStatus, OwnerId};
use super::repository::JobRepository;
use crate::billing::PlanGate;
use crate::error::{RepositoryError, ServiceError};
use crate::functions::{unwrap_text_payload, ContentGenerator, ContentKind, ContentRequest};

/// Job posting lifecycle: creation, edits, status changes and AI generated content.
pub struct JobService {
    jobs: Arc<dyn JobRepository>,
    plans: Arc<PlanGate>,
    generator: Arc<dyn ContentGenerator>,
}

impl JobService {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        plans: Arc<PlanGate>,
        generator: Arc<dyn ContentGenerator>,
    ) -> Self {
        Self {
            jobs,
            plans,
            generator,
        }
    }

    pub fn create(&self, owner: &OwnerId, draft: JobDraft) -> Result<Job, ServiceError> {
        validate_draft(&draft)?;
        let status = if draft.publish {
            self.plans
                .ensure_can_activate_job(owner, self.active_job_count(owner)?)?;
            JobStatus::Active
        } else {
            JobStatus::Draft
        };

        let now = Utc::now();
        let job = Job {
            id: JobId::generate(),
            owner: owner.clone(),
            title: draft.title.trim().to_string(),
            description: draft.description.trim().to_string(),
            company_name: draft.company_name,
            employment_type: draft.employment_type,
            experience_level: draft.experience_level,
            location: draft.location,
            compensation: draft.compensation,
            status,
            generated: Default::default(),
            view_count: 0,
            created_at: now,
            updated_at: now,
        };

        let stored = self.jobs.insert(job)?;
        info!(job_id = %stored.id, owner = %owner, status = stored.status.label(), "job created");
        Ok(stored)
    }

    pub fn update(&self, owner: &OwnerId, job_id: &JobId, draft: JobDraft) -> Result<Job, ServiceError> {
        validate_draft(&draft)?;
        let mut job = self.owned(owner, job_id)?;
        job.title = draft.title.trim().to_string();
        job.description = draft.description.trim().to_string();
        job.company_name = draft.company_name;
        job.employment_type = draft.employment_type;
        job.experience_level = draft.experience_level;
        job.location = draft.location;
        job.compensation = draft.compensation;
        job.updated_at = Utc::now();
        self.jobs.update(job.clone())?;
        Ok(job)
    }

    pub fn set_status(
        &self,
        owner: &OwnerId,
        job_id: &JobId,
        status: JobStatus,
    ) -> Result<Job, ServiceError> {
        let mut job = self.owned(owner, job_id)?;
        if !job.status.can_transition_to(status) {
            return Err(ServiceError::validation(format!(
                "job cannot move from {} to {}",
                job.status.label(),
                status.label()
            )));
        }
        if job.status == status {
            return Ok(job);
        }
        if status == JobStatus::Active {
            self.plans
                .ensure_can_activate_job(owner, self.active_job_count(owner)?)?;
        }

        job.status = status;
        job.updated_at = Utc::now();
        self.jobs.update(job.clone())?;
        info!(job_id = %job.id, status = status.label(), "job status changed");
        Ok(job)
    }

    pub fn record_view(&self, job_id: &JobId) -> Result<u64, ServiceError> {
        Ok(self.jobs.increment_views(job_id)?)
    }

    pub fn get(&self, job_id: &JobId) -> Result<Job, ServiceError> {
        Ok(self.jobs.fetch(job_id)?.ok_or(RepositoryError::NotFound)?)
    }

    pub fn list(&self, owner: &OwnerId) -> Result<Vec<Job>, ServiceError> {
        Ok(self.jobs.list_for_owner(owner)?)
    }

    /// Generate posting content; nothing is stored unless the function returns usable text.
    pub async fn generate_content(
        &self,
        owner: &OwnerId,
        job_id: &JobId,
        kind: ContentKind,
    ) -> Result<Job, ServiceError> {
        let job = self.owned(owner, job_id)?;
        let request = ContentRequest {
            kind,
            title: job.title.clone(),
            description: job.description.clone(),
            employment_type: job.employment_type,
            experience_level: job.experience_level,
            company_name: job.company_name.clone(),
        };

        let response = self.generator.generate(&request).await.map_err(|err| {
            warn!(job_id = %job_id, ?kind, error = %err, "content generation failed");
            ServiceError::external("content generation", err)
        })?;
        let text = extract_generated_text(response, kind).ok_or_else(|| {
            ServiceError::external("content generation", "response did not contain any content")
        })?;

        // Re-read so a concurrent edit is not overwritten by the pre-call snapshot.
        let mut job = self.owned(owner, job_id)?;
        match kind {
            ContentKind::JobPost => job.generated.job_post = Some(text),
            ContentKind::SkillsTest => job.generated.skills_test = Some(text),
            ContentKind::InterviewQuestions => job.generated.interview_questions = Some(text),
        }
        job.updated_at = Utc::now();
        self.jobs.update(job.clone())?;
        info!(job_id = %job_id, ?kind, "generated content stored");
        Ok(job)
    }

    fn owned(&self, owner: &OwnerId, job_id: &JobId) -> Result<Job, ServiceError> {
        let job = self.jobs.fetch(job_id)?.ok_or(RepositoryError::NotFound)?;
        if &job.owner != owner {
            return Err(RepositoryError::PermissionDenied.into());
        }
        Ok(job)
    }

    fn active_job_count(&self, owner: &OwnerId) -> Result<usize, ServiceError> {
        Ok(self
            .jobs
            .list_for_owner(owner)?
            .iter()
            .filter(|job| job.status == JobStatus::Active)
            .count())
    }
}

fn validate_draft(draft: &JobDraft) -> Result<(), ServiceError> {
    if draft.title.trim().is_empty() {
        return Err(ServiceError::validation("job title is required"));
    }
    if draft.description.trim().is_empty() {
        return Err(ServiceError::validation("job description is required"));
    }
    Ok(())
}

fn extract_generated_text(response: Value, kind: ContentKind) -> Option<String> {
    let response = unwrap_text_payload(response);
    let specific = match kind {
        ContentKind::JobPost => "job_post",
        ContentKind::SkillsTest => "skills_test",
        ContentKind::InterviewQuestions => "questions",
    };

    let candidate = match &response {
        Value::String(text) => Some(text.clone()),
        Value::Object(fields) => [specific, "content", "text"]
            .iter()
            .filter_map(|key| fields.get(*key))
            .find_map(|value| match value {
                Value::String(text) => Some(text.clone()),
                Value::Array(items) if !items.is_empty() => Some(
                    items
                        .iter()
                        .map(|item| match item {
                            Value::String(text) => text.clone(),
                            other => other.to_string(),
                        })
                        .collect::<Vec<_>>()
                        .join("\n"),
                ),
                _ => None,
            }),
        _ => None,
    };

    candidate
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}
