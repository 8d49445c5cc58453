use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    Application, ApplicationId, ApplicationStatus, Job, JobId, OwnerId, ParsedResume,
    PipelineStage, ResumeRef,
};
use crate::error::RepositoryError;

/// Storage abstraction for the `applications` table.
pub trait ApplicationRepository: Send + Sync {
    fn insert(&self, application: Application) -> Result<Application, RepositoryError>;
    fn fetch(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError>;
    /// Apply a column-level update to one row and return the stored result.
    fn patch(
        &self,
        id: &ApplicationId,
        patch: ApplicationPatch,
        at: DateTime<Utc>,
    ) -> Result<Application, RepositoryError>;
    /// `UPDATE applications SET pipeline_stage = $1 WHERE id IN (...) AND status <> 'rejected'`.
    fn update_stage_many(
        &self,
        ids: &[ApplicationId],
        stage: &PipelineStage,
        at: DateTime<Utc>,
    ) -> Result<Vec<Application>, RepositoryError>;
    fn list_for_job(&self, job_id: &JobId) -> Result<Vec<Application>, RepositoryError>;
    fn list_for_owner(&self, owner: &OwnerId) -> Result<Vec<Application>, RepositoryError>;
}

/// Storage abstraction for the `jobs` table.
pub trait JobRepository: Send + Sync {
    fn insert(&self, job: Job) -> Result<Job, RepositoryError>;
    /// Replace the posting's editable fields; the stored view counter is left alone.
    fn update(&self, job: Job) -> Result<(), RepositoryError>;
    /// Atomically bump the view counter and return the new value.
    fn increment_views(&self, id: &JobId) -> Result<u64, RepositoryError>;
    fn fetch(&self, id: &JobId) -> Result<Option<Job>, RepositoryError>;
    fn list_for_owner(&self, owner: &OwnerId) -> Result<Vec<Job>, RepositoryError>;
}

/// Owner-defined hiring stages (`hiring_stages` table).
pub trait StageRepository: Send + Sync {
    fn stages_for(&self, owner: &OwnerId) -> Result<Vec<HiringStage>, RepositoryError>;
    fn replace(&self, owner: &OwnerId, stages: Vec<HiringStage>) -> Result<(), RepositoryError>;
}

/// Object storage for resumes and assessment files.
pub trait FileStore: Send + Sync {
    fn exists(&self, path: &str) -> Result<bool, RepositoryError>;
    fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), RepositoryError>;
    fn get(&self, path: &str) -> Result<Option<Vec<u8>>, RepositoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HiringStage {
    pub label: PipelineStage,
    pub position: u16,
}

impl HiringStage {
    pub fn defaults() -> Vec<HiringStage> {
        ["applied", "screening", "interview", "offer", "hired"]
            .iter()
            .enumerate()
            .map(|(position, label)| HiringStage {
                label: PipelineStage::new(label),
                position: position as u16,
            })
            .collect()
    }
}

/// Column-level update applied atomically to a single application row.
///
/// `None` leaves a column untouched; nested options allow clearing nullable columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationPatch {
    pub status: Option<ApplicationStatus>,
    pub pipeline_stage: Option<PipelineStage>,
    pub rejection_reason: Option<Option<String>>,
    pub ai_rating: Option<f32>,
    pub ai_summary: Option<String>,
    pub manual_rating: Option<u8>,
    pub resume: Option<ResumeRef>,
    pub parsed_resume: Option<ParsedResume>,
}

impl ApplicationPatch {
    pub fn is_empty(&self) -> bool {
        *self == ApplicationPatch::default()
    }

    pub fn apply_to(self, application: &mut Application, at: DateTime<Utc>) {
        if let Some(status) = self.status {
            application.status = status;
        }
        if let Some(stage) = self.pipeline_stage {
            application.pipeline_stage = stage;
        }
        if let Some(reason) = self.rejection_reason {
            application.rejection_reason = reason;
        }
        if let Some(rating) = self.ai_rating {
            application.ai_rating = Some(rating);
        }
        if let Some(summary) = self.ai_summary {
            application.ai_summary = Some(summary);
        }
        if let Some(rating) = self.manual_rating {
            application.manual_rating = Some(rating);
        }
        if let Some(resume) = self.resume {
            application.resume = Some(resume);
        }
        if let Some(parsed) = self.parsed_resume {
            application.parsed_resume = Some(parsed);
        }
        application.updated_at = at;
    }
}
