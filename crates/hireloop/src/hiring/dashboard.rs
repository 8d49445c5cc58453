use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::domain::{Application, ApplicationStatus, Job, JobId, JobStatus, OwnerId};
use super::repository::{ApplicationRepository, JobRepository};
use crate::error::{RepositoryError, ServiceError};

/// Pending applications at or above this count flag a job as needing attention.
pub const NEEDS_ATTENTION_THRESHOLD: usize = 10;
const TRAILING_WINDOW_DAYS: i64 = 7;

/// Read-only projection over already fetched applications and jobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub rated: usize,
    pub average_rating: f32,
    pub this_week: usize,
    pub active_jobs: usize,
    pub needs_attention: Vec<JobId>,
    pub stage_counts: BTreeMap<String, usize>,
}

impl DashboardStats {
    /// Pure function of its inputs; `now` anchors the trailing seven day window.
    pub fn compute(applications: &[Application], jobs: &[Job], now: DateTime<Utc>) -> Self {
        let window_start = now - Duration::days(TRAILING_WINDOW_DAYS);
        let mut stats = DashboardStats::default();
        let mut rating_sum = 0.0f64;
        let mut pending_by_job: HashMap<&JobId, usize> = HashMap::new();

        for application in applications {
            stats.total += 1;
            match application.status {
                ApplicationStatus::Pending => {
                    stats.pending += 1;
                    *pending_by_job.entry(&application.job_id).or_default() += 1;
                }
                ApplicationStatus::Approved => stats.approved += 1,
                ApplicationStatus::Rejected => stats.rejected += 1,
            }

            if let Some(rating) = application.ai_rating.filter(|rating| rating.is_finite()) {
                stats.rated += 1;
                rating_sum += f64::from(rating);
            }

            if application.created_at >= window_start && application.created_at <= now {
                stats.this_week += 1;
            }

            *stats
                .stage_counts
                .entry(application.pipeline_stage.as_str().to_string())
                .or_default() += 1;
        }

        if stats.rated > 0 {
            stats.average_rating = (rating_sum / stats.rated as f64) as f32;
        }

        stats.active_jobs = jobs
            .iter()
            .filter(|job| job.status == JobStatus::Active)
            .count();

        let mut needs_attention: Vec<JobId> = pending_by_job
            .into_iter()
            .filter(|(_, pending)| *pending >= NEEDS_ATTENTION_THRESHOLD)
            .map(|(job_id, _)| job_id.clone())
            .collect();
        needs_attention.sort();
        stats.needs_attention = needs_attention;

        stats
    }
}

/// Which slice of applications a dashboard covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DashboardScope {
    Job(JobId),
    Owner(OwnerId),
}

/// Dashboard reads over the application and job stores, recomputed on every call.
pub struct DashboardService {
    applications: Arc<dyn ApplicationRepository>,
    jobs: Arc<dyn JobRepository>,
}

impl DashboardService {
    pub fn new(applications: Arc<dyn ApplicationRepository>, jobs: Arc<dyn JobRepository>) -> Self {
        Self { applications, jobs }
    }

    pub fn stats(
        &self,
        owner: &OwnerId,
        scope: DashboardScope,
        now: DateTime<Utc>,
    ) -> Result<DashboardStats, ServiceError> {
        let (applications, jobs) = match &scope {
            DashboardScope::Job(job_id) => {
                let job = self.jobs.fetch(job_id)?.ok_or(RepositoryError::NotFound)?;
                if &job.owner != owner {
                    return Err(RepositoryError::PermissionDenied.into());
                }
                (self.applications.list_for_job(job_id)?, vec![job])
            }
            DashboardScope::Owner(scope_owner) => {
                if scope_owner != owner {
                    return Err(RepositoryError::PermissionDenied.into());
                }
                (
                    self.applications.list_for_owner(owner)?,
                    self.jobs.list_for_owner(owner)?,
                )
            }
        };

        Ok(DashboardStats::compute(&applications, &jobs, now))
    }
}
