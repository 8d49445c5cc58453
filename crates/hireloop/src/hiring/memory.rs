use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::domain::{Application, ApplicationId, Job, JobId, OwnerId, PipelineStage};
use super::repository::{
    ApplicationPatch, ApplicationRepository, FileStore, HiringStage, JobRepository,
    StageRepository,
};
use crate::error::RepositoryError;

fn lock<'a, T>(mutex: &'a Mutex<T>, name: &str) -> Result<MutexGuard<'a, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable(format!("{name} lock poisoned")))
}

/// Process-local store backing jobs, applications and hiring stages.
#[derive(Default, Clone)]
pub struct InMemoryHiringStore {
    jobs: Arc<Mutex<HashMap<JobId, Job>>>,
    applications: Arc<Mutex<HashMap<ApplicationId, Application>>>,
    stages: Arc<Mutex<HashMap<OwnerId, Vec<HiringStage>>>>,
}

impl InMemoryHiringStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_applications(mut applications: Vec<Application>) -> Vec<Application> {
    applications.sort_by(|left, right| {
        left.created_at
            .cmp(&right.created_at)
            .then_with(|| left.id.cmp(&right.id))
    });
    applications
}

impl ApplicationRepository for InMemoryHiringStore {
    fn insert(&self, application: Application) -> Result<Application, RepositoryError> {
        let mut guard = lock(&self.applications, "applications")?;
        if guard.contains_key(&application.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(application.id.clone(), application.clone());
        Ok(application)
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError> {
        let guard = lock(&self.applications, "applications")?;
        Ok(guard.get(id).cloned())
    }

    fn patch(
        &self,
        id: &ApplicationId,
        patch: ApplicationPatch,
        at: DateTime<Utc>,
    ) -> Result<Application, RepositoryError> {
        let mut guard = lock(&self.applications, "applications")?;
        let application = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        patch.apply_to(application, at);
        Ok(application.clone())
    }

    fn update_stage_many(
        &self,
        ids: &[ApplicationId],
        stage: &PipelineStage,
        at: DateTime<Utc>,
    ) -> Result<Vec<Application>, RepositoryError> {
        let mut guard = lock(&self.applications, "applications")?;
        let mut updated = Vec::new();
        for id in ids {
            if let Some(application) = guard.get_mut(id) {
                if application.is_rejected() {
                    continue;
                }
                application.pipeline_stage = stage.clone();
                application.updated_at = at;
                updated.push(application.clone());
            }
        }
        Ok(updated)
    }

    fn list_for_job(&self, job_id: &JobId) -> Result<Vec<Application>, RepositoryError> {
        let guard = lock(&self.applications, "applications")?;
        Ok(sorted_applications(
            guard
                .values()
                .filter(|application| &application.job_id == job_id)
                .cloned()
                .collect(),
        ))
    }

    fn list_for_owner(&self, owner: &OwnerId) -> Result<Vec<Application>, RepositoryError> {
        let guard = lock(&self.applications, "applications")?;
        Ok(sorted_applications(
            guard
                .values()
                .filter(|application| &application.owner == owner)
                .cloned()
                .collect(),
        ))
    }
}

impl JobRepository for InMemoryHiringStore {
    fn insert(&self, job: Job) -> Result<Job, RepositoryError> {
        let mut guard = lock(&self.jobs, "jobs")?;
        if guard.contains_key(&job.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(job.id.clone(), job.clone());
        Ok(job)
    }

    fn update(&self, job: Job) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.jobs, "jobs")?;
        match guard.get_mut(&job.id) {
            Some(existing) => {
                let view_count = existing.view_count;
                *existing = Job { view_count, ..job };
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn increment_views(&self, id: &JobId) -> Result<u64, RepositoryError> {
        let mut guard = lock(&self.jobs, "jobs")?;
        let job = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        job.view_count += 1;
        Ok(job.view_count)
    }

    fn fetch(&self, id: &JobId) -> Result<Option<Job>, RepositoryError> {
        let guard = lock(&self.jobs, "jobs")?;
        Ok(guard.get(id).cloned())
    }

    fn list_for_owner(&self, owner: &OwnerId) -> Result<Vec<Job>, RepositoryError> {
        let guard = lock(&self.jobs, "jobs")?;
        let mut jobs: Vec<Job> = guard
            .values()
            .filter(|job| &job.owner == owner)
            .cloned()
            .collect();
        jobs.sort_by(|left, right| {
            right
                .created_at
                .cmp(&left.created_at)
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(jobs)
    }
}

impl StageRepository for InMemoryHiringStore {
    fn stages_for(&self, owner: &OwnerId) -> Result<Vec<HiringStage>, RepositoryError> {
        let guard = lock(&self.stages, "stages")?;
        Ok(guard
            .get(owner)
            .cloned()
            .unwrap_or_else(HiringStage::defaults))
    }

    fn replace(&self, owner: &OwnerId, mut stages: Vec<HiringStage>) -> Result<(), RepositoryError> {
        stages.sort_by_key(|stage| stage.position);
        let mut guard = lock(&self.stages, "stages")?;
        guard.insert(owner.clone(), stages);
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct StoredFile {
    bytes: Vec<u8>,
    content_type: String,
}

/// Bucket stand-in keyed by object path.
#[derive(Default, Clone)]
pub struct InMemoryFileStore {
    files: Arc<Mutex<HashMap<String, StoredFile>>>,
}

impl InMemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content_type(&self, path: &str) -> Option<String> {
        let guard = self.files.lock().ok()?;
        guard.get(path).map(|file| file.content_type.clone())
    }
}

impl FileStore for InMemoryFileStore {
    fn exists(&self, path: &str) -> Result<bool, RepositoryError> {
        Ok(lock(&self.files, "files")?.contains_key(path))
    }

    fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.files, "files")?;
        guard.insert(
            path.to_string(),
            StoredFile {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    fn get(&self, path: &str) -> Result<Option<Vec<u8>>, RepositoryError> {
        let guard = lock(&self.files, "files")?;
        Ok(guard.get(path).map(|file| file.bytes.clone()))
    }
}
