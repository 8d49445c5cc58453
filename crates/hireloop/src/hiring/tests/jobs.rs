use std::sync::Arc;

use serde_json::json;

use super::common::*;
use crate::billing::PlanType;
use crate::error::{RepositoryError, ServiceError};
use crate::functions::ContentKind;
use crate::hiring::domain::{EmploymentType, ExperienceLevel, JobDraft, JobLocation, JobStatus};
use crate::hiring::repository::JobRepository;

fn draft(title: &str, publish: bool) -> JobDraft {
    JobDraft {
        title: title.to_string(),
        description: "Own our ingestion pipelines".to_string(),
        company_name: Some("Northwind".to_string()),
        employment_type: EmploymentType::FullTime,
        experience_level: ExperienceLevel::Senior,
        location: JobLocation::default(),
        compensation: None,
        publish,
    }
}

#[test]
fn jobs_start_as_drafts_unless_published() {
    let fixture = Fixture::new(PlanType::Starter);
    let jobs = fixture.jobs(Arc::new(StaticGenerator::failing()));

    let drafted = jobs.create(&owner(), draft("Data Engineer", false)).expect("created");
    let published = jobs.create(&owner(), draft("Platform Engineer", true)).expect("created");

    assert_eq!(drafted.status, JobStatus::Draft);
    assert_eq!(published.status, JobStatus::Active);
    assert_eq!(jobs.list(&owner()).expect("listed").len(), 2);
}

#[test]
fn activation_is_limited_by_plan() {
    let fixture = Fixture::new(PlanType::Free);
    let jobs = fixture.jobs(Arc::new(StaticGenerator::failing()));
    jobs.create(&owner(), draft("Data Engineer", true)).expect("first active job");
    let second = jobs.create(&owner(), draft("Analyst", false)).expect("draft allowed");

    match jobs.set_status(&owner(), &second.id, JobStatus::Active) {
        Err(ServiceError::PlanLimit(_)) => {}
        other => panic!("expected plan limit error, got {other:?}"),
    }
    match jobs.create(&owner(), draft("Designer", true)) {
        Err(ServiceError::PlanLimit(_)) => {}
        other => panic!("expected plan limit error, got {other:?}"),
    }
}

#[test]
fn closed_jobs_cannot_be_reopened() {
    let fixture = Fixture::new(PlanType::Starter);
    let jobs = fixture.jobs(Arc::new(StaticGenerator::failing()));
    let job = jobs.create(&owner(), draft("Data Engineer", true)).expect("created");

    let paused = jobs.set_status(&owner(), &job.id, JobStatus::Paused).expect("paused");
    assert_eq!(paused.status, JobStatus::Paused);
    jobs.set_status(&owner(), &job.id, JobStatus::Closed).expect("closed");

    match jobs.set_status(&owner(), &job.id, JobStatus::Active) {
        Err(ServiceError::Validation(_)) => {}
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn blank_drafts_and_foreign_jobs_are_refused() {
    let fixture = Fixture::new(PlanType::Starter);
    let jobs = fixture.jobs(Arc::new(StaticGenerator::failing()));

    match jobs.create(&owner(), draft("  ", false)) {
        Err(ServiceError::Validation(_)) => {}
        other => panic!("expected validation error, got {other:?}"),
    }

    let job = jobs.create(&owner(), draft("Data Engineer", false)).expect("created");
    match jobs.update(&other_owner(), &job.id, draft("Hijacked", false)) {
        Err(ServiceError::Repository(RepositoryError::PermissionDenied)) => {}
        other => panic!("expected permission denied, got {other:?}"),
    }
    assert_eq!(jobs.record_view(&job.id).expect("view recorded"), 1);
    assert_eq!(jobs.record_view(&job.id).expect("view recorded"), 2);
}

#[test]
fn views_recorded_during_an_edit_survive_the_edit() {
    let fixture = Fixture::new(PlanType::Starter);
    let jobs = fixture.jobs(Arc::new(StaticGenerator::failing()));
    let job = jobs.create(&owner(), draft("Data Engineer", false)).expect("created");

    let mut stale = JobRepository::fetch(fixture.store.as_ref(), &job.id)
        .expect("fetch succeeds")
        .expect("job present");
    assert_eq!(jobs.record_view(&job.id).expect("view recorded"), 1);
    stale.title = "Staff Data Engineer".to_string();
    JobRepository::update(fixture.store.as_ref(), stale).expect("update succeeds");

    let stored = jobs.get(&job.id).expect("job present");
    assert_eq!(stored.title, "Staff Data Engineer");
    assert_eq!(stored.view_count, 1);
    assert_eq!(jobs.record_view(&job.id).expect("view recorded"), 2);
}

#[tokio::test]
async fn generated_content_is_stored_per_kind() {
    let fixture = Fixture::new(PlanType::Starter);
    let jobs = fixture.jobs(Arc::new(StaticGenerator::returning(json!({
        "questions": ["Describe a pipeline you built", "How do you test it?"]
    }))));
    let job = jobs.create(&owner(), draft("Data Engineer", false)).expect("created");

    let updated = jobs
        .generate_content(&owner(), &job.id, ContentKind::InterviewQuestions)
        .await
        .expect("content generated");

    assert_eq!(
        updated.generated.interview_questions.as_deref(),
        Some("Describe a pipeline you built\nHow do you test it?")
    );
    assert_eq!(updated.generated.job_post, None);
}

#[tokio::test]
async fn failed_generation_leaves_the_job_unchanged() {
    let fixture = Fixture::new(PlanType::Starter);
    let jobs = fixture.jobs(Arc::new(StaticGenerator::failing()));
    let job = jobs.create(&owner(), draft("Data Engineer", false)).expect("created");

    match jobs.generate_content(&owner(), &job.id, ContentKind::JobPost).await {
        Err(ServiceError::External { .. }) => {}
        other => panic!("expected external error, got {other:?}"),
    }
    assert_eq!(jobs.get(&job.id).expect("job present"), job);
}
