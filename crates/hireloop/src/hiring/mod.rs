//! Jobs, candidate applications and the hiring pipeline around them.
//!
//! Storage is reached through the synchronous repository ports in [`repository`]; AI calls go
//! through the async ports in [`crate::functions`]. Services own `Arc`s of both so the router
//! can share a single instance across requests.

pub mod dashboard;
pub mod domain;
pub mod export;
pub mod intake;
pub mod jobs;
pub mod memory;
pub mod pipeline;
pub mod repository;
pub mod resume;
pub mod scoring;

#[cfg(test)]
mod tests;

pub use dashboard::{DashboardScope, DashboardService, DashboardStats, NEEDS_ATTENTION_THRESHOLD};
pub use domain::{
    Application, ApplicationId, ApplicationStatus, CandidateIdentity, Compensation, Education,
    EmploymentType, ExperienceLevel, GeneratedContent, Job, JobDraft, JobId, JobLocation,
    JobStatus, OwnerId, ParsedResume, PipelineStage, ResumeRef, ScreeningAnswer, WorkExperience,
};
pub use export::{export_csv, write_csv};
pub use intake::{ApplicationSubmission, IntakeService};
pub use jobs::JobService;
pub use memory::{InMemoryFileStore, InMemoryHiringStore};
pub use pipeline::{NotificationOutcome, PipelineService, RejectionReport, StateOutcome};
pub use repository::{
    ApplicationPatch, ApplicationRepository, FileStore, HiringStage, JobRepository,
    StageRepository,
};
pub use resume::{ParseOutcome, ResumeService};
pub use scoring::{
    top_candidates, BatchItem, BatchReport, ItemOutcome, ScoreVerdict, ScoringOutcome,
    ScoringService, TOP_CANDIDATE_MIN_RATING,
};
