use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Authenticated account owning jobs, applications and threads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub String);

/// Identifier wrapper for job postings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    pub fn generate() -> Self {
        Self(format!("job-{}", Uuid::new_v4().simple()))
    }
}

/// Identifier wrapper for submitted applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub String);

impl ApplicationId {
    pub fn generate() -> Self {
        Self(format!("app-{}", Uuid::new_v4().simple()))
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Draft,
    Active,
    Paused,
    Closed,
}

impl JobStatus {
    pub const fn label(self) -> &'static str {
        match self {
            JobStatus::Draft => "draft",
            JobStatus::Active => "active",
            JobStatus::Paused => "paused",
            JobStatus::Closed => "closed",
        }
    }

    /// Closed postings are archived, never reopened.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        match (self, next) {
            (current, next) if current == next => true,
            (JobStatus::Closed, _) => false,
            (_, JobStatus::Draft) => false,
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentType {
    FullTime,
    PartTime,
    Contract,
    Freelance,
    Internship,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceLevel {
    Entry,
    Mid,
    Senior,
    Lead,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobLocation {
    pub city: Option<String>,
    pub country: Option<String>,
    #[serde(default)]
    pub remote: bool,
}

/// Pay is either a salary band (employment) or a fixed budget over a duration (freelance).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Compensation {
    Salary {
        min: Option<u32>,
        max: Option<u32>,
        currency: String,
    },
    Budget {
        amount: u32,
        currency: String,
        duration: Option<String>,
    },
}

/// AI generated artifacts attached to a posting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub job_post: Option<String>,
    pub skills_test: Option<String>,
    pub interview_questions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub owner: OwnerId,
    pub title: String,
    pub description: String,
    pub company_name: Option<String>,
    pub employment_type: EmploymentType,
    pub experience_level: ExperienceLevel,
    pub location: JobLocation,
    pub compensation: Option<Compensation>,
    pub status: JobStatus,
    pub generated: GeneratedContent,
    pub view_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller supplied fields for a new or edited posting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDraft {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub company_name: Option<String>,
    pub employment_type: EmploymentType,
    pub experience_level: ExperienceLevel,
    #[serde(default)]
    pub location: JobLocation,
    #[serde(default)]
    pub compensation: Option<Compensation>,
    #[serde(default)]
    pub publish: bool,
}

/// Current step of an application in the hiring workflow.
///
/// Labels are free-form per owner; `applied` and `rejected` are reserved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineStage(String);

impl PipelineStage {
    pub const APPLIED: &'static str = "applied";
    pub const REJECTED: &'static str = "rejected";

    pub fn new(label: impl AsRef<str>) -> Self {
        Self(label.as_ref().trim().to_ascii_lowercase())
    }

    pub fn applied() -> Self {
        Self(Self::APPLIED.to_string())
    }

    pub fn rejected() -> Self {
        Self(Self::REJECTED.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_rejected(&self) -> bool {
        self.0 == Self::REJECTED
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// High level review status tracked alongside the pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateIdentity {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub links: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreeningAnswer {
    pub question: String,
    pub answer: String,
}

/// Storage path of an uploaded resume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeRef {
    pub path: String,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkExperience {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Education {
    #[serde(default)]
    pub institution: Option<String>,
    #[serde(default)]
    pub degree: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub graduation_year: Option<String>,
}

/// Structured resume fields produced by the parsing function.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedResume {
    #[serde(default)]
    pub work_experience: Vec<WorkExperience>,
    #[serde(default)]
    pub education: Vec<Education>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub raw: Option<serde_json::Value>,
}

impl ParsedResume {
    pub fn is_empty(&self) -> bool {
        self.work_experience.is_empty()
            && self.education.is_empty()
            && self.skills.is_empty()
            && self.raw.as_ref().map(json_is_blank).unwrap_or(true)
    }

    pub(crate) fn blank_raw(value: &serde_json::Value) -> bool {
        json_is_blank(value)
    }

    /// Flattened text used as extra scoring context.
    pub fn summary_text(&self) -> String {
        let mut lines = Vec::new();
        for role in &self.work_experience {
            let title = role.title.as_deref().unwrap_or("Role");
            match role.company.as_deref() {
                Some(company) => lines.push(format!("{title} at {company}")),
                None => lines.push(title.to_string()),
            }
        }
        for school in &self.education {
            let degree = school.degree.as_deref().unwrap_or("Studies");
            match school.institution.as_deref() {
                Some(institution) => lines.push(format!("{degree}, {institution}")),
                None => lines.push(degree.to_string()),
            }
        }
        if !self.skills.is_empty() {
            lines.push(format!("Skills: {}", self.skills.join(", ")));
        }
        lines.join("\n")
    }
}

fn json_is_blank(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::String(text) => text.trim().is_empty(),
        serde_json::Value::Array(items) => items.is_empty(),
        serde_json::Value::Object(fields) => fields.is_empty(),
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub job_id: JobId,
    pub owner: OwnerId,
    pub candidate: CandidateIdentity,
    pub answers: Vec<ScreeningAnswer>,
    pub resume: Option<ResumeRef>,
    pub parsed_resume: Option<ParsedResume>,
    pub ai_rating: Option<f32>,
    pub ai_summary: Option<String>,
    pub manual_rating: Option<u8>,
    pub status: ApplicationStatus,
    pub pipeline_stage: PipelineStage,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn is_rejected(&self) -> bool {
        self.status == ApplicationStatus::Rejected
    }

    /// `rejected` status, `rejected` stage and a reason always travel together.
    pub fn rejection_fields_consistent(&self) -> bool {
        let rejected_status = self.status == ApplicationStatus::Rejected;
        let rejected_shape = self.pipeline_stage.is_rejected() && self.rejection_reason.is_some();
        rejected_status == rejected_shape
    }

    pub fn has_answers(&self) -> bool {
        self.answers
            .iter()
            .any(|answer| !answer.answer.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_stage_normalizes_labels() {
        assert_eq!(PipelineStage::new("  Interview "), PipelineStage::new("interview"));
        assert!(PipelineStage::new("REJECTED").is_rejected());
        assert!(!PipelineStage::applied().is_rejected());
    }

    #[test]
    fn closed_jobs_are_terminal() {
        assert!(JobStatus::Draft.can_transition_to(JobStatus::Active));
        assert!(JobStatus::Active.can_transition_to(JobStatus::Paused));
        assert!(JobStatus::Paused.can_transition_to(JobStatus::Active));
        assert!(JobStatus::Active.can_transition_to(JobStatus::Closed));
        assert!(!JobStatus::Closed.can_transition_to(JobStatus::Active));
        assert!(!JobStatus::Active.can_transition_to(JobStatus::Draft));
    }

    #[test]
    fn parsed_resume_emptiness_ignores_blank_raw_payloads() {
        let blank = ParsedResume {
            raw: Some(serde_json::json!({})),
            ..ParsedResume::default()
        };
        assert!(blank.is_empty());

        let skilled = ParsedResume {
            skills: vec!["Rust".to_string()],
            ..ParsedResume::default()
        };
        assert!(!skilled.is_empty());
        assert_eq!(skilled.summary_text(), "Skills: Rust");
    }
}
