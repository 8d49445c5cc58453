//! Serverless AI functions: scoring, resume parsing and posting content generation.
//!
//! Every function is a synchronous JSON request/response call. The ports below return the raw
//! JSON body; callers validate it into typed results at the boundary.

mod client;
mod offline;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::hiring::domain::{ExperienceLevel, EmploymentType, ScreeningAnswer};

pub use client::FunctionsClient;
pub use offline::{KeywordScorer, Unconfigured};

#[derive(Debug, thiserror::Error)]
pub enum FunctionError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("function returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("function reported an error: {0}")]
    Vendor(String),
    #[error("invalid JSON from function: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("AI functions are not configured")]
    NotConfigured,
}

/// Payload for `analyze-application`.
#[derive(Debug, Clone, Serialize)]
pub struct ScoringRequest {
    pub instructions: String,
    pub job_title: String,
    pub job_description: String,
    pub answers: Vec<ScreeningAnswer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_text: Option<String>,
    pub rating_scale: f32,
}

/// Payload for `parse-resume`.
#[derive(Debug, Clone, Serialize)]
pub struct ResumeParseRequest {
    pub file_path: String,
    pub file_name: String,
    pub content_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    JobPost,
    SkillsTest,
    InterviewQuestions,
}

impl ContentKind {
    pub const fn function_name(self) -> &'static str {
        match self {
            ContentKind::JobPost => "generate-job-post",
            ContentKind::SkillsTest => "generate-skills-test",
            ContentKind::InterviewQuestions => "generate-interview-questions",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "job_post" => Some(ContentKind::JobPost),
            "skills_test" => Some(ContentKind::SkillsTest),
            "interview_questions" => Some(ContentKind::InterviewQuestions),
            _ => None,
        }
    }
}

/// Payload for the posting content generators.
#[derive(Debug, Clone, Serialize)]
pub struct ContentRequest {
    pub kind: ContentKind,
    pub title: String,
    pub description: String,
    pub employment_type: EmploymentType,
    pub experience_level: ExperienceLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
}

#[async_trait]
pub trait CandidateScorer: Send + Sync {
    async fn analyze(&self, request: &ScoringRequest) -> Result<Value, FunctionError>;
}

#[async_trait]
pub trait ResumeParser: Send + Sync {
    async fn parse(&self, request: &ResumeParseRequest) -> Result<Value, FunctionError>;
}

#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, request: &ContentRequest) -> Result<Value, FunctionError>;
}

/// Strips ```json ... ``` fences some models wrap around structured output.
pub(crate) fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let inner = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"));
    match inner {
        Some(body) => body
            .trim_start()
            .strip_suffix("```")
            .map(str::trim)
            .unwrap_or_else(|| body.trim()),
        None => text,
    }
}

/// Accept either a JSON object or a JSON document embedded in a text field.
pub(crate) fn unwrap_text_payload(value: Value) -> Value {
    match value {
        Value::String(text) => {
            serde_json::from_str(strip_json_fences(&text)).unwrap_or(Value::String(text))
        }
        other => other,
    }
}
