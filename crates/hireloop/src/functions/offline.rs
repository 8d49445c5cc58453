//! Local stand-ins used when no AI functions endpoint is configured.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{
    CandidateScorer, ContentGenerator, ContentRequest, FunctionError, ResumeParseRequest,
    ResumeParser, ScoringRequest,
};

const MIN_KEYWORD_LEN: usize = 4;
const STOP_WORDS: &[&str] = &[
    "about", "also", "and", "are", "both", "from", "have", "into", "more", "only", "other",
    "that", "their", "them", "they", "this", "with", "will", "within", "work", "your", "you",
];

/// Deterministic scorer: rates answers by how many description keywords they cover.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordScorer;

impl KeywordScorer {
    fn keywords(text: &str) -> BTreeSet<String> {
        text.split(|c: char| !c.is_alphanumeric() && c != '+' && c != '#')
            .map(str::to_lowercase)
            .filter(|word| word.chars().count() >= MIN_KEYWORD_LEN)
            .filter(|word| !STOP_WORDS.contains(&word.as_str()))
            .collect()
    }

    /// Rating in `1..=scale`, rounded to the nearest half point.
    pub fn rate(request: &ScoringRequest) -> (f32, Vec<String>) {
        let wanted = Self::keywords(&request.job_description);
        let mut evidence: String = request
            .answers
            .iter()
            .map(|answer| answer.answer.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        if let Some(resume) = &request.resume_text {
            evidence.push(' ');
            evidence.push_str(resume);
        }
        let offered = Self::keywords(&evidence);

        let matched: Vec<String> = wanted.intersection(&offered).cloned().collect();
        let scale = request.rating_scale.max(1.0);
        let coverage = if wanted.is_empty() {
            0.0
        } else {
            matched.len() as f32 / wanted.len() as f32
        };
        let rating = ((1.0 + coverage * (scale - 1.0)) * 2.0).round() / 2.0;
        (rating.clamp(1.0, scale), matched)
    }
}

#[async_trait]
impl CandidateScorer for KeywordScorer {
    async fn analyze(&self, request: &ScoringRequest) -> Result<Value, FunctionError> {
        let (rating, matched) = Self::rate(request);
        let summary = if matched.is_empty() {
            "Answers share no keywords with the job description.".to_string()
        } else {
            format!("Answers mention {}.", matched.join(", "))
        };
        Ok(json!({ "rating": rating, "summary": summary }))
    }
}

/// Parser and generator that always report missing configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unconfigured;

#[async_trait]
impl ResumeParser for Unconfigured {
    async fn parse(&self, _request: &ResumeParseRequest) -> Result<Value, FunctionError> {
        Err(FunctionError::NotConfigured)
    }
}

#[async_trait]
impl ContentGenerator for Unconfigured {
    async fn generate(&self, _request: &ContentRequest) -> Result<Value, FunctionError> {
        Err(FunctionError::NotConfigured)
    }
}
