//! AI candidate scoring: single applications, throttled batches and top-candidate selection.

mod batch;
mod verdict;

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use super::domain::{Application, ApplicationId, OwnerId};
use super::intake::owned_application;
use super::repository::{ApplicationPatch, ApplicationRepository, JobRepository};
use crate::billing::{Feature, PlanGate};
use crate::config::ScoringConfig;
use crate::error::{RepositoryError, ServiceError};
use crate::functions::{CandidateScorer, ScoringRequest};

pub use batch::{BatchItem, BatchReport, ItemOutcome};
pub use verdict::{scoring_instructions, ScoreVerdict};

/// Minimum rating for a candidate to be surfaced as a top candidate.
pub const TOP_CANDIDATE_MIN_RATING: f32 = 2.5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScoringOutcome {
    Scored { application: Box<Application> },
    Skipped { reason: String },
}

pub struct ScoringService {
    applications: Arc<dyn ApplicationRepository>,
    jobs: Arc<dyn JobRepository>,
    scorer: Arc<dyn CandidateScorer>,
    plans: Arc<PlanGate>,
    config: ScoringConfig,
}

impl ScoringService {
    pub fn new(
        applications: Arc<dyn ApplicationRepository>,
        jobs: Arc<dyn JobRepository>,
        scorer: Arc<dyn CandidateScorer>,
        plans: Arc<PlanGate>,
        config: ScoringConfig,
    ) -> Self {
        Self {
            applications,
            jobs,
            scorer,
            plans,
            config,
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score one application. Nothing is written unless the response validates.
    pub async fn score(
        &self,
        owner: &OwnerId,
        id: &ApplicationId,
    ) -> Result<ScoringOutcome, ServiceError> {
        self.plans.ensure_feature(owner, Feature::AiScoring)?;
        self.score_unchecked(owner, id).await
    }

    async fn score_unchecked(
        &self,
        owner: &OwnerId,
        id: &ApplicationId,
    ) -> Result<ScoringOutcome, ServiceError> {
        let application = owned_application(self.applications.as_ref(), owner, id)?;
        let job = self
            .jobs
            .fetch(&application.job_id)?
            .ok_or(RepositoryError::NotFound)?;

        if job.description.trim().is_empty() {
            return Ok(ScoringOutcome::Skipped {
                reason: "job description is empty".to_string(),
            });
        }
        if !application.has_answers() {
            return Ok(ScoringOutcome::Skipped {
                reason: "candidate has no answers".to_string(),
            });
        }

        let request = ScoringRequest {
            instructions: scoring_instructions(self.config.rating_scale),
            job_title: job.title.clone(),
            job_description: job.description.clone(),
            answers: application
                .answers
                .iter()
                .filter(|answer| !answer.answer.trim().is_empty())
                .cloned()
                .collect(),
            resume_text: application
                .parsed_resume
                .as_ref()
                .map(|parsed| parsed.summary_text())
                .filter(|text| !text.is_empty()),
            rating_scale: self.config.rating_scale,
        };

        let response = self.scorer.analyze(&request).await.map_err(|err| {
            warn!(application_id = %id, error = %err, "scoring call failed");
            ServiceError::external("AI scoring", err)
        })?;

        let (rating, summary) = match ScoreVerdict::from_value(response, self.config.rating_scale) {
            ScoreVerdict::Rated { rating, summary } => (rating, summary),
            ScoreVerdict::ParseError { reason } => {
                warn!(application_id = %id, %reason, "scoring response rejected");
                return Err(ServiceError::external("AI scoring", reason));
            }
        };

        let patch = ApplicationPatch {
            ai_rating: Some(rating),
            ai_summary: Some(summary),
            ..ApplicationPatch::default()
        };
        let updated = self.applications.patch(id, patch, Utc::now())?;
        info!(application_id = %id, rating, "application scored");
        Ok(ScoringOutcome::Scored {
            application: Box::new(updated),
        })
    }
}

/// Best rated applications: the top tenth (at least one) of the rated set, floored at 2.5.
pub fn top_candidates(applications: &[Application]) -> Vec<Application> {
    let mut rated: Vec<&Application> = applications
        .iter()
        .filter(|application| application.ai_rating.is_some_and(f32::is_finite))
        .collect();
    if rated.is_empty() {
        return Vec::new();
    }

    rated.sort_by(|left, right| {
        let left_rating = left.ai_rating.unwrap_or_default();
        let right_rating = right.ai_rating.unwrap_or_default();
        right_rating
            .total_cmp(&left_rating)
            .then_with(|| left.created_at.cmp(&right.created_at))
    });
    let take = rated.len().div_ceil(10).max(1);

    rated
        .into_iter()
        .take(take)
        .filter(|application| {
            application
                .ai_rating
                .is_some_and(|rating| rating >= TOP_CANDIDATE_MIN_RATING)
        })
        .cloned()
        .collect()
}
