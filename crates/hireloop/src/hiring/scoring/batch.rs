use futures::future::join_all;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{ScoringOutcome, ScoringService};
use crate::billing::Feature;
use crate::error::ServiceError;
use crate::hiring::domain::{ApplicationId, OwnerId};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemOutcome {
    Scored { rating: f32 },
    Skipped { reason: String },
    Failed { error: String },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchItem {
    pub application_id: ApplicationId,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
}

/// Per-item summary. `processed` counts attempted items; skipped items count as failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub items: Vec<BatchItem>,
}

impl BatchReport {
    fn record(&mut self, application_id: ApplicationId, outcome: ItemOutcome) {
        match &outcome {
            ItemOutcome::Scored { .. } => {
                self.processed += 1;
                self.successful += 1;
            }
            ItemOutcome::Skipped { .. } | ItemOutcome::Failed { .. } => {
                self.processed += 1;
                self.failed += 1;
            }
            ItemOutcome::Cancelled => self.cancelled += 1,
        }
        self.items.push(BatchItem {
            application_id,
            outcome,
        });
    }
}

impl ScoringService {
    /// Rescore `ids` in fixed-size groups with a pause between groups.
    ///
    /// Items inside a group run concurrently and fail independently; completed writes stay
    /// committed. Cancellation is observed between groups, and calls already sent are awaited.
    pub async fn rescore_batch(
        &self,
        owner: &OwnerId,
        ids: &[ApplicationId],
        cancel: &CancellationToken,
    ) -> Result<BatchReport, ServiceError> {
        self.plans.ensure_feature(owner, Feature::AiScoring)?;

        let batch_size = self.config.batch_size.max(1);
        let mut report = BatchReport::default();
        let mut groups = ids.chunks(batch_size).peekable();

        while let Some(group) = groups.next() {
            if cancel.is_cancelled() {
                for id in group.iter().chain(groups.by_ref().flatten()) {
                    report.record(id.clone(), ItemOutcome::Cancelled);
                }
                break;
            }

            let results = join_all(group.iter().map(|id| self.score_unchecked(owner, id))).await;
            for (id, result) in group.iter().zip(results) {
                let outcome = match result {
                    Ok(ScoringOutcome::Scored { application }) => ItemOutcome::Scored {
                        rating: application.ai_rating.unwrap_or_default(),
                    },
                    Ok(ScoringOutcome::Skipped { reason }) => ItemOutcome::Skipped { reason },
                    Err(err) => {
                        warn!(application_id = %id, error = %err, "batch item failed");
                        ItemOutcome::Failed {
                            error: err.to_string(),
                        }
                    }
                };
                report.record(id.clone(), outcome);
            }

            if groups.peek().is_some() && !self.config.batch_delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.config.batch_delay) => {}
                }
            }
        }

        info!(
            owner = %owner,
            processed = report.processed,
            successful = report.successful,
            failed = report.failed,
            cancelled = report.cancelled,
            "batch rescoring finished"
        );
        Ok(report)
    }
}
