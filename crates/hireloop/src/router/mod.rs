//! JSON HTTP surface over the hiring, e-mail, billing and preference services.
//!
//! Every owner-scoped route reads the caller from the `x-owner-id` header. Candidate intake and
//! inbound mail are open; the billing webhook must carry a valid body signature.

mod handlers;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::routing::{get, post};
use axum::Router;
use tokio_util::sync::CancellationToken;

use crate::billing::{PlanGate, SubscriptionRepository, WebhookVerifier};
use crate::config::{AppConfig, ScoringConfig};
use crate::email::{
    EmailLogRepository, EmailSender, EmailTransport, ThreadRepository, ThreadService,
};
use crate::error::ServiceError;
use crate::functions::{CandidateScorer, ContentGenerator, ResumeParser};
use crate::hiring::{
    ApplicationRepository, DashboardService, FileStore, IntakeService, JobRepository, JobService,
    OwnerId, PipelineService, ResumeService, ScoringService, StageRepository,
};
use crate::preferences::{PreferenceError, PreferenceStore, PreferencesService};

pub const OWNER_HEADER: &str = "x-owner-id";
pub const FILE_NAME_HEADER: &str = "x-file-name";

/// Storage and vendor adapters the services are built over.
pub struct Ports {
    pub applications: Arc<dyn ApplicationRepository>,
    pub jobs: Arc<dyn JobRepository>,
    pub stages: Arc<dyn StageRepository>,
    pub files: Arc<dyn FileStore>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub email_log: Arc<dyn EmailLogRepository>,
    pub threads: Arc<dyn ThreadRepository>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub scorer: Arc<dyn CandidateScorer>,
    pub parser: Arc<dyn ResumeParser>,
    pub generator: Arc<dyn ContentGenerator>,
    pub transport: Arc<dyn EmailTransport>,
}

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub from_address: String,
    pub scoring: ScoringConfig,
    pub max_resume_bytes: usize,
    pub webhook_secret: Option<String>,
}

impl ServiceSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            from_address: config.email.from_address.clone(),
            scoring: config.scoring.clone(),
            max_resume_bytes: config.uploads.max_resume_bytes,
            webhook_secret: config.billing.webhook_secret.clone(),
        }
    }
}

/// Shared service handles; cloned into every request.
#[derive(Clone)]
pub struct AppServices {
    pub jobs: Arc<JobService>,
    pub intake: Arc<IntakeService>,
    pub pipeline: Arc<PipelineService>,
    pub scoring: Arc<ScoringService>,
    pub resumes: Arc<ResumeService>,
    pub dashboard: Arc<DashboardService>,
    pub sender: Arc<EmailSender>,
    pub threads: Arc<ThreadService>,
    pub preferences: Arc<PreferencesService>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub webhooks: Arc<WebhookVerifier>,
    /// Parent token for batch rescoring; cancelling it stops running batches between groups.
    pub shutdown: CancellationToken,
}

impl AppServices {
    pub fn assemble(ports: Ports, settings: ServiceSettings) -> Result<Self, PreferenceError> {
        let plans = Arc::new(PlanGate::new(ports.subscriptions.clone()));
        let sender = Arc::new(EmailSender::new(
            ports.transport,
            ports.email_log,
            plans.clone(),
            settings.from_address,
        ));

        Ok(Self {
            jobs: Arc::new(JobService::new(ports.jobs.clone(), plans.clone(), ports.generator)),
            intake: Arc::new(IntakeService::new(
                ports.applications.clone(),
                ports.jobs.clone(),
                plans.clone(),
            )),
            pipeline: Arc::new(PipelineService::new(
                ports.applications.clone(),
                ports.jobs.clone(),
                ports.stages,
                sender.clone(),
            )),
            scoring: Arc::new(ScoringService::new(
                ports.applications.clone(),
                ports.jobs.clone(),
                ports.scorer,
                plans.clone(),
                settings.scoring,
            )),
            resumes: Arc::new(ResumeService::new(
                ports.applications.clone(),
                ports.files,
                ports.parser,
                plans,
                settings.max_resume_bytes,
            )),
            dashboard: Arc::new(DashboardService::new(ports.applications, ports.jobs)),
            threads: Arc::new(ThreadService::new(ports.threads, sender.clone())),
            sender,
            preferences: Arc::new(PreferencesService::new(ports.preferences)?),
            subscriptions: ports.subscriptions,
            webhooks: Arc::new(WebhookVerifier::new(settings.webhook_secret)),
            shutdown: CancellationToken::new(),
        })
    }
}

/// Authenticated caller taken from the `x-owner-id` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub OwnerId);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| Caller(OwnerId(value.to_string())))
            .ok_or(ServiceError::Unauthorized)
    }
}

/// Router builder exposing every hiring endpoint.
pub fn api_router(services: AppServices) -> Router {
    Router::new()
        .route(
            "/api/v1/jobs",
            post(handlers::create_job).get(handlers::list_jobs),
        )
        .route(
            "/api/v1/jobs/:job_id",
            get(handlers::show_job).put(handlers::update_job),
        )
        .route("/api/v1/jobs/:job_id/status", post(handlers::set_job_status))
        .route(
            "/api/v1/jobs/:job_id/content",
            post(handlers::generate_content),
        )
        .route(
            "/api/v1/jobs/:job_id/applications",
            post(handlers::submit_application).get(handlers::list_job_applications),
        )
        .route("/api/v1/jobs/:job_id/dashboard", get(handlers::job_dashboard))
        .route(
            "/api/v1/jobs/:job_id/top-candidates",
            get(handlers::top_candidates),
        )
        .route("/api/v1/dashboard", get(handlers::owner_dashboard))
        .route("/api/v1/applications/export", get(handlers::export_applications))
        .route("/api/v1/applications/stage", post(handlers::bulk_move_stage))
        .route("/api/v1/applications/rescore", post(handlers::rescore_batch))
        .route("/api/v1/applications/:id", get(handlers::show_application))
        .route("/api/v1/applications/:id/reject", post(handlers::reject))
        .route("/api/v1/applications/:id/unreject", post(handlers::unreject))
        .route("/api/v1/applications/:id/approve", post(handlers::approve))
        .route("/api/v1/applications/:id/unapprove", post(handlers::unapprove))
        .route("/api/v1/applications/:id/stage", post(handlers::move_stage))
        .route("/api/v1/applications/:id/rating", post(handlers::set_rating))
        .route("/api/v1/applications/:id/score", post(handlers::score))
        .route("/api/v1/applications/:id/resume", post(handlers::upload_resume))
        .route(
            "/api/v1/applications/:id/resume/parse",
            post(handlers::parse_resume),
        )
        .route("/api/v1/emails/send", post(handlers::send_emails))
        .route(
            "/api/v1/threads",
            get(handlers::list_threads).post(handlers::start_thread),
        )
        .route("/api/v1/threads/reconcile", post(handlers::reconcile_threads))
        .route("/api/v1/threads/:id/messages", get(handlers::thread_messages))
        .route("/api/v1/threads/:id/inbound", post(handlers::record_inbound))
        .route("/api/v1/threads/:id/read", post(handlers::mark_thread_read))
        .route(
            "/api/v1/preferences",
            get(handlers::get_preferences).put(handlers::update_preferences),
        )
        .route("/api/v1/billing/webhook", post(handlers::billing_webhook))
        .with_state(services)
}
