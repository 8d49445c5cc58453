use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use super::{AppServices, Caller, FILE_NAME_HEADER};
use crate::billing::{apply_webhook, WebhookOutcome, SIGNATURE_HEADER};
use crate::email::{
    DeliveryReport, EmailMessage, EmailTemplate, EmailThread, InboundMessage, NewThread,
    Recipient, ReconcileReport, ThreadError, ThreadId,
};
use crate::error::{RepositoryError, ServiceError};
use crate::functions::ContentKind;
use crate::hiring::{
    export_csv, top_candidates as select_top_candidates, Application, ApplicationId,
    ApplicationSubmission, BatchReport, DashboardScope, DashboardStats, Job, JobDraft, JobId,
    JobStatus, ParseOutcome, ScoringOutcome, StateOutcome,
};
use crate::preferences::{Preferences, PreferencesUpdate};

type ApiResult<T> = Result<T, ServiceError>;

#[derive(Debug, Deserialize)]
pub(crate) struct StatusBody {
    status: JobStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContentBody {
    kind: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RejectBody {
    reason: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StageBody {
    stage: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BulkStageBody {
    ids: Vec<ApplicationId>,
    stage: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RatingBody {
    rating: u8,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RescoreBody {
    ids: Vec<ApplicationId>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SendBody {
    template: EmailTemplate,
    recipients: Vec<Recipient>,
}

pub(crate) async fn create_job(
    State(services): State<AppServices>,
    Caller(owner): Caller,
    Json(draft): Json<JobDraft>,
) -> ApiResult<(StatusCode, Json<Job>)> {
    let job = services.jobs.create(&owner, draft)?;
    Ok((StatusCode::CREATED, Json(job)))
}

pub(crate) async fn list_jobs(
    State(services): State<AppServices>,
    Caller(owner): Caller,
) -> ApiResult<Json<Vec<Job>>> {
    Ok(Json(services.jobs.list(&owner)?))
}

/// Public posting view; counts a view and hides postings that are not live.
pub(crate) async fn show_job(
    State(services): State<AppServices>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<Job>> {
    let job_id = JobId(job_id);
    let job = services.jobs.get(&job_id)?;
    if job.status != JobStatus::Active {
        return Err(RepositoryError::NotFound.into());
    }
    let view_count = services.jobs.record_view(&job_id)?;
    Ok(Json(Job { view_count, ..job }))
}

pub(crate) async fn update_job(
    State(services): State<AppServices>,
    Caller(owner): Caller,
    Path(job_id): Path<String>,
    Json(draft): Json<JobDraft>,
) -> ApiResult<Json<Job>> {
    Ok(Json(services.jobs.update(&owner, &JobId(job_id), draft)?))
}

pub(crate) async fn set_job_status(
    State(services): State<AppServices>,
    Caller(owner): Caller,
    Path(job_id): Path<String>,
    Json(body): Json<StatusBody>,
) -> ApiResult<Json<Job>> {
    Ok(Json(services.jobs.set_status(
        &owner,
        &JobId(job_id),
        body.status,
    )?))
}

pub(crate) async fn generate_content(
    State(services): State<AppServices>,
    Caller(owner): Caller,
    Path(job_id): Path<String>,
    Json(body): Json<ContentBody>,
) -> ApiResult<Json<Job>> {
    let kind = ContentKind::parse(&body.kind).ok_or_else(|| {
        ServiceError::validation(format!("unknown content kind '{}'", body.kind))
    })?;
    let job = services
        .jobs
        .generate_content(&owner, &JobId(job_id), kind)
        .await?;
    Ok(Json(job))
}

pub(crate) async fn submit_application(
    State(services): State<AppServices>,
    Path(job_id): Path<String>,
    Json(submission): Json<ApplicationSubmission>,
) -> ApiResult<(StatusCode, Json<Application>)> {
    let application = services.intake.submit(&JobId(job_id), submission)?;
    Ok((StatusCode::CREATED, Json(application)))
}

pub(crate) async fn list_job_applications(
    State(services): State<AppServices>,
    Caller(owner): Caller,
    Path(job_id): Path<String>,
) -> ApiResult<Json<Vec<Application>>> {
    Ok(Json(services.intake.list_for_job(&owner, &JobId(job_id))?))
}

pub(crate) async fn job_dashboard(
    State(services): State<AppServices>,
    Caller(owner): Caller,
    Path(job_id): Path<String>,
) -> ApiResult<Json<DashboardStats>> {
    let scope = DashboardScope::Job(JobId(job_id));
    Ok(Json(services.dashboard.stats(&owner, scope, Utc::now())?))
}

pub(crate) async fn owner_dashboard(
    State(services): State<AppServices>,
    Caller(owner): Caller,
) -> ApiResult<Json<DashboardStats>> {
    let scope = DashboardScope::Owner(owner.clone());
    Ok(Json(services.dashboard.stats(&owner, scope, Utc::now())?))
}

pub(crate) async fn top_candidates(
    State(services): State<AppServices>,
    Caller(owner): Caller,
    Path(job_id): Path<String>,
) -> ApiResult<Json<Vec<Application>>> {
    let applications = services.intake.list_for_job(&owner, &JobId(job_id))?;
    Ok(Json(select_top_candidates(&applications)))
}

pub(crate) async fn export_applications(
    State(services): State<AppServices>,
    Caller(owner): Caller,
) -> Response {
    let applications = match services.intake.list_for_owner(&owner) {
        Ok(applications) => applications,
        Err(err) => return err.into_response(),
    };
    match export_csv(&applications) {
        Ok(body) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"applications.csv\"",
                ),
            ],
            body,
        )
            .into_response(),
        Err(err) => {
            error!(owner = %owner, error = %err, "csv export failed");
            let payload = json!({
                "error": "export failed",
                "code": "EXPORT_ERROR",
            });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn show_application(
    State(services): State<AppServices>,
    Caller(owner): Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<Application>> {
    Ok(Json(services.intake.get(&owner, &ApplicationId(id))?))
}

/// Reports both rejection steps; a failed row update keeps the e-mail result in the body.
pub(crate) async fn reject(
    State(services): State<AppServices>,
    Caller(owner): Caller,
    Path(id): Path<String>,
    Json(body): Json<RejectBody>,
) -> Response {
    let id = ApplicationId(id);
    match services.pipeline.reject(&owner, &id, &body.reason).await {
        Ok(report) => match report.state {
            StateOutcome::Applied(application) => {
                let payload = json!({
                    "application_id": report.application_id,
                    "notification": report.notification,
                    "state": "applied",
                    "application": application,
                });
                (StatusCode::OK, Json(payload)).into_response()
            }
            StateOutcome::Failed(err) => {
                let status = ServiceError::Repository(err.clone()).status();
                let payload = json!({
                    "application_id": report.application_id,
                    "notification": report.notification,
                    "state": "failed",
                    "error": err.user_message(),
                });
                (status, Json(payload)).into_response()
            }
        },
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn unreject(
    State(services): State<AppServices>,
    Caller(owner): Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<Application>> {
    Ok(Json(services.pipeline.unreject(&owner, &ApplicationId(id))?))
}

pub(crate) async fn approve(
    State(services): State<AppServices>,
    Caller(owner): Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<Application>> {
    Ok(Json(services.pipeline.approve(&owner, &ApplicationId(id))?))
}

pub(crate) async fn unapprove(
    State(services): State<AppServices>,
    Caller(owner): Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<Application>> {
    Ok(Json(services.pipeline.unapprove(&owner, &ApplicationId(id))?))
}

pub(crate) async fn move_stage(
    State(services): State<AppServices>,
    Caller(owner): Caller,
    Path(id): Path<String>,
    Json(body): Json<StageBody>,
) -> ApiResult<Json<Application>> {
    Ok(Json(services.pipeline.move_stage(
        &owner,
        &ApplicationId(id),
        &body.stage,
    )?))
}

pub(crate) async fn bulk_move_stage(
    State(services): State<AppServices>,
    Caller(owner): Caller,
    Json(body): Json<BulkStageBody>,
) -> ApiResult<Json<Value>> {
    let updated = services
        .pipeline
        .bulk_move_stage(&owner, &body.ids, &body.stage)?;
    Ok(Json(json!({ "updated": updated })))
}

pub(crate) async fn set_rating(
    State(services): State<AppServices>,
    Caller(owner): Caller,
    Path(id): Path<String>,
    Json(body): Json<RatingBody>,
) -> ApiResult<Json<Application>> {
    Ok(Json(services.intake.set_manual_rating(
        &owner,
        &ApplicationId(id),
        body.rating,
    )?))
}

pub(crate) async fn score(
    State(services): State<AppServices>,
    Caller(owner): Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<ScoringOutcome>> {
    Ok(Json(
        services.scoring.score(&owner, &ApplicationId(id)).await?,
    ))
}

pub(crate) async fn rescore_batch(
    State(services): State<AppServices>,
    Caller(owner): Caller,
    Json(body): Json<RescoreBody>,
) -> ApiResult<Json<BatchReport>> {
    if body.ids.is_empty() {
        return Err(ServiceError::validation("at least one application id is required"));
    }
    let cancel = services.shutdown.child_token();
    let report = services
        .scoring
        .rescore_batch(&owner, &body.ids, &cancel)
        .await?;
    Ok(Json(report))
}

pub(crate) async fn upload_resume(
    State(services): State<AppServices>,
    Caller(owner): Caller,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Application>> {
    let file_name = headers
        .get(FILE_NAME_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ServiceError::validation("the x-file-name header is required"))?;
    let application =
        services
            .resumes
            .upload_resume(&owner, &ApplicationId(id), file_name, body.to_vec())?;
    Ok(Json(application))
}

pub(crate) async fn parse_resume(
    State(services): State<AppServices>,
    Caller(owner): Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<ParseOutcome>> {
    Ok(Json(
        services
            .resumes
            .parse_resume(&owner, &ApplicationId(id))
            .await?,
    ))
}

pub(crate) async fn send_emails(
    State(services): State<AppServices>,
    Caller(owner): Caller,
    Json(body): Json<SendBody>,
) -> ApiResult<Json<DeliveryReport>> {
    let report = services
        .sender
        .send_batch(&owner, &body.template, &body.recipients)
        .await?;
    Ok(Json(report))
}

pub(crate) async fn list_threads(
    State(services): State<AppServices>,
    Caller(owner): Caller,
) -> ApiResult<Json<Vec<EmailThread>>> {
    Ok(Json(services.threads.list_threads(&owner)?))
}

pub(crate) async fn start_thread(
    State(services): State<AppServices>,
    Caller(owner): Caller,
    Json(request): Json<NewThread>,
) -> Response {
    match services.threads.start_thread(&owner, request).await {
        Ok(started) => (StatusCode::CREATED, Json(started)).into_response(),
        Err(ThreadError::Incomplete { thread_id, reason }) => {
            let payload = json!({
                "error": format!("thread was created but its first message was not stored: {reason}"),
                "code": "THREAD_INCOMPLETE",
                "thread_id": thread_id,
            });
            (StatusCode::BAD_GATEWAY, Json(payload)).into_response()
        }
        Err(ThreadError::Service(err)) => err.into_response(),
    }
}

pub(crate) async fn thread_messages(
    State(services): State<AppServices>,
    Caller(owner): Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<EmailMessage>>> {
    Ok(Json(services.threads.messages(&owner, &ThreadId(id))?))
}

/// Inbound mail hook from the e-mail vendor.
pub(crate) async fn record_inbound(
    State(services): State<AppServices>,
    Path(id): Path<String>,
    Json(inbound): Json<InboundMessage>,
) -> ApiResult<(StatusCode, Json<EmailMessage>)> {
    let message = services.threads.record_inbound(&ThreadId(id), inbound)?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub(crate) async fn mark_thread_read(
    State(services): State<AppServices>,
    Caller(owner): Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<EmailThread>> {
    Ok(Json(services.threads.mark_read(&owner, &ThreadId(id))?))
}

pub(crate) async fn reconcile_threads(
    State(services): State<AppServices>,
    Caller(owner): Caller,
) -> ApiResult<Json<ReconcileReport>> {
    Ok(Json(services.threads.reconcile_unread_counts(&owner)?))
}

pub(crate) async fn get_preferences(
    State(services): State<AppServices>,
    Caller(owner): Caller,
) -> ApiResult<Json<Preferences>> {
    Ok(Json(services.preferences.get(&owner)?))
}

pub(crate) async fn update_preferences(
    State(services): State<AppServices>,
    Caller(owner): Caller,
    Json(update): Json<PreferencesUpdate>,
) -> ApiResult<Json<Preferences>> {
    Ok(Json(services.preferences.update(&owner, update)?))
}

pub(crate) async fn billing_webhook(
    State(services): State<AppServices>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    services.webhooks.verify(&body, signature)?;
    let payload: Value = serde_json::from_slice(&body)
        .map_err(|err| ServiceError::validation(format!("malformed webhook payload: {err}")))?;

    match apply_webhook(services.subscriptions.as_ref(), payload, Utc::now())? {
        WebhookOutcome::Applied(subscription) => {
            info!(owner = %subscription.owner, plan = ?subscription.plan, "subscription synced");
            Ok(Json(json!({
                "status": "applied",
                "subscription": subscription,
            })))
        }
        WebhookOutcome::Ignored { event_type } => Ok(Json(json!({
            "status": "ignored",
            "event_type": event_type,
        }))),
    }
}
