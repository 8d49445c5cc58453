use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::billing::{
    InMemorySubscriptionRepository, PlanGate, PlanType, Subscription, SubscriptionRepository,
    SubscriptionStatus,
};
use crate::config::ScoringConfig;
use crate::email::{EmailSender, InMemoryEmailLog, RecordingTransport};
use crate::error::RepositoryError;
use crate::functions::{
    CandidateScorer, ContentGenerator, ContentRequest, FunctionError, ResumeParseRequest,
    ResumeParser, ScoringRequest,
};
use crate::hiring::domain::{
    Application, ApplicationId, ApplicationStatus, CandidateIdentity, EmploymentType,
    ExperienceLevel, GeneratedContent, Job, JobId, JobLocation, JobStatus, OwnerId, PipelineStage,
    ScreeningAnswer,
};
use crate::hiring::repository::{ApplicationPatch, ApplicationRepository, JobRepository};
use crate::hiring::{
    DashboardService, InMemoryFileStore, InMemoryHiringStore, IntakeService, JobService,
    PipelineService, ResumeService, ScoringService,
};

pub(super) const FROM: &str = "talent@northwind.test";

pub(super) fn owner() -> OwnerId {
    OwnerId("owner-1".to_string())
}

pub(super) fn other_owner() -> OwnerId {
    OwnerId("owner-2".to_string())
}

pub(super) fn job_for(owner: &OwnerId, title: &str, description: &str, status: JobStatus) -> Job {
    let now = Utc::now();
    Job {
        id: JobId::generate(),
        owner: owner.clone(),
        title: title.to_string(),
        description: description.to_string(),
        company_name: Some("Northwind".to_string()),
        employment_type: EmploymentType::FullTime,
        experience_level: ExperienceLevel::Mid,
        location: JobLocation {
            city: Some("Lisbon".to_string()),
            country: Some("PT".to_string()),
            remote: true,
        },
        compensation: None,
        status,
        generated: GeneratedContent::default(),
        view_count: 0,
        created_at: now,
        updated_at: now,
    }
}

pub(super) fn application_for(job: &Job, name: &str, answer: &str) -> Application {
    let now = Utc::now();
    Application {
        id: ApplicationId::generate(),
        job_id: job.id.clone(),
        owner: job.owner.clone(),
        candidate: CandidateIdentity {
            name: name.to_string(),
            email: format!("{}@example.com", name.to_ascii_lowercase()),
            phone: None,
            links: Vec::new(),
        },
        answers: vec![ScreeningAnswer {
            question: "Why this role?".to_string(),
            answer: answer.to_string(),
        }],
        resume: None,
        parsed_resume: None,
        ai_rating: None,
        ai_summary: None,
        manual_rating: None,
        status: ApplicationStatus::Pending,
        pipeline_stage: PipelineStage::applied(),
        rejection_reason: None,
        created_at: now,
        updated_at: now,
    }
}

pub(super) fn with_status(
    mut application: Application,
    status: ApplicationStatus,
    created_at: DateTime<Utc>,
) -> Application {
    application.status = status;
    if status == ApplicationStatus::Rejected {
        application.pipeline_stage = PipelineStage::rejected();
        application.rejection_reason = Some("Not a fit".to_string());
    }
    application.created_at = created_at;
    application
}

pub(super) fn with_rating(mut application: Application, rating: f32) -> Application {
    application.ai_rating = Some(rating);
    application.ai_summary = Some(format!("rated {rating}"));
    application
}

pub(super) fn subscription_gate(
    owner: &OwnerId,
    plan: PlanType,
) -> (Arc<PlanGate>, Arc<InMemorySubscriptionRepository>) {
    let subscriptions = Arc::new(InMemorySubscriptionRepository::default());
    subscriptions
        .upsert(Subscription {
            owner: owner.clone(),
            plan,
            status: SubscriptionStatus::Active,
            vendor_subscription_id: Some("sub_test".to_string()),
            current_period_end: None,
            updated_at: Utc::now(),
        })
        .expect("subscription stored");
    (Arc::new(PlanGate::new(subscriptions.clone())), subscriptions)
}

/// Shared in-memory wiring for service tests.
pub(super) struct Fixture {
    pub(super) store: Arc<InMemoryHiringStore>,
    pub(super) files: Arc<InMemoryFileStore>,
    pub(super) transport: Arc<RecordingTransport>,
    pub(super) log: Arc<InMemoryEmailLog>,
    pub(super) plans: Arc<PlanGate>,
}

impl Fixture {
    pub(super) fn new(plan: PlanType) -> Self {
        let (plans, _) = subscription_gate(&owner(), plan);
        Self {
            store: Arc::new(InMemoryHiringStore::new()),
            files: Arc::new(InMemoryFileStore::new()),
            transport: Arc::new(RecordingTransport::new()),
            log: Arc::new(InMemoryEmailLog::new()),
            plans,
        }
    }

    pub(super) fn seed_job(&self, title: &str, description: &str) -> Job {
        let job = job_for(&owner(), title, description, JobStatus::Active);
        JobRepository::insert(self.store.as_ref(), job).expect("job stored")
    }

    pub(super) fn seed_application(&self, application: Application) -> Application {
        ApplicationRepository::insert(self.store.as_ref(), application).expect("application stored")
    }

    pub(super) fn fetch(&self, id: &ApplicationId) -> Application {
        ApplicationRepository::fetch(self.store.as_ref(), id)
            .expect("fetch succeeds")
            .expect("application present")
    }

    pub(super) fn sender(&self) -> Arc<EmailSender> {
        Arc::new(EmailSender::new(
            self.transport.clone(),
            self.log.clone(),
            self.plans.clone(),
            FROM,
        ))
    }

    pub(super) fn pipeline(&self) -> PipelineService {
        self.pipeline_over(self.store.clone())
    }

    pub(super) fn pipeline_over(&self, applications: Arc<dyn ApplicationRepository>) -> PipelineService {
        PipelineService::new(
            applications,
            self.store.clone(),
            self.store.clone(),
            self.sender(),
        )
    }

    pub(super) fn scoring(&self, scorer: Arc<dyn CandidateScorer>) -> ScoringService {
        self.scoring_with(
            scorer,
            ScoringConfig {
                batch_delay: Duration::ZERO,
                ..ScoringConfig::default()
            },
        )
    }

    pub(super) fn scoring_with(
        &self,
        scorer: Arc<dyn CandidateScorer>,
        config: ScoringConfig,
    ) -> ScoringService {
        ScoringService::new(
            self.store.clone(),
            self.store.clone(),
            scorer,
            self.plans.clone(),
            config,
        )
    }

    pub(super) fn resume(&self, parser: Arc<dyn ResumeParser>, max_bytes: usize) -> ResumeService {
        ResumeService::new(
            self.store.clone(),
            self.files.clone(),
            parser,
            self.plans.clone(),
            max_bytes,
        )
    }

    pub(super) fn dashboard(&self) -> DashboardService {
        DashboardService::new(self.store.clone(), self.store.clone())
    }

    pub(super) fn intake(&self) -> IntakeService {
        IntakeService::new(self.store.clone(), self.store.clone(), self.plans.clone())
    }

    pub(super) fn jobs(&self, generator: Arc<dyn ContentGenerator>) -> JobService {
        JobService::new(self.store.clone(), self.plans.clone(), generator)
    }
}

/// Scorer answering by the candidate's first answer; unknown answers get a transport error.
#[derive(Default)]
pub(super) struct ScriptedScorer {
    responses: HashMap<String, Value>,
    calls: AtomicUsize,
}

impl ScriptedScorer {
    pub(super) fn respond(mut self, answer: &str, response: Value) -> Self {
        self.responses.insert(answer.to_string(), response);
        self
    }

    pub(super) fn rating(self, answer: &str, rating: f32, summary: &str) -> Self {
        self.respond(answer, json!({ "rating": rating, "summary": summary }))
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CandidateScorer for ScriptedScorer {
    async fn analyze(&self, request: &ScoringRequest) -> Result<Value, FunctionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = request
            .answers
            .first()
            .map(|answer| answer.answer.as_str())
            .unwrap_or_default();
        self.responses
            .get(answer)
            .cloned()
            .ok_or_else(|| FunctionError::Status {
                status: 503,
                message: "model overloaded".to_string(),
            })
    }
}

/// Scorer that yields once per call, tracks how many calls overlap and can cancel a batch
/// token on its first call.
#[derive(Default)]
pub(super) struct PacedScorer {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    cancel_on_first_call: Option<CancellationToken>,
}

impl PacedScorer {
    pub(super) fn cancelling(token: CancellationToken) -> Self {
        Self {
            cancel_on_first_call: Some(token),
            ..Self::default()
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(super) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CandidateScorer for PacedScorer {
    async fn analyze(&self, _request: &ScoringRequest) -> Result<Value, FunctionError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            if let Some(token) = &self.cancel_on_first_call {
                token.cancel();
            }
        }
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(json!({ "rating": 3.5, "summary": "Steady" }))
    }
}

/// Parser returning a fixed payload, or a vendor error when none is set.
pub(super) struct StaticParser {
    response: Option<Value>,
    pub(super) requests: Mutex<Vec<ResumeParseRequest>>,
}

impl StaticParser {
    pub(super) fn returning(response: Value) -> Self {
        Self {
            response: Some(response),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn failing() -> Self {
        Self {
            response: None,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ResumeParser for StaticParser {
    async fn parse(&self, request: &ResumeParseRequest) -> Result<Value, FunctionError> {
        self.requests
            .lock()
            .expect("parser mutex poisoned")
            .push(request.clone());
        self.response
            .clone()
            .ok_or_else(|| FunctionError::Vendor("unsupported document".to_string()))
    }
}

pub(super) struct StaticGenerator {
    response: Option<Value>,
}

impl StaticGenerator {
    pub(super) fn returning(response: Value) -> Self {
        Self {
            response: Some(response),
        }
    }

    pub(super) fn failing() -> Self {
        Self { response: None }
    }
}

#[async_trait]
impl ContentGenerator for StaticGenerator {
    async fn generate(&self, _request: &ContentRequest) -> Result<Value, FunctionError> {
        self.response.clone().ok_or(FunctionError::NotConfigured)
    }
}

/// Application store whose single-row updates always fail.
pub(super) struct PatchFailingRepository {
    pub(super) inner: Arc<InMemoryHiringStore>,
}

impl ApplicationRepository for PatchFailingRepository {
    fn insert(&self, application: Application) -> Result<Application, RepositoryError> {
        ApplicationRepository::insert(self.inner.as_ref(), application)
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError> {
        ApplicationRepository::fetch(self.inner.as_ref(), id)
    }

    fn patch(
        &self,
        _id: &ApplicationId,
        _patch: ApplicationPatch,
        _at: DateTime<Utc>,
    ) -> Result<Application, RepositoryError> {
        Err(RepositoryError::Unavailable("connection reset".to_string()))
    }

    fn update_stage_many(
        &self,
        ids: &[ApplicationId],
        stage: &PipelineStage,
        at: DateTime<Utc>,
    ) -> Result<Vec<Application>, RepositoryError> {
        self.inner.update_stage_many(ids, stage, at)
    }

    fn list_for_job(&self, job_id: &JobId) -> Result<Vec<Application>, RepositoryError> {
        self.inner.list_for_job(job_id)
    }

    fn list_for_owner(&self, owner: &OwnerId) -> Result<Vec<Application>, RepositoryError> {
        ApplicationRepository::list_for_owner(self.inner.as_ref(), owner)
    }
}
