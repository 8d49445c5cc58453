use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::response::Response;
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};

use crate::billing::{
    InMemorySubscriptionRepository, PlanType, Subscription, SubscriptionRepository,
    SubscriptionStatus, WebhookVerifier, SIGNATURE_HEADER,
};
use crate::config::ScoringConfig;
use crate::email::{InMemoryEmailLog, InMemoryThreadStore, RecordingTransport};
use crate::functions::{
    CandidateScorer, ContentGenerator, ContentRequest, FunctionError, ResumeParseRequest,
    ResumeParser, ScoringRequest,
};
use crate::hiring::{InMemoryFileStore, InMemoryHiringStore, OwnerId};
use crate::preferences::InMemoryPreferenceStore;
use crate::router::{api_router, AppServices, Ports, ServiceSettings, OWNER_HEADER};

pub(super) const OWNER: &str = "owner-http";
pub(super) const OTHER_OWNER: &str = "owner-elsewhere";
pub(super) const WEBHOOK_SECRET: &str = "whsec_router_tests";

pub(super) struct FixedScorer;

#[async_trait]
impl CandidateScorer for FixedScorer {
    async fn analyze(&self, _request: &ScoringRequest) -> Result<Value, FunctionError> {
        Ok(json!({ "rating": 4.5, "summary": "Deep Rust experience" }))
    }
}

pub(super) struct FixedParser;

#[async_trait]
impl ResumeParser for FixedParser {
    async fn parse(&self, _request: &ResumeParseRequest) -> Result<Value, FunctionError> {
        Ok(json!({ "skills": ["Rust", "Postgres"] }))
    }
}

pub(super) struct FixedGenerator;

#[async_trait]
impl ContentGenerator for FixedGenerator {
    async fn generate(&self, _request: &ContentRequest) -> Result<Value, FunctionError> {
        Ok(json!({ "content": "We are hiring a Rust engineer." }))
    }
}

pub(super) struct TestApp {
    pub services: AppServices,
    pub transport: RecordingTransport,
    pub subscriptions: Arc<InMemorySubscriptionRepository>,
}

impl TestApp {
    pub(super) fn new() -> Self {
        let store = Arc::new(InMemoryHiringStore::new());
        let subscriptions = Arc::new(InMemorySubscriptionRepository::default());
        let transport = RecordingTransport::default();
        let ports = Ports {
            applications: store.clone(),
            jobs: store.clone(),
            stages: store,
            files: Arc::new(InMemoryFileStore::new()),
            subscriptions: subscriptions.clone(),
            email_log: Arc::new(InMemoryEmailLog::default()),
            threads: Arc::new(InMemoryThreadStore::default()),
            preferences: Arc::new(InMemoryPreferenceStore::new()),
            scorer: Arc::new(FixedScorer),
            parser: Arc::new(FixedParser),
            generator: Arc::new(FixedGenerator),
            transport: Arc::new(transport.clone()),
        };
        let settings = ServiceSettings {
            from_address: "talent@northwind.test".to_string(),
            scoring: ScoringConfig {
                batch_size: 2,
                batch_delay: Duration::ZERO,
                rating_scale: 5.0,
            },
            max_resume_bytes: 1024,
            webhook_secret: Some(WEBHOOK_SECRET.to_string()),
        };
        let services = AppServices::assemble(ports, settings).expect("services assemble");
        Self {
            services,
            transport,
            subscriptions,
        }
    }

    pub(super) fn subscribe(&self, owner: &str, plan: PlanType) {
        self.subscriptions
            .upsert(Subscription {
                owner: OwnerId(owner.to_string()),
                plan,
                status: SubscriptionStatus::Active,
                vendor_subscription_id: Some(format!("sub-{owner}")),
                current_period_end: None,
                updated_at: Utc::now(),
            })
            .expect("subscription stored");
    }

    pub(super) fn router(&self) -> Router {
        api_router(self.services.clone())
    }
}

pub(super) fn job_draft(title: &str, publish: bool) -> Value {
    json!({
        "title": title,
        "description": "Build and operate our hiring pipeline services in Rust.",
        "company_name": "Northwind",
        "employment_type": "full_time",
        "experience_level": "senior",
        "publish": publish,
    })
}

pub(super) fn submission(name: &str) -> Value {
    json!({
        "candidate": {
            "name": name,
            "email": format!("{}@example.com", name.to_ascii_lowercase()),
        },
        "answers": [
            { "question": "Why this role?", "answer": "I have shipped Rust services for years." }
        ],
    })
}

pub(super) fn json_request(method: Method, uri: &str, owner: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(owner) = owner {
        builder = builder.header(OWNER_HEADER, owner);
    }
    builder
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

pub(super) fn webhook_request(body: &Value, signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/billing/webhook")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(signature) = signature {
        builder = builder.header(SIGNATURE_HEADER, signature);
    }
    builder
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

pub(super) fn signed_webhook(body: &Value) -> Request<Body> {
    let raw = serde_json::to_vec(body).unwrap();
    let signature = WebhookVerifier::new(Some(WEBHOOK_SECRET.to_string()))
        .sign(&raw)
        .expect("secret configured");
    webhook_request(body, Some(&signature))
}

pub(super) fn get_request(uri: &str, owner: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(owner) = owner {
        builder = builder.header(OWNER_HEADER, owner);
    }
    builder.body(Body::empty()).unwrap()
}

pub(super) async fn read_body(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("body readable")
        .to_vec()
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = read_body(response).await;
    serde_json::from_slice(&bytes).expect("json body")
}
