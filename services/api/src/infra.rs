use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use hireloop::billing::InMemorySubscriptionRepository;
use hireloop::config::AppConfig;
use hireloop::email::{
    EmailTransport, HttpEmailTransport, InMemoryEmailLog, InMemoryThreadStore, RecordingTransport,
};
use hireloop::error::{AppError, ServiceError};
use hireloop::functions::{
    CandidateScorer, ContentGenerator, FunctionsClient, KeywordScorer, ResumeParser, Unconfigured,
};
use hireloop::hiring::{InMemoryFileStore, InMemoryHiringStore};
use hireloop::preferences::{FilePreferenceStore, InMemoryPreferenceStore, PreferenceStore};
use hireloop::router::{AppServices, Ports, ServiceSettings};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::warn;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Vendor adapters resolved from configuration, with local fallbacks.
pub(crate) struct Adapters {
    pub(crate) scorer: Arc<dyn CandidateScorer>,
    pub(crate) parser: Arc<dyn ResumeParser>,
    pub(crate) generator: Arc<dyn ContentGenerator>,
    pub(crate) transport: Arc<dyn EmailTransport>,
}

impl Adapters {
    pub(crate) fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let functions = FunctionsClient::from_config(&config.functions)
            .map_err(|err| ServiceError::external("AI functions", err))?;
        let (scorer, parser, generator) = match functions {
            Some(client) => {
                let client = Arc::new(client);
                let scorer: Arc<dyn CandidateScorer> = client.clone();
                let parser: Arc<dyn ResumeParser> = client.clone();
                let generator: Arc<dyn ContentGenerator> = client;
                (scorer, parser, generator)
            }
            None => {
                warn!("AI_FUNCTIONS_URL not set; using keyword scoring and disabling parsing");
                let scorer: Arc<dyn CandidateScorer> = Arc::new(KeywordScorer);
                let parser: Arc<dyn ResumeParser> = Arc::new(Unconfigured);
                let generator: Arc<dyn ContentGenerator> = Arc::new(Unconfigured);
                (scorer, parser, generator)
            }
        };

        let transport: Arc<dyn EmailTransport> = match HttpEmailTransport::from_config(&config.email)
        {
            Some(transport) => Arc::new(transport),
            None => {
                warn!("EMAIL_API_URL/EMAIL_API_KEY not set; e-mail is recorded in memory only");
                Arc::new(RecordingTransport::new())
            }
        };

        Ok(Self {
            scorer,
            parser,
            generator,
            transport,
        })
    }

    /// Keyword scoring and an in-memory mailbox; nothing leaves the process.
    pub(crate) fn offline(transport: RecordingTransport) -> Self {
        Self {
            scorer: Arc::new(KeywordScorer),
            parser: Arc::new(Unconfigured),
            generator: Arc::new(Unconfigured),
            transport: Arc::new(transport),
        }
    }
}

/// Wire the services over process-local stores.
pub(crate) fn in_memory_services(
    config: &AppConfig,
    adapters: Adapters,
) -> Result<(AppServices, Arc<InMemorySubscriptionRepository>), AppError> {
    let store = Arc::new(InMemoryHiringStore::new());
    let subscriptions = Arc::new(InMemorySubscriptionRepository::default());
    let preferences: Arc<dyn PreferenceStore> = match &config.preferences_path {
        Some(path) => Arc::new(FilePreferenceStore::new(path)),
        None => Arc::new(InMemoryPreferenceStore::new()),
    };

    let ports = Ports {
        applications: store.clone(),
        jobs: store.clone(),
        stages: store,
        files: Arc::new(InMemoryFileStore::new()),
        subscriptions: subscriptions.clone(),
        email_log: Arc::new(InMemoryEmailLog::new()),
        threads: Arc::new(InMemoryThreadStore::new()),
        preferences,
        scorer: adapters.scorer,
        parser: adapters.parser,
        generator: adapters.generator,
        transport: adapters.transport,
    };
    let services = AppServices::assemble(ports, ServiceSettings::from_config(config))
        .map_err(ServiceError::from)?;
    Ok((services, subscriptions))
}
