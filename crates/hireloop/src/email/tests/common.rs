use std::sync::Arc;

use chrono::Utc;

use crate::billing::{
    InMemorySubscriptionRepository, PlanGate, PlanType, Subscription, SubscriptionRepository,
    SubscriptionStatus,
};
use crate::email::{
    EmailSender, InMemoryEmailLog, InMemoryThreadStore, Recipient, RecordingTransport,
    TemplateValues, ThreadService,
};
use crate::hiring::domain::{ApplicationId, OwnerId};

pub(super) const FROM: &str = "hiring@hireloop.test";

pub(super) fn owner() -> OwnerId {
    OwnerId("owner-mail".to_string())
}

pub(super) fn plans(plan: PlanType) -> Arc<PlanGate> {
    let subscriptions = Arc::new(InMemorySubscriptionRepository::default());
    subscriptions
        .upsert(Subscription {
            owner: owner(),
            plan,
            status: SubscriptionStatus::Active,
            vendor_subscription_id: Some("sub_mail".to_string()),
            current_period_end: None,
            updated_at: Utc::now(),
        })
        .expect("subscription stored");
    Arc::new(PlanGate::new(subscriptions))
}

pub(super) fn recipient(name: &str, email: &str) -> Recipient {
    Recipient {
        values: TemplateValues {
            name: name.to_string(),
            email: email.to_string(),
            position: "Data Engineer".to_string(),
            company: "Northwind".to_string(),
        },
        application_id: Some(ApplicationId(format!("app-{}", name.to_ascii_lowercase()))),
    }
}

pub(super) fn build_sender(
    plan: PlanType,
) -> (EmailSender, Arc<RecordingTransport>, Arc<InMemoryEmailLog>) {
    let transport = Arc::new(RecordingTransport::new());
    let log = Arc::new(InMemoryEmailLog::new());
    let sender = EmailSender::new(transport.clone(), log.clone(), plans(plan), FROM);
    (sender, transport, log)
}

pub(super) struct ThreadHarness {
    pub(super) service: ThreadService,
    pub(super) store: Arc<InMemoryThreadStore>,
    pub(super) transport: Arc<RecordingTransport>,
    pub(super) log: Arc<InMemoryEmailLog>,
}

pub(super) fn build_threads() -> ThreadHarness {
    let store = Arc::new(InMemoryThreadStore::new());
    let (sender, transport, log) = build_sender(PlanType::Free);
    ThreadHarness {
        service: ThreadService::new(store.clone(), Arc::new(sender)),
        store,
        transport,
        log,
    }
}
