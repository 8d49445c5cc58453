use chrono::{Duration, Utc};

use super::common::*;
use crate::email::{
    Direction, EmailLogRepository, EmailMessage, InboundMessage, MessageId, NewThread,
    SendOutcome, ThreadError, ThreadRepository,
};
use crate::error::{RepositoryError, ServiceError};
use crate::hiring::domain::OwnerId;

fn opening() -> NewThread {
    NewThread {
        to: "Grace@Example.com".to_string(),
        subject: "Next steps".to_string(),
        body: "Are you free on Thursday?".to_string(),
        application_id: None,
        job_id: None,
    }
}

fn reply(body: &str) -> InboundMessage {
    InboundMessage {
        from: "grace@example.com".to_string(),
        subject: "Re: Next steps".to_string(),
        body: body.to_string(),
        received_at: None,
    }
}

#[tokio::test]
async fn start_thread_delivers_and_stores_the_opening_message() {
    let ThreadHarness {
        service,
        store,
        transport,
        log,
    } = build_threads();

    let started = service
        .start_thread(&owner(), opening())
        .await
        .expect("thread starts");

    assert_eq!(started.thread.participants, vec!["grace@example.com".to_string()]);
    assert_eq!(started.thread.unread_count, 0);
    assert_eq!(started.message.direction, Direction::Outbound);
    assert_eq!(transport.sent().len(), 1);
    let messages = store.messages(&started.thread.id).expect("messages readable");
    assert_eq!(messages.len(), 1);

    let entries = log.entries_for(&owner()).expect("log readable");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].recipient, "grace@example.com");
    assert_eq!(entries[0].subject, "Next steps");
    assert_eq!(entries[0].content, "Are you free on Thursday?");
    assert_eq!(entries[0].template_id, None);
    assert!(entries[0].outcome.is_sent());
}

#[tokio::test]
async fn failed_delivery_leaves_an_empty_thread_and_reports_its_id() {
    let ThreadHarness {
        service,
        store,
        transport,
        log,
    } = build_threads();
    transport.fail_for("grace@example.com");

    let thread_id = match service.start_thread(&owner(), opening()).await {
        Err(ThreadError::Incomplete { thread_id, .. }) => thread_id,
        other => panic!("expected incomplete thread error, got {other:?}"),
    };

    let thread = store
        .fetch_thread(&thread_id)
        .expect("fetch succeeds")
        .expect("thread persisted");
    assert_eq!(thread.owner, owner());
    assert!(store.messages(&thread_id).expect("messages readable").is_empty());
    assert!(transport.sent().is_empty());

    let entries = log.entries_for(&owner()).expect("log readable");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].recipient, "grace@example.com");
    match &entries[0].outcome {
        SendOutcome::Failed { .. } => {}
        other => panic!("expected failed delivery in the log, got {other:?}"),
    }
}

#[tokio::test]
async fn inbound_messages_bump_unread_and_mark_read_clears_it() {
    let ThreadHarness { service, .. } = build_threads();
    let started = service
        .start_thread(&owner(), opening())
        .await
        .expect("thread starts");

    service
        .record_inbound(&started.thread.id, reply("Thursday works"))
        .expect("first reply stored");
    service
        .record_inbound(&started.thread.id, reply("Any time after 2pm"))
        .expect("second reply stored");

    let listed = service.list_threads(&owner()).expect("threads listed");
    assert_eq!(listed[0].unread_count, 2);

    let thread = service
        .mark_read(&owner(), &started.thread.id)
        .expect("marked read");
    assert_eq!(thread.unread_count, 0);
    let messages = service
        .messages(&owner(), &started.thread.id)
        .expect("messages listed");
    assert!(messages.iter().all(|message| !message.counts_as_unread()));
}

#[tokio::test]
async fn reconciliation_rederives_drifted_counters() {
    let ThreadHarness { service, store, .. } = build_threads();
    let drifted = service
        .start_thread(&owner(), opening())
        .await
        .expect("thread starts");
    let accurate = service
        .start_thread(
            &owner(),
            NewThread {
                to: "alan@example.com".to_string(),
                ..opening()
            },
        )
        .await
        .expect("thread starts");

    // Message written without the counter bump, as a direct table insert would.
    store
        .insert_message(EmailMessage {
            id: MessageId::generate(),
            thread_id: drifted.thread.id.clone(),
            direction: Direction::Inbound,
            is_read: false,
            from: "grace@example.com".to_string(),
            to: FROM.to_string(),
            subject: "Re: Next steps".to_string(),
            body: "Sent from my phone".to_string(),
            sent_at: Utc::now() + Duration::seconds(1),
        })
        .expect("raw insert");
    service
        .record_inbound(&accurate.thread.id, reply("Thanks"))
        .expect("reply stored");

    let report = service
        .reconcile_unread_counts(&owner())
        .expect("reconciliation runs");
    assert_eq!(report.threads_checked, 2);
    assert_eq!(report.threads_corrected, 1);

    for thread in service.list_threads(&owner()).expect("threads listed") {
        let unread = store
            .messages(&thread.id)
            .expect("messages readable")
            .iter()
            .filter(|message| message.counts_as_unread())
            .count() as u32;
        assert_eq!(thread.unread_count, unread);
    }

    let again = service
        .reconcile_unread_counts(&owner())
        .expect("second pass runs");
    assert_eq!(again.threads_corrected, 0);
}

#[tokio::test]
async fn other_owners_cannot_read_a_thread() {
    let ThreadHarness { service, .. } = build_threads();
    let started = service
        .start_thread(&owner(), opening())
        .await
        .expect("thread starts");

    match service.messages(&OwnerId("intruder".to_string()), &started.thread.id) {
        Err(ServiceError::Repository(RepositoryError::PermissionDenied)) => {}
        other => panic!("expected permission denied, got {other:?}"),
    }
}
