use crate::infra::{in_memory_services, Adapters};
use chrono::Utc;
use clap::Args;
use hireloop::billing::{apply_webhook, WebhookOutcome};
use hireloop::config::AppConfig;
use hireloop::email::RecordingTransport;
use hireloop::error::AppError;
use hireloop::hiring::{
    top_candidates, ApplicationSubmission, CandidateIdentity, DashboardScope, EmploymentType,
    ExperienceLevel, ItemOutcome, JobDraft, JobLocation, NotificationOutcome, OwnerId,
    ScreeningAnswer,
};
use serde_json::json;
use std::time::Duration;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Company name used in the posting and candidate e-mails
    #[arg(long, default_value = "Northwind")]
    pub(crate) company: String,
    /// Rejection reason applied to the lowest rated candidate
    #[arg(long, default_value = "Skills Mismatch")]
    pub(crate) reason: String,
}

const DEMO_OWNER: &str = "demo-owner";

const CANDIDATES: &[(&str, &str)] = &[
    (
        "Ada",
        "I design Rust services on Postgres and run them on Kubernetes with tracing dashboards.",
    ),
    (
        "Grace",
        "Built Postgres backed billing services and mentored engineers on observability.",
    ),
    ("Linus", "Mostly frontend work in React with some Node scripting."),
    ("Margaret", "Led incident response and capacity planning for distributed services."),
];

/// Walk one posting through intake, scoring, rejection and the dashboard, offline.
pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    config.scoring.batch_delay = Duration::ZERO;
    config.preferences_path = None;

    let transport = RecordingTransport::new();
    let (services, subscriptions) =
        in_memory_services(&config, Adapters::offline(transport.clone()))?;
    let owner = OwnerId(DEMO_OWNER.to_string());

    println!("Hiring pipeline demo");
    let upgrade = json!({
        "event_type": "subscription.created",
        "data": {
            "id": "sub_demo",
            "status": "active",
            "owner_id": DEMO_OWNER,
            "plan": "professional",
        },
    });
    if let WebhookOutcome::Applied(subscription) =
        apply_webhook(subscriptions.as_ref(), upgrade, Utc::now())?
    {
        println!("- Plan: {:?} ({:?})", subscription.plan, subscription.status);
    }

    let job = services.jobs.create(
        &owner,
        JobDraft {
            title: "Senior Backend Engineer".to_string(),
            description: "Design Rust services on Postgres, operate them on Kubernetes and own \
                          observability with tracing dashboards."
                .to_string(),
            company_name: Some(args.company.clone()),
            employment_type: EmploymentType::FullTime,
            experience_level: ExperienceLevel::Senior,
            location: JobLocation {
                city: None,
                country: None,
                remote: true,
            },
            compensation: None,
            publish: true,
        },
    )?;
    println!("- Posted '{}' ({}) as {}", job.title, job.id, job.status.label());

    let mut ids = Vec::new();
    for (name, answer) in CANDIDATES {
        let application = services.intake.submit(
            &job.id,
            ApplicationSubmission {
                candidate: CandidateIdentity {
                    name: name.to_string(),
                    email: format!("{}@example.com", name.to_ascii_lowercase()),
                    phone: None,
                    links: Vec::new(),
                },
                answers: vec![ScreeningAnswer {
                    question: "Tell us about relevant experience".to_string(),
                    answer: answer.to_string(),
                }],
            },
        )?;
        ids.push(application.id);
    }
    println!("- Received {} applications", ids.len());

    let report = services
        .scoring
        .rescore_batch(&owner, &ids, &services.shutdown.child_token())
        .await?;
    println!(
        "\nBatch scoring: {} processed | {} successful | {} failed",
        report.processed, report.successful, report.failed
    );
    for item in &report.items {
        match &item.outcome {
            ItemOutcome::Scored { rating } => println!("  - {} rated {rating:.1}", item.application_id),
            other => println!("  - {} {other:?}", item.application_id),
        }
    }

    let applications = services.intake.list_for_job(&owner, &job.id)?;
    println!("\nTop candidates:");
    for application in top_candidates(&applications) {
        println!(
            "  - {} ({:.1})",
            application.candidate.name,
            application.ai_rating.unwrap_or_default()
        );
    }

    let lowest = applications
        .iter()
        .filter(|application| application.ai_rating.is_some())
        .min_by(|left, right| {
            left.ai_rating
                .unwrap_or_default()
                .total_cmp(&right.ai_rating.unwrap_or_default())
        });
    if let Some(lowest) = lowest {
        let rejection = services
            .pipeline
            .reject(&owner, &lowest.id, &args.reason)
            .await?;
        let notification = match &rejection.notification {
            NotificationOutcome::Sent { provider_id } => format!("sent ({provider_id})"),
            NotificationOutcome::Failed { error } => format!("failed: {error}"),
            NotificationOutcome::Skipped { reason } => format!("skipped: {reason}"),
        };
        println!(
            "\nRejected {} for '{}' | e-mail {notification} | state {}",
            lowest.candidate.name,
            args.reason,
            if rejection.application().is_some() { "applied" } else { "failed" }
        );
    }

    let stats = services
        .dashboard
        .stats(&owner, DashboardScope::Job(job.id.clone()), Utc::now())?;
    println!(
        "\nDashboard: {} total | {} pending | {} rejected | {} rated (avg {:.2}) | {} this week",
        stats.total, stats.pending, stats.rejected, stats.rated, stats.average_rating, stats.this_week
    );
    for (stage, count) in &stats.stage_counts {
        println!("  - {stage}: {count}");
    }

    let sent = transport.sent();
    println!("\nOutbound e-mail ({}):", sent.len());
    for email in sent {
        println!("  - to {} | {}", email.to, email.subject);
    }

    Ok(())
}
