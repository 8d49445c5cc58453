//! Subscription plans, usage ceilings and the payment webhook.

mod webhook;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RepositoryError, ServiceError};
use crate::hiring::domain::OwnerId;

pub use webhook::{apply_webhook, WebhookOutcome, WebhookVerifier, SIGNATURE_HEADER};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    Free,
    Starter,
    Professional,
    Enterprise,
}

impl PlanType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "free" => Some(PlanType::Free),
            "starter" | "basic" => Some(PlanType::Starter),
            "professional" | "pro" => Some(PlanType::Professional),
            "enterprise" | "business" => Some(PlanType::Enterprise),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
}

impl SubscriptionStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => Some(SubscriptionStatus::Active),
            "trialing" | "trial" => Some(SubscriptionStatus::Trialing),
            "past_due" => Some(SubscriptionStatus::PastDue),
            "canceled" | "cancelled" => Some(SubscriptionStatus::Canceled),
            _ => None,
        }
    }

    pub fn grants_access(self) -> bool {
        matches!(self, SubscriptionStatus::Active | SubscriptionStatus::Trialing)
    }
}

/// Usage ceilings and feature switches. `None` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanLimits {
    pub max_active_jobs: Option<u32>,
    pub max_applications_per_month: Option<u32>,
    pub ai_scoring: bool,
    pub resume_parsing: bool,
    pub bulk_email: bool,
}

impl PlanLimits {
    pub const fn for_plan(plan: PlanType) -> Self {
        match plan {
            PlanType::Free => PlanLimits {
                max_active_jobs: Some(1),
                max_applications_per_month: Some(25),
                ai_scoring: false,
                resume_parsing: false,
                bulk_email: false,
            },
            PlanType::Starter => PlanLimits {
                max_active_jobs: Some(3),
                max_applications_per_month: Some(200),
                ai_scoring: true,
                resume_parsing: true,
                bulk_email: false,
            },
            PlanType::Professional => PlanLimits {
                max_active_jobs: Some(15),
                max_applications_per_month: Some(1_000),
                ai_scoring: true,
                resume_parsing: true,
                bulk_email: true,
            },
            PlanType::Enterprise => PlanLimits {
                max_active_jobs: None,
                max_applications_per_month: None,
                ai_scoring: true,
                resume_parsing: true,
                bulk_email: true,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    AiScoring,
    ResumeParsing,
    BulkEmail,
}

impl Feature {
    pub const fn label(self) -> &'static str {
        match self {
            Feature::AiScoring => "AI candidate scoring",
            Feature::ResumeParsing => "resume parsing",
            Feature::BulkEmail => "bulk e-mail",
        }
    }

    fn enabled_in(self, limits: &PlanLimits) -> bool {
        match self {
            Feature::AiScoring => limits.ai_scoring,
            Feature::ResumeParsing => limits.resume_parsing,
            Feature::BulkEmail => limits.bulk_email,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub owner: OwnerId,
    pub plan: PlanType,
    pub status: SubscriptionStatus,
    pub vendor_subscription_id: Option<String>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Inactive subscriptions fall back to the free tier.
    pub fn limits(&self) -> PlanLimits {
        if self.status.grants_access() {
            PlanLimits::for_plan(self.plan)
        } else {
            PlanLimits::for_plan(PlanType::Free)
        }
    }
}

/// Storage abstraction for the `subscriptions` table, written only by the webhook.
pub trait SubscriptionRepository: Send + Sync {
    fn fetch(&self, owner: &OwnerId) -> Result<Option<Subscription>, RepositoryError>;
    fn upsert(&self, subscription: Subscription) -> Result<(), RepositoryError>;
}

#[derive(Default, Clone)]
pub struct InMemorySubscriptionRepository {
    rows: Arc<Mutex<HashMap<OwnerId, Subscription>>>,
}

impl SubscriptionRepository for InMemorySubscriptionRepository {
    fn fetch(&self, owner: &OwnerId) -> Result<Option<Subscription>, RepositoryError> {
        let guard = self
            .rows
            .lock()
            .map_err(|_| RepositoryError::Unavailable("subscriptions lock poisoned".to_string()))?;
        Ok(guard.get(owner).cloned())
    }

    fn upsert(&self, subscription: Subscription) -> Result<(), RepositoryError> {
        let mut guard = self
            .rows
            .lock()
            .map_err(|_| RepositoryError::Unavailable("subscriptions lock poisoned".to_string()))?;
        guard.insert(subscription.owner.clone(), subscription);
        Ok(())
    }
}

/// Read-only plan checks used by the hiring and e-mail services.
pub struct PlanGate {
    subscriptions: Arc<dyn SubscriptionRepository>,
}

impl PlanGate {
    pub fn new(subscriptions: Arc<dyn SubscriptionRepository>) -> Self {
        Self { subscriptions }
    }

    pub fn limits_for(&self, owner: &OwnerId) -> Result<PlanLimits, ServiceError> {
        let limits = self
            .subscriptions
            .fetch(owner)?
            .map(|subscription| subscription.limits())
            .unwrap_or_else(|| PlanLimits::for_plan(PlanType::Free));
        Ok(limits)
    }

    pub fn ensure_feature(&self, owner: &OwnerId, feature: Feature) -> Result<(), ServiceError> {
        let limits = self.limits_for(owner)?;
        if feature.enabled_in(&limits) {
            Ok(())
        } else {
            Err(ServiceError::PlanLimit(format!(
                "{} is not included in the current plan",
                feature.label()
            )))
        }
    }

    pub fn ensure_can_activate_job(
        &self,
        owner: &OwnerId,
        active_jobs: usize,
    ) -> Result<(), ServiceError> {
        let limits = self.limits_for(owner)?;
        match limits.max_active_jobs {
            Some(max) if active_jobs >= max as usize => Err(ServiceError::PlanLimit(format!(
                "plan allows {max} active job(s)"
            ))),
            _ => Ok(()),
        }
    }

    pub fn ensure_can_accept_application(
        &self,
        owner: &OwnerId,
        received_this_month: usize,
    ) -> Result<(), ServiceError> {
        let limits = self.limits_for(owner)?;
        match limits.max_applications_per_month {
            Some(max) if received_this_month >= max as usize => Err(ServiceError::PlanLimit(
                format!("plan allows {max} application(s) per month"),
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate_with(plan: PlanType, status: SubscriptionStatus) -> (PlanGate, OwnerId) {
        let owner = OwnerId("owner-1".to_string());
        let repository = Arc::new(InMemorySubscriptionRepository::default());
        repository
            .upsert(Subscription {
                owner: owner.clone(),
                plan,
                status,
                vendor_subscription_id: Some("sub_1".to_string()),
                current_period_end: None,
                updated_at: Utc::now(),
            })
            .expect("upsert succeeds");
        (PlanGate::new(repository), owner)
    }

    #[test]
    fn owners_without_subscription_get_free_limits() {
        let gate = PlanGate::new(Arc::new(InMemorySubscriptionRepository::default()));
        let owner = OwnerId("nobody".to_string());
        assert_eq!(
            gate.limits_for(&owner).expect("limits"),
            PlanLimits::for_plan(PlanType::Free)
        );
        assert!(matches!(
            gate.ensure_feature(&owner, Feature::AiScoring),
            Err(ServiceError::PlanLimit(_))
        ));
    }

    #[test]
    fn canceled_subscriptions_fall_back_to_free() {
        let (gate, owner) = gate_with(PlanType::Professional, SubscriptionStatus::Canceled);
        assert!(gate.ensure_can_activate_job(&owner, 1).is_err());
        assert!(gate.ensure_feature(&owner, Feature::BulkEmail).is_err());
    }

    #[test]
    fn job_and_application_ceilings_are_enforced() {
        let (gate, owner) = gate_with(PlanType::Starter, SubscriptionStatus::Active);
        assert!(gate.ensure_can_activate_job(&owner, 2).is_ok());
        assert!(gate.ensure_can_activate_job(&owner, 3).is_err());
        assert!(gate.ensure_can_accept_application(&owner, 199).is_ok());
        assert!(gate.ensure_can_accept_application(&owner, 200).is_err());
        assert!(gate.ensure_feature(&owner, Feature::ResumeParsing).is_ok());
    }

    #[test]
    fn enterprise_is_unlimited() {
        let (gate, owner) = gate_with(PlanType::Enterprise, SubscriptionStatus::Trialing);
        assert!(gate.ensure_can_activate_job(&owner, 10_000).is_ok());
        assert!(gate.ensure_can_accept_application(&owner, 1_000_000).is_ok());
    }
}
