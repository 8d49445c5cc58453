use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use tracing::{info, warn};

use super::{PlanType, Subscription, SubscriptionRepository, SubscriptionStatus};
use crate::error::ServiceError;
use crate::hiring::domain::OwnerId;

/// Header carrying the hex HMAC-SHA256 of the raw request body, optionally prefixed `sha256=`.
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

type HmacSha256 = Hmac<Sha256>;

/// Checks billing vendor signatures against the shared webhook secret.
///
/// Without a configured secret every delivery is refused.
#[derive(Clone, Default)]
pub struct WebhookVerifier {
    secret: Option<String>,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("configured", &self.secret.is_some())
            .finish()
    }
}

impl WebhookVerifier {
    pub fn new(secret: Option<String>) -> Self {
        Self { secret }
    }

    pub fn sign(&self, body: &[u8]) -> Option<String> {
        let mut mac = self.mac()?;
        mac.update(body);
        Some(hex::encode(mac.finalize().into_bytes()))
    }

    pub fn verify(&self, body: &[u8], signature: Option<&str>) -> Result<(), ServiceError> {
        let Some(mut mac) = self.mac() else {
            warn!("billing webhook refused: no webhook secret configured");
            return Err(ServiceError::Unauthorized);
        };
        let Some(signature) = signature else {
            warn!("billing webhook refused: missing signature");
            return Err(ServiceError::Unauthorized);
        };
        let signature = signature.trim();
        let digest = hex::decode(signature.strip_prefix("sha256=").unwrap_or(signature))
            .map_err(|_| ServiceError::Unauthorized)?;
        mac.update(body);
        mac.verify_slice(&digest).map_err(|_| {
            warn!("billing webhook refused: signature mismatch");
            ServiceError::Unauthorized
        })
    }

    fn mac(&self) -> Option<HmacSha256> {
        let secret = self.secret.as_deref()?;
        HmacSha256::new_from_slice(secret.as_bytes()).ok()
    }
}

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    event_type: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct SubscriptionPayload {
    id: String,
    status: String,
    owner_id: String,
    plan: String,
    #[serde(default)]
    current_period_end: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct TransactionPayload {
    subscription_id: String,
    owner_id: String,
    plan: String,
    #[serde(default)]
    billing_period_end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    Applied(Subscription),
    Ignored { event_type: String },
}

/// Apply a billing vendor event.
///
/// Every handled event overwrites the full subscription row, so replays re-apply the same state.
pub fn apply_webhook(
    repository: &dyn SubscriptionRepository,
    payload: Value,
    now: DateTime<Utc>,
) -> Result<WebhookOutcome, ServiceError> {
    let envelope: WebhookEnvelope = serde_json::from_value(payload)
        .map_err(|err| ServiceError::validation(format!("malformed webhook payload: {err}")))?;

    let subscription = match envelope.event_type.as_str() {
        "subscription.created" | "subscription.updated" | "subscription.canceled" => {
            let data: SubscriptionPayload = decode(envelope.data)?;
            let status = if envelope.event_type == "subscription.canceled" {
                SubscriptionStatus::Canceled
            } else {
                SubscriptionStatus::parse(&data.status).ok_or_else(|| {
                    ServiceError::validation(format!("unknown subscription status '{}'", data.status))
                })?
            };
            Subscription {
                owner: OwnerId(data.owner_id),
                plan: parse_plan(&data.plan)?,
                status,
                vendor_subscription_id: Some(data.id),
                current_period_end: data.current_period_end,
                updated_at: now,
            }
        }
        "transaction.completed" => {
            let data: TransactionPayload = decode(envelope.data)?;
            Subscription {
                owner: OwnerId(data.owner_id),
                plan: parse_plan(&data.plan)?,
                status: SubscriptionStatus::Active,
                vendor_subscription_id: Some(data.subscription_id),
                current_period_end: data.billing_period_end,
                updated_at: now,
            }
        }
        other => {
            warn!(event_type = other, "ignoring unsupported billing event");
            return Ok(WebhookOutcome::Ignored {
                event_type: other.to_string(),
            });
        }
    };

    repository.upsert(subscription.clone())?;
    info!(
        event_type = %envelope.event_type,
        owner = %subscription.owner,
        plan = ?subscription.plan,
        status = ?subscription.status,
        "subscription updated from billing webhook"
    );
    Ok(WebhookOutcome::Applied(subscription))
}

fn decode<T: for<'de> Deserialize<'de>>(data: Value) -> Result<T, ServiceError> {
    serde_json::from_value(data)
        .map_err(|err| ServiceError::validation(format!("malformed webhook data: {err}")))
}

fn parse_plan(raw: &str) -> Result<PlanType, ServiceError> {
    PlanType::parse(raw).ok_or_else(|| ServiceError::validation(format!("unknown plan '{raw}'")))
}
