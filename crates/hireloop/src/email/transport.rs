use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::EmailConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub provider_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("e-mail vendor rejected the message ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("e-mail transport unavailable: {0}")]
    Unavailable(String),
}

/// Outbound hook to the transactional e-mail vendor. One call per recipient.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<DeliveryReceipt, TransportError>;
}

#[derive(Debug, Deserialize)]
struct VendorResponse {
    id: String,
}

/// Client for a Resend-style `POST {api_url}/emails` endpoint.
#[derive(Clone)]
pub struct HttpEmailTransport {
    client: Client,
    api_url: String,
    api_key: String,
}

impl HttpEmailTransport {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>, client: Client) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn from_config(config: &EmailConfig) -> Option<Self> {
        match (&config.api_url, &config.api_key) {
            (Some(url), Some(key)) => Some(Self::new(url.clone(), key.clone(), Client::new())),
            _ => None,
        }
    }
}

#[async_trait]
impl EmailTransport for HttpEmailTransport {
    async fn send(&self, email: &OutboundEmail) -> Result<DeliveryReceipt, TransportError> {
        let response = self
            .client
            .post(format!("{}/emails", self.api_url))
            .bearer_auth(&self.api_key)
            .json(email)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), to = %email.to, "e-mail vendor rejected message");
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: VendorResponse = response.json().await?;
        Ok(DeliveryReceipt {
            provider_id: body.id,
        })
    }
}
