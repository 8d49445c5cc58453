use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{
    CandidateScorer, ContentGenerator, ContentRequest, FunctionError, ResumeParseRequest,
    ResumeParser, ScoringRequest,
};
use crate::config::FunctionsConfig;

/// HTTP client for the hosted functions endpoint (`{base_url}/functions/v1/{name}`).
///
/// No retries: a failed call is reported to the caller, which decides whether to re-invoke.
#[derive(Clone)]
pub struct FunctionsClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl FunctionsClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, client: Client) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Build a client from configuration; `None` when no endpoint is configured.
    pub fn from_config(config: &FunctionsConfig) -> Result<Option<Self>, FunctionError> {
        let Some(base_url) = config.base_url.as_deref() else {
            return Ok(None);
        };
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Some(Self::new(base_url, config.api_key.clone(), client)))
    }

    pub fn endpoint(&self, function: &str) -> String {
        format!("{}/functions/v1/{}", self.base_url, function)
    }

    pub async fn invoke<T: Serialize + ?Sized>(
        &self,
        function: &str,
        payload: &T,
    ) -> Result<Value, FunctionError> {
        let mut request = self.client.post(self.endpoint(function)).json(payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = vendor_error(&body).unwrap_or(body);
            warn!(function, status = status.as_u16(), %message, "function call failed");
            return Err(FunctionError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let value: Value = serde_json::from_str(&body)?;
        if let Some(message) = vendor_error_value(&value) {
            warn!(function, %message, "function returned an error object");
            return Err(FunctionError::Vendor(message));
        }

        debug!(function, "function call succeeded");
        Ok(value)
    }
}

fn vendor_error(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| vendor_error_value(&value))
}

/// Functions report failures as `{"error": "..."}` or `{"error": {"message": "..."}}`.
fn vendor_error_value(value: &Value) -> Option<String> {
    match value.get("error")? {
        Value::Null => None,
        Value::String(message) => Some(message.clone()),
        Value::Object(fields) => fields
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| Some(Value::Object(fields.clone()).to_string())),
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl CandidateScorer for FunctionsClient {
    async fn analyze(&self, request: &ScoringRequest) -> Result<Value, FunctionError> {
        self.invoke("analyze-application", request).await
    }
}

#[async_trait]
impl ResumeParser for FunctionsClient {
    async fn parse(&self, request: &ResumeParseRequest) -> Result<Value, FunctionError> {
        self.invoke("parse-resume", request).await
    }
}

#[async_trait]
impl ContentGenerator for FunctionsClient {
    async fn generate(&self, request: &ContentRequest) -> Result<Value, FunctionError> {
        self.invoke(request.kind.function_name(), request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn endpoint_joins_base_url_without_double_slashes() {
        let client = FunctionsClient::new("https://fn.example.com/", None, Client::new());
        assert_eq!(
            client.endpoint("parse-resume"),
            "https://fn.example.com/functions/v1/parse-resume"
        );
    }

    #[test]
    fn from_config_is_none_without_base_url() {
        let config = FunctionsConfig {
            base_url: None,
            api_key: None,
            timeout: Duration::from_secs(5),
        };
        assert!(FunctionsClient::from_config(&config)
            .expect("builds")
            .is_none());
    }

    #[test]
    fn vendor_errors_are_extracted_from_either_shape() {
        assert_eq!(
            vendor_error_value(&json!({ "error": "quota exceeded" })).as_deref(),
            Some("quota exceeded")
        );
        assert_eq!(
            vendor_error_value(&json!({ "error": { "message": "bad input" } })).as_deref(),
            Some("bad input")
        );
        assert_eq!(vendor_error_value(&json!({ "error": null })), None);
        assert_eq!(vendor_error_value(&json!({ "rating": 4 })), None);
    }
}
