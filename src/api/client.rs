// ABOUTME: reqwest implementation of the lab API with request timeouts and transport-only retries

use super::{ApiError, LabApi};
use crate::models::{SessionInfo, Target, TerminalIdentity};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Clone)]
pub struct HttpLabApiConfig {
    pub base_url: Url,
    pub timeout: Duration,
    /// Extra attempts after a network error or timeout.
    pub retries: u32,
    /// Unit of the retry backoff, `unit * 2^(3 - retries_left)`.
    pub retry_unit: Duration,
}

impl HttpLabApiConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: Duration::from_secs(30),
            retries: 2,
            retry_unit: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateTerminalRequest {
    target: Target,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTerminalResponse {
    terminal_id: TerminalIdentity,
}

pub struct HttpLabApi {
    client: reqwest::Client,
    base: String,
    config: HttpLabApiConfig,
}

impl HttpLabApi {
    pub fn new(config: HttpLabApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let base = config.base_url.as_str().trim_end_matches('/').to_string();
        Ok(Self {
            client,
            base,
            config,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Option<Value>, ApiError> {
        let mut retries_left = self.config.retries;
        loop {
            match self.request_once(method.clone(), path, body).await {
                Err(e) if e.is_retryable() && retries_left > 0 => {
                    let delay = retry_delay(self.config.retry_unit, retries_left);
                    warn!(
                        "Retrying {} {} in {:?}, {} attempts left: {}",
                        method, path, delay, retries_left, e
                    );
                    tokio::time::sleep(delay).await;
                    retries_left -= 1;
                }
                result => return result,
            }
        }
    }

    async fn request_once(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Option<Value>, ApiError> {
        let url = self.endpoint(path);
        debug!("API request: {} {}", method, url);

        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| self.transport_error(&e))?;
        let status = response.status();
        debug!("API response: {} for {}", status, url);

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: error_message(status, &text),
            });
        }

        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let text = response.text().await.map_err(|e| self.transport_error(&e))?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    fn transport_error(&self, error: &reqwest::Error) -> ApiError {
        if error.is_timeout() {
            ApiError::Timeout(u64::try_from(self.config.timeout.as_millis()).unwrap_or(u64::MAX))
        } else if error.is_builder() {
            ApiError::Url(error.to_string())
        } else if error.is_decode() {
            ApiError::Decode(error.to_string())
        } else {
            ApiError::Network(error.to_string())
        }
    }
}

#[async_trait]
impl LabApi for HttpLabApi {
    async fn get_session(&self, session_id: &str) -> Result<SessionInfo, ApiError> {
        let body = self
            .request(Method::GET, &format!("/sessions/{session_id}"), None)
            .await?
            .ok_or_else(|| ApiError::Decode("empty session response".to_string()))?;
        serde_json::from_value(body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn create_terminal(
        &self,
        session_id: &str,
        target: Target,
    ) -> Result<TerminalIdentity, ApiError> {
        let payload = serde_json::to_value(CreateTerminalRequest { target })
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        let body = self
            .request(
                Method::POST,
                &format!("/sessions/{session_id}/terminals"),
                Some(&payload),
            )
            .await?
            .ok_or_else(|| ApiError::Decode("empty terminal response".to_string()))?;
        let created: CreateTerminalResponse =
            serde_json::from_value(body).map_err(|e| ApiError::Decode(e.to_string()))?;
        info!("Provisioned {} terminal {}", target, created.terminal_id);
        Ok(created.terminal_id)
    }

    async fn close_terminal(&self, identity: &TerminalIdentity) -> Result<(), ApiError> {
        self.request(Method::DELETE, &format!("/terminals/{identity}"), None)
            .await?;
        info!("Closed terminal {}", identity);
        Ok(())
    }
}

/// `unit * 2^(3 - retries_left)`
fn retry_delay(unit: Duration, retries_left: u32) -> Duration {
    unit.saturating_mul(2u32.saturating_pow(3u32.saturating_sub(retries_left)))
}

/// Prefer the body's `message` or `error` field, then the status reason.
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            ["message", "error"]
                .iter()
                .find_map(|key| value.get(key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_doubles() {
        let unit = Duration::from_millis(1000);
        assert_eq!(retry_delay(unit, 2), Duration::from_millis(2000));
        assert_eq!(retry_delay(unit, 1), Duration::from_millis(4000));
        assert_eq!(retry_delay(unit, 3), Duration::from_millis(1000));
        assert_eq!(retry_delay(unit, 10), Duration::from_millis(1000));
    }

    #[test]
    fn test_error_message_prefers_body_fields() {
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"message":"invalid target"}"#),
            "invalid target"
        );
        assert_eq!(
            error_message(StatusCode::CONFLICT, r#"{"error":"session not running"}"#),
            "session not running"
        );
        assert_eq!(
            error_message(StatusCode::SERVICE_UNAVAILABLE, "<html>busy</html>"),
            "Service Unavailable"
        );
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let api = HttpLabApi::new(HttpLabApiConfig::new(
            Url::parse("http://localhost:8080/api/v1/").unwrap(),
        ))
        .unwrap();
        assert_eq!(
            api.endpoint("/sessions/abc"),
            "http://localhost:8080/api/v1/sessions/abc"
        );
    }

    #[test]
    fn test_create_request_body_uses_target_slug() {
        let body = serde_json::to_value(CreateTerminalRequest {
            target: Target::WorkerNode,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({ "target": "worker-node" }));
    }

    #[test]
    fn test_create_response_reads_terminal_id() {
        let parsed: CreateTerminalResponse =
            serde_json::from_str(r#"{"terminalId":"term-7","target":"control-plane"}"#).unwrap();
        assert_eq!(parsed.terminal_id, TerminalIdentity::new("term-7"));
    }
}
