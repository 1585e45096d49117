// ABOUTME: Lab API boundary used by the readiness gate and terminal provisioning
// Defines the LabApi trait and its error type; the HTTP client lives in client.rs

pub mod client;

use crate::models::{SessionInfo, Target, TerminalIdentity};
use async_trait::async_trait;
use thiserror::Error;

pub use client::{HttpLabApi, HttpLabApiConfig};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API request failed ({status}): {message}")]
    Status { status: u16, message: String },

    #[error("Unexpected response body: {0}")]
    Decode(String),

    #[error("Invalid request URL: {0}")]
    Url(String),
}

impl ApiError {
    /// Only transport failures are retried, never HTTP status errors.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Network(_))
    }
}

/// Session and terminal endpoints of the lab backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LabApi: Send + Sync {
    /// `GET /sessions/{id}`
    async fn get_session(&self, session_id: &str) -> Result<SessionInfo, ApiError>;

    /// `POST /sessions/{id}/terminals`
    async fn create_terminal(
        &self,
        session_id: &str,
        target: Target,
    ) -> Result<TerminalIdentity, ApiError>;

    /// `DELETE /terminals/{id}`, tearing down the remote shell.
    async fn close_terminal(&self, identity: &TerminalIdentity) -> Result<(), ApiError>;
}
