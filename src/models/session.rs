// ABOUTME: Session data model mirroring the lab session resource and the derived readiness status

use serde::{Deserialize, Serialize};

/// Externally reported session state meaning the lab environment is usable.
pub const SESSION_RUNNING: &str = "running";
/// Externally reported session state meaning provisioning gave up.
pub const SESSION_FAILED: &str = "failed";

/// The subset of the session resource the terminal area cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
}

impl SessionInfo {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            status_message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.status_message = Some(message.into());
        self
    }

    pub fn is_running(&self) -> bool {
        self.status == SESSION_RUNNING
    }

    pub fn is_failed(&self) -> bool {
        self.status == SESSION_FAILED
    }
}

/// Page-scoped view of whether terminals may be created.
///
/// `is_ready` only ever becomes true for a `running` session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub is_ready: bool,
    pub is_loading: bool,
    pub message: String,
    pub error: Option<String>,
}

impl SessionStatus {
    pub fn checking(message: impl Into<String>) -> Self {
        Self {
            is_ready: false,
            is_loading: true,
            message: message.into(),
            error: None,
        }
    }

    pub fn ready() -> Self {
        Self {
            is_ready: true,
            is_loading: false,
            message: "Session is ready".to_string(),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            is_ready: false,
            is_loading: false,
            message: message.into(),
            error: Some(error.into()),
        }
    }

    pub fn indicator(&self) -> &'static str {
        if self.is_ready {
            "●"
        } else if self.is_loading {
            "◌"
        } else {
            "✗"
        }
    }
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self::checking("Checking session status...")
    }
}
