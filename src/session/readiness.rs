// ABOUTME: Session readiness gate deciding when the lab environment may accept terminals
// Moves from checking to ready or failed based on polled session status, discarding stale polls

use crate::api::ApiError;
use crate::models::{SessionInfo, SessionStatus};
use tracing::{debug, info, warn};

pub const CHECKING_MESSAGE: &str = "Checking session status...";
pub const FETCH_FAILED_MESSAGE: &str = "Unable to check session status";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Checking { message: String },
    Ready,
    Failed { message: String, error: String },
}

impl Readiness {
    fn initial() -> Self {
        Self::Checking {
            message: CHECKING_MESSAGE.to_string(),
        }
    }
}

/// Interpret one poll result.
pub fn interpret(result: Result<SessionInfo, ApiError>) -> Readiness {
    match result {
        Ok(info) if info.is_running() => Readiness::Ready,
        Ok(info) if info.is_failed() => {
            let detail = info.status_message.filter(|m| !m.is_empty());
            Readiness::Failed {
                message: format!(
                    "Session failed: {}",
                    detail.as_deref().unwrap_or("Unknown error")
                ),
                error: detail.unwrap_or_else(|| "Session failed".to_string()),
            }
        }
        Ok(info) => Readiness::Checking {
            message: format!("Session status: {}", info.status),
        },
        Err(e) => Readiness::Failed {
            message: FETCH_FAILED_MESSAGE.to_string(),
            error: e.to_string(),
        },
    }
}

/// Tracks readiness for one session id at a time.
///
/// Every (re)start bumps a generation; poll results tagged with an older
/// generation are ignored. Once ready the gate stays ready for that session.
#[derive(Debug)]
pub struct ReadinessGate {
    session_id: String,
    state: Readiness,
    generation: u64,
}

impl ReadinessGate {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            state: Readiness::initial(),
            generation: 0,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> &Readiness {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, Readiness::Ready)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, Readiness::Failed { .. })
    }

    /// Whether another poll should be issued.
    pub fn needs_poll(&self) -> bool {
        matches!(self.state, Readiness::Checking { .. })
    }

    /// Point the gate at `session_id`, restarting if it changed.
    pub fn watch_session(&mut self, session_id: impl Into<String>) -> u64 {
        let session_id = session_id.into();
        if session_id == self.session_id {
            return self.generation;
        }
        info!("Readiness gate now watching session {}", session_id);
        self.session_id = session_id;
        self.reset()
    }

    /// Page-level retry after a failure. A ready gate is left alone.
    pub fn restart(&mut self) -> u64 {
        if self.is_ready() {
            return self.generation;
        }
        info!("Restarting readiness check for session {}", self.session_id);
        self.reset()
    }

    fn reset(&mut self) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.state = Readiness::initial();
        self.generation
    }

    /// Apply a poll result. Returns true if the state changed.
    pub fn apply(&mut self, generation: u64, result: Result<SessionInfo, ApiError>) -> bool {
        if generation != self.generation {
            debug!(
                "Discarding stale session poll (generation {} != {})",
                generation, self.generation
            );
            return false;
        }
        if !self.needs_poll() {
            return false;
        }

        let next = interpret(result);
        if next == self.state {
            return false;
        }
        match &next {
            Readiness::Ready => info!("Session {} is ready", self.session_id),
            Readiness::Failed { message, error } => {
                warn!("Session {} not usable: {} ({})", self.session_id, message, error);
            }
            Readiness::Checking { message } => debug!("Session {}: {}", self.session_id, message),
        }
        self.state = next;
        true
    }

    pub fn status(&self) -> SessionStatus {
        match &self.state {
            Readiness::Checking { message } => SessionStatus::checking(message.clone()),
            Readiness::Ready => SessionStatus::ready(),
            Readiness::Failed { message, error } => SessionStatus::failed(message.clone(), error.clone()),
        }
    }
}
