// ABOUTME: Session-level coordination for lab terminals
// Readiness gating of the backing lab session and orchestration of terminal tabs per target

pub mod orchestrator;
pub mod readiness;

pub use orchestrator::{OrchestratorError, ProvisionOutcome, ProvisionRequest, TerminalOrchestrator};
pub use readiness::{Readiness, ReadinessGate};
