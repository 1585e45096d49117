// ABOUTME: Tab/target orchestrator owning the ordered terminal tabs of each target
// Gates creation on session readiness and hands provisioning requests back to the caller

use crate::models::{SessionStatus, Tab, TabId, TabState, Target, TerminalIdentity};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    #[error("Session is not ready: {0}")]
    SessionNotReady(String),

    #[error("No terminal tab {0}")]
    UnknownTab(TabId),

    #[error("Terminal tab {0} has not failed")]
    NotRetryable(TabId),
}

/// A provisioning call the caller must issue for a loading tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionRequest {
    pub tab_id: TabId,
    pub target: Target,
}

/// What happened when a provisioning call completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// The tab now carries its identity.
    Applied,
    /// The tab recorded this error.
    Failed(String),
    /// The tab is gone; the caller must release this identity.
    Orphaned(TerminalIdentity),
    /// Nothing to do.
    Ignored,
}

#[derive(Debug, Default)]
struct TargetTabs {
    tabs: Vec<Tab>,
    active: Option<TabId>,
    /// Last sequence number handed out; never decreases.
    sequence: u32,
}

impl TargetTabs {
    fn position(&self, tab_id: &TabId) -> Option<usize> {
        self.tabs.iter().position(|tab| &tab.id == tab_id)
    }
}

/// Single writer of every target's tab sequence.
#[derive(Debug)]
pub struct TerminalOrchestrator {
    targets: HashMap<Target, TargetTabs>,
    active_target: Target,
}

impl Default for TerminalOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalOrchestrator {
    pub fn new() -> Self {
        let targets = Target::ALL
            .into_iter()
            .map(|target| (target, TargetTabs::default()))
            .collect();
        Self {
            targets,
            active_target: Target::ControlPlane,
        }
    }

    pub fn active_target(&self) -> Target {
        self.active_target
    }

    /// Tabs of `target` in tab bar order.
    pub fn tabs(&self, target: Target) -> &[Tab] {
        self.targets
            .get(&target)
            .map_or(&[][..], |entry| entry.tabs.as_slice())
    }

    pub fn all_tabs(&self) -> impl Iterator<Item = &Tab> {
        Target::ALL
            .into_iter()
            .flat_map(move |target| self.tabs(target).iter())
    }

    pub fn tab(&self, tab_id: &TabId) -> Option<&Tab> {
        self.all_tabs().find(|tab| &tab.id == tab_id)
    }

    /// The active tab of `target`.
    pub fn target_active(&self, target: Target) -> Option<&TabId> {
        self.targets.get(&target).and_then(|entry| entry.active.as_ref())
    }

    /// The globally active tab, i.e. the active tab of the displayed target.
    pub fn active_tab_id(&self) -> Option<&TabId> {
        self.target_active(self.active_target)
    }

    pub fn active_tab(&self) -> Option<&Tab> {
        self.active_tab_id().and_then(|id| self.tab(id))
    }

    pub fn is_target_connected(&self, target: Target) -> bool {
        self.tabs(target).iter().any(|tab| tab.connected)
    }

    fn entry(&mut self, target: Target) -> &mut TargetTabs {
        self.targets.entry(target).or_default()
    }

    fn locate(&self, tab_id: &TabId) -> Option<(Target, usize)> {
        Target::ALL.into_iter().find_map(|target| {
            self.targets
                .get(&target)
                .and_then(|entry| entry.position(tab_id))
                .map(|index| (target, index))
        })
    }

    fn tab_mut(&mut self, tab_id: &TabId) -> Option<&mut Tab> {
        let (target, index) = self.locate(tab_id)?;
        self.targets
            .get_mut(&target)
            .and_then(|entry| entry.tabs.get_mut(index))
    }

    /// Append a loading tab for `target` and make it the globally active tab.
    pub fn create_terminal(
        &mut self,
        target: Target,
        status: &SessionStatus,
    ) -> Result<ProvisionRequest, OrchestratorError> {
        if !status.is_ready {
            warn!("Rejecting {} terminal, session not ready: {}", target, status.message);
            return Err(OrchestratorError::SessionNotReady(status.message.clone()));
        }

        let entry = self.entry(target);
        entry.sequence += 1;
        let tab_id = TabId::new(target, entry.sequence);
        entry.tabs.push(Tab::loading(tab_id.clone(), target));
        entry.active = Some(tab_id.clone());
        self.active_target = target;

        info!(tab = %tab_id, "Creating {} terminal", target);
        Ok(ProvisionRequest { tab_id, target })
    }

    /// Display `target`. Its first tab becomes active, or a terminal is
    /// created when it has none and the session is ready.
    pub fn switch_target(&mut self, target: Target, status: &SessionStatus) -> Option<ProvisionRequest> {
        debug!("Switching to target {}", target);
        self.active_target = target;

        let entry = self.entry(target);
        if let Some(first) = entry.tabs.first() {
            entry.active = Some(first.id.clone());
            return None;
        }
        if status.is_ready {
            self.create_terminal(target, status).ok()
        } else {
            None
        }
    }

    /// Activate a tab within its own target, leaving the displayed target as is.
    pub fn switch_tab(&mut self, tab_id: &TabId) -> Result<(), OrchestratorError> {
        let (target, _) = self
            .locate(tab_id)
            .ok_or_else(|| OrchestratorError::UnknownTab(tab_id.clone()))?;
        self.entry(target).active = Some(tab_id.clone());
        Ok(())
    }

    /// Another terminal for the displayed target.
    pub fn add_terminal(&mut self, status: &SessionStatus) -> Result<ProvisionRequest, OrchestratorError> {
        self.create_terminal(self.active_target, status)
    }

    /// Remove a tab, returning it so the caller can release its identity.
    pub fn close_terminal(&mut self, tab_id: &TabId) -> Result<Tab, OrchestratorError> {
        let (target, index) = self
            .locate(tab_id)
            .ok_or_else(|| OrchestratorError::UnknownTab(tab_id.clone()))?;

        let entry = self.entry(target);
        let tab = entry.tabs.remove(index);
        if entry.active.as_ref() == Some(tab_id) {
            let neighbour = index.min(entry.tabs.len().saturating_sub(1));
            entry.active = entry.tabs.get(neighbour).map(|next| next.id.clone());
        }

        info!(tab = %tab_id, "Closed terminal tab");
        Ok(tab)
    }

    /// Put a failed tab back into loading under the same id.
    pub fn retry_terminal(
        &mut self,
        tab_id: &TabId,
        status: &SessionStatus,
    ) -> Result<ProvisionRequest, OrchestratorError> {
        if !status.is_ready {
            return Err(OrchestratorError::SessionNotReady(status.message.clone()));
        }
        let tab = self
            .tab_mut(tab_id)
            .ok_or_else(|| OrchestratorError::UnknownTab(tab_id.clone()))?;
        if tab.state() != TabState::Failed {
            return Err(OrchestratorError::NotRetryable(tab_id.clone()));
        }

        tab.is_loading = true;
        tab.error = None;
        let target = tab.target;
        self.active_target = target;
        self.entry(target).active = Some(tab_id.clone());

        info!(tab = %tab_id, "Retrying {} terminal", target);
        Ok(ProvisionRequest {
            tab_id: tab_id.clone(),
            target,
        })
    }

    /// Record the result of a provisioning call.
    pub fn complete_provisioning(
        &mut self,
        tab_id: &TabId,
        result: Result<TerminalIdentity, String>,
    ) -> ProvisionOutcome {
        let Some(tab) = self.tab_mut(tab_id) else {
            return match result {
                Ok(identity) => {
                    warn!(tab = %tab_id, identity = %identity, "Provisioned terminal for a closed tab");
                    ProvisionOutcome::Orphaned(identity)
                }
                Err(_) => ProvisionOutcome::Ignored,
            };
        };

        if tab.identity.is_some() || !tab.is_loading {
            return match result {
                Ok(identity) => ProvisionOutcome::Orphaned(identity),
                Err(_) => ProvisionOutcome::Ignored,
            };
        }

        tab.is_loading = false;
        match result {
            Ok(identity) => {
                info!(tab = %tab_id, identity = %identity, "Terminal provisioned");
                tab.identity = Some(identity);
                tab.error = None;
                ProvisionOutcome::Applied
            }
            Err(message) => {
                warn!(tab = %tab_id, "Terminal provisioning failed: {}", message);
                tab.error = Some(message.clone());
                ProvisionOutcome::Failed(message)
            }
        }
    }

    /// Returns true if the flag changed.
    pub fn set_connected(&mut self, tab_id: &TabId, connected: bool) -> bool {
        match self.tab_mut(tab_id) {
            Some(tab) if tab.connected != connected => {
                tab.connected = connected;
                true
            }
            _ => false,
        }
    }

    pub fn next_tab(&mut self) {
        self.cycle_tab(true);
    }

    pub fn previous_tab(&mut self) {
        self.cycle_tab(false);
    }

    fn cycle_tab(&mut self, forward: bool) {
        let entry = self.entry(self.active_target);
        let len = entry.tabs.len();
        if len == 0 {
            return;
        }
        let current = entry
            .active
            .as_ref()
            .and_then(|id| entry.position(id));
        let next = match current {
            Some(i) if forward => (i + 1) % len,
            Some(i) => (i + len - 1) % len,
            None => 0,
        };
        entry.active = Some(entry.tabs[next].id.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ready() -> SessionStatus {
        SessionStatus::ready()
    }

    fn ids(orchestrator: &TerminalOrchestrator, target: Target) -> Vec<String> {
        orchestrator
            .tabs(target)
            .iter()
            .map(|tab| tab.id.to_string())
            .collect()
    }

    #[test]
    fn test_create_rejected_while_not_ready() {
        let mut orchestrator = TerminalOrchestrator::new();
        let status = SessionStatus::checking("Session status: provisioning");
        let result = orchestrator.create_terminal(Target::ControlPlane, &status);
        assert_eq!(
            result,
            Err(OrchestratorError::SessionNotReady(
                "Session status: provisioning".to_string()
            ))
        );
        assert!(orchestrator.tabs(Target::ControlPlane).is_empty());
    }

    #[test]
    fn test_create_appends_loading_tab_and_activates_it() {
        let mut orchestrator = TerminalOrchestrator::new();
        let request = orchestrator.create_terminal(Target::WorkerNode, &ready()).unwrap();

        assert_eq!(request.tab_id.as_str(), "wk-1");
        assert_eq!(request.target, Target::WorkerNode);
        assert_eq!(orchestrator.active_target(), Target::WorkerNode);
        assert_eq!(orchestrator.active_tab_id(), Some(&request.tab_id));
        assert_eq!(orchestrator.active_tab().unwrap().state(), TabState::Loading);
    }

    #[test]
    fn test_close_inactive_tab_keeps_active() {
        let mut orchestrator = TerminalOrchestrator::new();
        let first = orchestrator.create_terminal(Target::ControlPlane, &ready()).unwrap();
        let second = orchestrator.create_terminal(Target::ControlPlane, &ready()).unwrap();
        assert_eq!(orchestrator.active_tab_id(), Some(&second.tab_id));

        orchestrator.close_terminal(&first.tab_id).unwrap();

        assert_eq!(orchestrator.active_tab_id().map(TabId::as_str), Some("cp-2"));
        assert_eq!(ids(&orchestrator, Target::ControlPlane), vec!["cp-2"]);
    }

    #[test]
    fn test_close_active_tab_moves_to_same_index() {
        let mut orchestrator = TerminalOrchestrator::new();
        for _ in 0..3 {
            orchestrator.create_terminal(Target::ControlPlane, &ready()).unwrap();
        }
        orchestrator.switch_tab(&TabId::from("cp-2")).unwrap();

        orchestrator.close_terminal(&TabId::from("cp-2")).unwrap();
        assert_eq!(orchestrator.active_tab_id().map(TabId::as_str), Some("cp-3"));

        // Closing the last tab in the sequence clamps to the new last one
        orchestrator.close_terminal(&TabId::from("cp-3")).unwrap();
        assert_eq!(orchestrator.active_tab_id().map(TabId::as_str), Some("cp-1"));
    }

    #[test]
    fn test_close_only_tab_leaves_none_active() {
        let mut orchestrator = TerminalOrchestrator::new();
        let request = orchestrator.create_terminal(Target::ControlPlane, &ready()).unwrap();
        let closed = orchestrator.close_terminal(&request.tab_id).unwrap();
        assert_eq!(closed.id, request.tab_id);
        assert_eq!(orchestrator.active_tab_id(), None);
        assert_eq!(orchestrator.target_active(Target::ControlPlane), None);
    }

    #[test]
    fn test_ids_never_reused_after_close() {
        let mut orchestrator = TerminalOrchestrator::new();
        let first = orchestrator.create_terminal(Target::ControlPlane, &ready()).unwrap();
        orchestrator.close_terminal(&first.tab_id).unwrap();
        let second = orchestrator.create_terminal(Target::ControlPlane, &ready()).unwrap();
        assert_eq!(second.tab_id.as_str(), "cp-2");

        // Sequences are per target
        let worker = orchestrator.create_terminal(Target::WorkerNode, &ready()).unwrap();
        assert_eq!(worker.tab_id.as_str(), "wk-1");
    }

    #[test]
    fn test_switch_target_activates_first_tab() {
        let mut orchestrator = TerminalOrchestrator::new();
        orchestrator.create_terminal(Target::ControlPlane, &ready()).unwrap();
        orchestrator.create_terminal(Target::ControlPlane, &ready()).unwrap();
        orchestrator.create_terminal(Target::WorkerNode, &ready()).unwrap();

        let request = orchestrator.switch_target(Target::ControlPlane, &ready());
        assert_eq!(request, None);
        assert_eq!(orchestrator.active_target(), Target::ControlPlane);
        assert_eq!(orchestrator.active_tab_id().map(TabId::as_str), Some("cp-1"));
    }

    #[test]
    fn test_switch_target_creates_when_empty_and_ready() {
        let mut orchestrator = TerminalOrchestrator::new();
        let request = orchestrator.switch_target(Target::WorkerNode, &ready()).unwrap();
        assert_eq!(request.tab_id.as_str(), "wk-1");

        let not_ready = SessionStatus::default();
        let mut idle = TerminalOrchestrator::new();
        assert_eq!(idle.switch_target(Target::WorkerNode, &not_ready), None);
        assert_eq!(idle.active_target(), Target::WorkerNode);
        assert!(idle.tabs(Target::WorkerNode).is_empty());
    }

    #[test]
    fn test_switch_tab_does_not_change_target() {
        let mut orchestrator = TerminalOrchestrator::new();
        let cp = orchestrator.create_terminal(Target::ControlPlane, &ready()).unwrap();
        orchestrator.create_terminal(Target::WorkerNode, &ready()).unwrap();
        orchestrator.create_terminal(Target::ControlPlane, &ready()).unwrap();

        orchestrator.switch_tab(&cp.tab_id).unwrap();
        assert_eq!(orchestrator.active_target(), Target::ControlPlane);
        assert_eq!(orchestrator.active_tab_id(), Some(&cp.tab_id));
        assert_eq!(
            orchestrator.switch_tab(&TabId::from("cp-99")),
            Err(OrchestratorError::UnknownTab(TabId::from("cp-99")))
        );
    }

    #[test]
    fn test_add_terminal_uses_active_target_and_keeps_others() {
        let mut orchestrator = TerminalOrchestrator::new();
        orchestrator.switch_target(Target::WorkerNode, &ready());
        orchestrator.add_terminal(&ready()).unwrap();
        assert_eq!(ids(&orchestrator, Target::WorkerNode), vec!["wk-1", "wk-2"]);
    }

    #[test]
    fn test_provisioning_success_and_failure() {
        let mut orchestrator = TerminalOrchestrator::new();
        let ok = orchestrator.create_terminal(Target::ControlPlane, &ready()).unwrap();
        let bad = orchestrator.create_terminal(Target::ControlPlane, &ready()).unwrap();

        assert_eq!(
            orchestrator.complete_provisioning(&ok.tab_id, Ok(TerminalIdentity::new("term-1"))),
            ProvisionOutcome::Applied
        );
        assert_eq!(
            orchestrator.complete_provisioning(&bad.tab_id, Err("quota exceeded".into())),
            ProvisionOutcome::Failed("quota exceeded".to_string())
        );

        let ok_tab = orchestrator.tab(&ok.tab_id).unwrap();
        assert_eq!(ok_tab.state(), TabState::Ready);
        assert_eq!(ok_tab.identity, Some(TerminalIdentity::new("term-1")));

        let bad_tab = orchestrator.tab(&bad.tab_id).unwrap();
        assert_eq!(bad_tab.state(), TabState::Failed);
        assert_eq!(bad_tab.error.as_deref(), Some("quota exceeded"));
        assert_eq!(bad_tab.identity, None);
    }

    #[test]
    fn test_identity_is_never_replaced() {
        let mut orchestrator = TerminalOrchestrator::new();
        let request = orchestrator.create_terminal(Target::ControlPlane, &ready()).unwrap();
        orchestrator.complete_provisioning(&request.tab_id, Ok(TerminalIdentity::new("a")));

        let second = orchestrator.complete_provisioning(&request.tab_id, Ok(TerminalIdentity::new("b")));
        assert_eq!(second, ProvisionOutcome::Orphaned(TerminalIdentity::new("b")));
        assert_eq!(
            orchestrator.tab(&request.tab_id).unwrap().identity,
            Some(TerminalIdentity::new("a"))
        );
    }

    #[test]
    fn test_completion_for_closed_tab_is_orphaned() {
        let mut orchestrator = TerminalOrchestrator::new();
        let request = orchestrator.create_terminal(Target::ControlPlane, &ready()).unwrap();
        orchestrator.close_terminal(&request.tab_id).unwrap();

        assert_eq!(
            orchestrator.complete_provisioning(&request.tab_id, Ok(TerminalIdentity::new("late"))),
            ProvisionOutcome::Orphaned(TerminalIdentity::new("late"))
        );
        assert_eq!(
            orchestrator.complete_provisioning(&request.tab_id, Err("late failure".into())),
            ProvisionOutcome::Ignored
        );
        assert!(orchestrator.tabs(Target::ControlPlane).is_empty());
    }

    #[test]
    fn test_retry_mutates_failed_tab_in_place() {
        let mut orchestrator = TerminalOrchestrator::new();
        let request = orchestrator.create_terminal(Target::WorkerNode, &ready()).unwrap();
        orchestrator.complete_provisioning(&request.tab_id, Err("timeout".into()));

        let retry = orchestrator.retry_terminal(&request.tab_id, &ready()).unwrap();
        assert_eq!(retry.tab_id, request.tab_id);
        let tab = orchestrator.tab(&request.tab_id).unwrap();
        assert_eq!(tab.state(), TabState::Loading);
        assert_eq!(tab.error, None);
        assert_eq!(ids(&orchestrator, Target::WorkerNode), vec!["wk-1"]);
    }

    #[test]
    fn test_retry_rejects_non_failed_tabs() {
        let mut orchestrator = TerminalOrchestrator::new();
        let request = orchestrator.create_terminal(Target::ControlPlane, &ready()).unwrap();
        assert_eq!(
            orchestrator.retry_terminal(&request.tab_id, &ready()),
            Err(OrchestratorError::NotRetryable(request.tab_id.clone()))
        );
        orchestrator.complete_provisioning(&request.tab_id, Err("x".into()));
        assert!(matches!(
            orchestrator.retry_terminal(&request.tab_id, &SessionStatus::default()),
            Err(OrchestratorError::SessionNotReady(_))
        ));
    }

    #[test]
    fn test_tab_cycling_wraps() {
        let mut orchestrator = TerminalOrchestrator::new();
        for _ in 0..3 {
            orchestrator.create_terminal(Target::ControlPlane, &ready()).unwrap();
        }
        orchestrator.next_tab();
        assert_eq!(orchestrator.active_tab_id().map(TabId::as_str), Some("cp-1"));
        orchestrator.previous_tab();
        assert_eq!(orchestrator.active_tab_id().map(TabId::as_str), Some("cp-3"));
    }

    #[test]
    fn test_connected_flag_feeds_target_indicator() {
        let mut orchestrator = TerminalOrchestrator::new();
        let request = orchestrator.create_terminal(Target::ControlPlane, &ready()).unwrap();
        assert!(orchestrator.set_connected(&request.tab_id, true));
        assert!(!orchestrator.set_connected(&request.tab_id, true));
        assert!(orchestrator.is_target_connected(Target::ControlPlane));
        assert!(!orchestrator.is_target_connected(Target::WorkerNode));
    }
}
