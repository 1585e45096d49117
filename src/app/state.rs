// ABOUTME: Application state and the App driver tying readiness, tabs and terminals together
// Async API calls run as spawned tasks whose completions are drained on each tick

use crate::api::{ApiError, LabApi};
use crate::app::events::{AppEvent, EventHandler};
use crate::app::notification::{Notification, NotificationType};
use crate::config::AppConfig;
use crate::models::{SessionInfo, SessionStatus, TabId, TabState, TerminalIdentity};
use crate::session::{ProvisionOutcome, ProvisionRequest, ReadinessGate, TerminalOrchestrator};
use crate::terminal::InteractiveTerminalComponent;
use crossterm::event::KeyEvent;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

const SHUTDOWN_RELEASE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug)]
pub struct AppState {
    pub gate: ReadinessGate,
    pub orchestrator: TerminalOrchestrator,
    pub notifications: Vec<Notification>,
    pub help_visible: bool,
    pub should_quit: bool,
    pub ui_needs_refresh: bool,
    notification_ttl: Duration,
}

impl AppState {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            gate: ReadinessGate::new(session_id),
            orchestrator: TerminalOrchestrator::new(),
            notifications: Vec::new(),
            help_visible: false,
            should_quit: false,
            ui_needs_refresh: true,
            notification_ttl: Duration::from_secs(5),
        }
    }

    pub fn with_notification_ttl(mut self, ttl: Duration) -> Self {
        self.notification_ttl = ttl;
        self
    }

    pub fn session_status(&self) -> SessionStatus {
        self.gate.status()
    }

    pub fn toggle_help(&mut self) {
        self.help_visible = !self.help_visible;
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn notify(&mut self, notification_type: NotificationType, message: impl Into<String>) {
        self.notifications
            .push(Notification::new(message, notification_type, self.notification_ttl));
        self.ui_needs_refresh = true;
    }

    /// Returns true if any toast was removed.
    pub fn expire_notifications(&mut self) -> bool {
        let before = self.notifications.len();
        self.notifications.retain(|n| !n.is_expired());
        before != self.notifications.len()
    }
}

/// Completions of background work, delivered to the UI loop in order.
#[derive(Debug)]
pub enum AppMessage {
    SessionChecked {
        generation: u64,
        result: Result<SessionInfo, ApiError>,
    },
    TerminalProvisioned {
        tab_id: TabId,
        result: Result<TerminalIdentity, ApiError>,
    },
    ConnectionChanged {
        tab_id: TabId,
        connected: bool,
    },
}

pub struct App {
    pub state: AppState,
    config: AppConfig,
    api_base: Url,
    api: Arc<dyn LabApi>,
    terminals: HashMap<TabId, InteractiveTerminalComponent>,
    provisioning: HashMap<TabId, JoinHandle<()>>,
    readiness_task: Option<JoinHandle<()>>,
    next_poll_at: Option<Instant>,
    was_ready: bool,
    messages_tx: mpsc::UnboundedSender<AppMessage>,
    messages_rx: mpsc::UnboundedReceiver<AppMessage>,
}

impl App {
    pub fn new(config: AppConfig, api: Arc<dyn LabApi>) -> anyhow::Result<Self> {
        let session_id = config.session()?.to_string();
        let api_base = config.api_base()?;
        let (messages_tx, messages_rx) = mpsc::unbounded_channel();

        info!("Starting labterm for session {} against {}", session_id, api_base);

        Ok(Self {
            state: AppState::new(session_id).with_notification_ttl(config.notification_ttl()),
            config,
            api_base,
            api,
            terminals: HashMap::new(),
            provisioning: HashMap::new(),
            readiness_task: None,
            next_poll_at: Some(Instant::now()),
            was_ready: false,
            messages_tx,
            messages_rx,
        })
    }

    pub fn needs_ui_refresh(&mut self) -> bool {
        std::mem::take(&mut self.state.ui_needs_refresh)
    }

    pub fn terminal(&self, tab_id: &TabId) -> Option<&InteractiveTerminalComponent> {
        self.terminals.get(tab_id)
    }

    /// The mounted terminal of the globally active tab.
    pub fn active_terminal_mut(&mut self) -> Option<&mut InteractiveTerminalComponent> {
        let tab_id = self.state.orchestrator.active_tab_id()?.clone();
        self.terminals.get_mut(&tab_id)
    }

    pub fn mounted_terminals(&self) -> usize {
        self.terminals.len()
    }

    pub fn pending_provisions(&self) -> usize {
        self.provisioning.len()
    }

    /// Advance background work; call on every loop iteration.
    pub fn tick(&mut self) {
        while let Ok(message) = self.messages_rx.try_recv() {
            self.handle_message(message);
        }

        self.poll_readiness();
        self.on_ready_transition();
        self.sync_terminals();

        let active = self.state.orchestrator.active_tab_id().cloned();
        for (tab_id, terminal) in &mut self.terminals {
            terminal.set_focused(Some(tab_id) == active.as_ref());
            if terminal.pump() {
                self.state.ui_needs_refresh = true;
            }
        }

        if self.state.expire_notifications() {
            self.state.ui_needs_refresh = true;
        }
    }

    fn handle_message(&mut self, message: AppMessage) {
        self.state.ui_needs_refresh = true;
        match message {
            AppMessage::SessionChecked { generation, result } => {
                self.readiness_task = None;
                let changed = self.state.gate.apply(generation, result);
                if self.state.gate.needs_poll() {
                    self.next_poll_at = Some(Instant::now() + self.config.poll_interval());
                }
                if changed && self.state.gate.is_failed() {
                    let message = self.state.gate.status().message;
                    self.state.notify(NotificationType::Error, message);
                }
            }
            AppMessage::TerminalProvisioned { tab_id, result } => {
                self.provisioning.remove(&tab_id);
                let result = result.map_err(|e| e.to_string());
                match self.state.orchestrator.complete_provisioning(&tab_id, result) {
                    ProvisionOutcome::Applied => {}
                    ProvisionOutcome::Failed(message) => {
                        self.state.notify(
                            NotificationType::Error,
                            format!("Failed to create terminal: {message}"),
                        );
                    }
                    ProvisionOutcome::Orphaned(identity) => self.release_identity(identity),
                    ProvisionOutcome::Ignored => {}
                }
            }
            AppMessage::ConnectionChanged { tab_id, connected } => {
                self.state.orchestrator.set_connected(&tab_id, connected);
            }
        }
    }

    fn poll_readiness(&mut self) {
        if !self.state.gate.needs_poll() || self.readiness_task.is_some() {
            return;
        }
        let due = self.next_poll_at.is_some_and(|at| Instant::now() >= at);
        if !due {
            return;
        }
        self.next_poll_at = None;

        let api = self.api.clone();
        let session_id = self.state.gate.session_id().to_string();
        let generation = self.state.gate.generation();
        let tx = self.messages_tx.clone();
        debug!("Polling session {} (generation {})", session_id, generation);

        self.readiness_task = Some(tokio::spawn(async move {
            let result = api.get_session(&session_id).await;
            if tx.send(AppMessage::SessionChecked { generation, result }).is_err() {
                debug!("App gone before session poll completed");
            }
        }));
    }

    /// Open the displayed target's first terminal once the session is usable.
    fn on_ready_transition(&mut self) {
        let ready = self.state.gate.is_ready();
        if ready && !self.was_ready {
            let status = self.state.session_status();
            let target = self.state.orchestrator.active_target();
            if let Some(request) = self.state.orchestrator.switch_target(target, &status) {
                self.spawn_provision(request);
            }
        }
        self.was_ready = ready;
    }

    /// Mount a terminal for every tab with an identity; unmount the rest.
    fn sync_terminals(&mut self) {
        let vanished: Vec<TabId> = self
            .terminals
            .keys()
            .filter(|id| self.state.orchestrator.tab(id).is_none())
            .cloned()
            .collect();
        for tab_id in vanished {
            debug!(tab = %tab_id, "Tab gone, dropping its terminal");
            self.terminals.remove(&tab_id);
        }

        if !self.state.gate.is_ready() {
            return;
        }

        let to_mount: Vec<(TabId, TerminalIdentity)> = self
            .state
            .orchestrator
            .all_tabs()
            .filter(|tab| !self.terminals.contains_key(&tab.id))
            .filter_map(|tab| tab.identity.clone().map(|identity| (tab.id.clone(), identity)))
            .collect();

        for (tab_id, identity) in to_mount {
            let tx = self.messages_tx.clone();
            let callback_tab = tab_id.clone();
            let callback = Box::new(move |connected| {
                if tx
                    .send(AppMessage::ConnectionChanged {
                        tab_id: callback_tab.clone(),
                        connected,
                    })
                    .is_err()
                {
                    debug!("App gone, dropping connection change");
                }
            });

            match InteractiveTerminalComponent::mount(
                tab_id.clone(),
                identity,
                &self.api_base,
                self.config.reconnect,
                callback,
            ) {
                Ok(terminal) => {
                    self.terminals.insert(tab_id, terminal);
                }
                Err(e) => {
                    error!(tab = %tab_id, "Cannot attach terminal: {}", e);
                    self.state
                        .notify(NotificationType::Error, format!("Cannot attach terminal: {e}"));
                    // Close the tab so the mount is not retried every tick
                    if let Ok(tab) = self.state.orchestrator.close_terminal(&tab_id) {
                        if let Some(identity) = tab.identity {
                            self.release_identity(identity);
                        }
                    }
                }
            }
        }
    }

    fn spawn_provision(&mut self, request: ProvisionRequest) {
        let api = self.api.clone();
        let session_id = self.state.gate.session_id().to_string();
        let tx = self.messages_tx.clone();
        let ProvisionRequest { tab_id, target } = request;
        info!(tab = %tab_id, "Requesting {} terminal", target);

        let task_tab = tab_id.clone();
        let handle = tokio::spawn(async move {
            let result = api.create_terminal(&session_id, target).await;
            if tx
                .send(AppMessage::TerminalProvisioned {
                    tab_id: task_tab,
                    result,
                })
                .is_err()
            {
                debug!("App gone before provisioning completed");
            }
        });
        self.provisioning.insert(tab_id, handle);
    }

    fn release_identity(&self, identity: TerminalIdentity) {
        let api = self.api.clone();
        info!(identity = %identity, "Releasing remote shell");
        tokio::spawn(async move {
            if let Err(e) = api.close_terminal(&identity).await {
                warn!(identity = %identity, "Failed to release terminal: {}", e);
            }
        });
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if let Some(event) = EventHandler::handle_key_event(key, &self.state) {
            self.handle_event(event);
            return;
        }
        if !EventHandler::forwards_to_terminal(&self.state) {
            return;
        }
        if let Some(terminal) = self.active_terminal_mut() {
            if terminal.handle_key(key) {
                self.state.ui_needs_refresh = true;
            }
        }
    }

    pub fn handle_event(&mut self, event: AppEvent) {
        debug!("Handling {:?}", event);
        self.state.ui_needs_refresh = true;
        let status = self.state.session_status();

        match event {
            AppEvent::Quit => self.state.quit(),
            AppEvent::ToggleHelp => self.state.toggle_help(),
            AppEvent::SwitchTarget(target) => {
                if let Some(request) = self.state.orchestrator.switch_target(target, &status) {
                    self.spawn_provision(request);
                }
            }
            AppEvent::AddTerminal => match self.state.orchestrator.add_terminal(&status) {
                Ok(request) => self.spawn_provision(request),
                Err(e) => self.state.notify(NotificationType::Warning, e.to_string()),
            },
            AppEvent::CloseTerminal => self.close_active_terminal(),
            AppEvent::NextTab => self.state.orchestrator.next_tab(),
            AppEvent::PreviousTab => self.state.orchestrator.previous_tab(),
            AppEvent::RetryOrReconnect => self.retry_or_reconnect(&status),
            AppEvent::ClearTerminal => {
                if let Some(terminal) = self.active_terminal_mut() {
                    terminal.clear();
                }
            }
        }
    }

    fn close_active_terminal(&mut self) {
        let Some(tab_id) = self.state.orchestrator.active_tab_id().cloned() else {
            return;
        };
        match self.state.orchestrator.close_terminal(&tab_id) {
            Ok(tab) => {
                // Dropping the component unmounts it
                self.terminals.remove(&tab_id);
                if let Some(identity) = tab.identity {
                    self.release_identity(identity);
                }
                self.state
                    .notify(NotificationType::Info, format!("Closed terminal {tab_id}"));
            }
            Err(e) => warn!("Close failed: {}", e),
        }
    }

    fn retry_or_reconnect(&mut self, status: &SessionStatus) {
        if self.state.gate.is_failed() {
            self.state.gate.restart();
            self.next_poll_at = Some(Instant::now());
            return;
        }

        let Some(tab) = self.state.orchestrator.active_tab() else {
            return;
        };
        let tab_id = tab.id.clone();
        match tab.state() {
            TabState::Failed => match self.state.orchestrator.retry_terminal(&tab_id, status) {
                Ok(request) => self.spawn_provision(request),
                Err(e) => self.state.notify(NotificationType::Warning, e.to_string()),
            },
            TabState::Ready => {
                if let Some(terminal) = self.terminals.get_mut(&tab_id) {
                    terminal.reconnect();
                }
            }
            TabState::Loading => {}
        }
    }

    /// Stop background work, unmount terminals and release remote shells.
    pub async fn shutdown(&mut self) {
        info!("Shutting down, releasing {} terminals", self.terminals.len());
        if let Some(task) = self.readiness_task.take() {
            task.abort();
        }
        for (_, task) in self.provisioning.drain() {
            task.abort();
        }
        self.terminals.clear();

        let identities: Vec<TerminalIdentity> = self
            .state
            .orchestrator
            .all_tabs()
            .filter_map(|tab| tab.identity.clone())
            .collect();
        let api = self.api.clone();
        let release = async move {
            for identity in &identities {
                if let Err(e) = api.close_terminal(identity).await {
                    warn!(identity = %identity, "Failed to release terminal: {}", e);
                }
            }
        };
        if tokio::time::timeout(SHUTDOWN_RELEASE_TIMEOUT, release).await.is_err() {
            warn!("Timed out releasing terminals on shutdown");
        }
    }
}
