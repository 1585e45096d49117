// ABOUTME: Connection lifecycle state machine for one terminal stream
// Named transport events go in, effects for the async driver come out; no I/O happens here

use crate::terminal::backoff::{ReconnectConfig, ReconnectPolicy};
use crate::terminal::protocol::ConnectionState;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const CONNECTING_BANNER: &str = "Connecting to terminal...";
pub const CONNECTED_BANNER: &str = "Connected to terminal!";
pub const RECONNECTING_BANNER: &str = "Connection closed. Attempting to reconnect...";
pub const ERROR_BANNER: &str = "Connection error. Will attempt to reconnect...";
pub const CLOSED_BANNER: &str = "Session closed by the remote shell.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Explicit connect, either the initial one or a manual reconnect.
    ConnectRequested,
    /// The transport handshake completed.
    Opened,
    /// The transport went away. Handshake failures arrive here too.
    Closed { intentional: bool },
    /// Transport-level error; a `Closed` event follows.
    TransportError(String),
    ReconnectTimerFired,
    Disposed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEffect {
    /// Drop the current transport without treating it as a close.
    DetachTransport,
    OpenTransport,
    ClearSurface,
    WriteLine(&'static str),
    SendInitialResize,
    ScheduleReconnect(Duration),
    CancelReconnect,
    CloseTransport,
}

/// State of a single connection manager.
#[derive(Debug)]
pub struct ConnectionMachine {
    state: ConnectionState,
    policy: ReconnectPolicy,
    reconnect_pending: bool,
    mounted: bool,
}

impl ConnectionMachine {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            policy: ReconnectPolicy::new(config),
            reconnect_pending: false,
            mounted: true,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn attempt(&self) -> u32 {
        self.policy.attempt()
    }

    pub fn has_pending_reconnect(&self) -> bool {
        self.reconnect_pending
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    pub fn handle(&mut self, event: ConnectionEvent) -> Vec<ConnectionEffect> {
        debug!(?event, state = ?self.state, "Connection event");
        match event {
            ConnectionEvent::ConnectRequested => self.connect(),
            ConnectionEvent::Opened => self.on_open(),
            ConnectionEvent::Closed { intentional } => self.on_close(intentional),
            ConnectionEvent::TransportError(error) => {
                warn!("Terminal transport error: {}", error);
                if self.mounted {
                    vec![ConnectionEffect::WriteLine(ERROR_BANNER)]
                } else {
                    Vec::new()
                }
            }
            ConnectionEvent::ReconnectTimerFired => {
                if !self.reconnect_pending {
                    return Vec::new();
                }
                self.reconnect_pending = false;
                if self.mounted {
                    self.connect()
                } else {
                    Vec::new()
                }
            }
            ConnectionEvent::Disposed => self.dispose(),
        }
    }

    fn connect(&mut self) -> Vec<ConnectionEffect> {
        if !self.mounted || self.state == ConnectionState::Connecting {
            return Vec::new();
        }

        let mut effects = Vec::new();
        if self.reconnect_pending {
            self.reconnect_pending = false;
            effects.push(ConnectionEffect::CancelReconnect);
        }
        effects.push(ConnectionEffect::DetachTransport);
        effects.push(ConnectionEffect::WriteLine(CONNECTING_BANNER));
        effects.push(ConnectionEffect::OpenTransport);
        self.state = ConnectionState::Connecting;
        effects
    }

    fn on_open(&mut self) -> Vec<ConnectionEffect> {
        if !self.mounted || self.state != ConnectionState::Connecting {
            return Vec::new();
        }
        self.state = ConnectionState::Connected;
        self.policy.reset();
        info!("Terminal connection established");
        vec![
            ConnectionEffect::ClearSurface,
            ConnectionEffect::WriteLine(CONNECTED_BANNER),
            ConnectionEffect::WriteLine(""),
            ConnectionEffect::SendInitialResize,
        ]
    }

    fn on_close(&mut self, intentional: bool) -> Vec<ConnectionEffect> {
        if self.state == ConnectionState::Disconnected {
            return Vec::new();
        }
        self.state = ConnectionState::Disconnected;

        if !self.mounted {
            return Vec::new();
        }
        if intentional {
            info!("Terminal connection closed intentionally");
            return vec![ConnectionEffect::WriteLine(CLOSED_BANNER)];
        }

        let mut effects = vec![ConnectionEffect::WriteLine(RECONNECTING_BANNER)];
        effects.extend(self.schedule_reconnect());
        effects
    }

    fn schedule_reconnect(&mut self) -> Option<ConnectionEffect> {
        if !self.mounted || self.reconnect_pending {
            return None;
        }
        let attempt = self.policy.attempt();
        let delay = self.policy.next_delay();
        self.reconnect_pending = true;
        info!(attempt, delay_ms = delay.as_millis() as u64, "Scheduling terminal reconnect");
        Some(ConnectionEffect::ScheduleReconnect(delay))
    }

    fn dispose(&mut self) -> Vec<ConnectionEffect> {
        if !self.mounted {
            return Vec::new();
        }
        self.mounted = false;
        self.state = ConnectionState::Disconnected;

        let mut effects = Vec::new();
        if self.reconnect_pending {
            self.reconnect_pending = false;
            effects.push(ConnectionEffect::CancelReconnect);
        }
        effects.push(ConnectionEffect::CloseTransport);
        effects
    }
}

impl Default for ConnectionMachine {
    fn default() -> Self {
        Self::new(ReconnectConfig::default())
    }
}
