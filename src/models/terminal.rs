// ABOUTME: Terminal targets, tab identifiers, and the per-tab provisioning model
// A tab moves loading -> ready (identity issued) or loading -> failed (error recorded)

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two fixed shells a lab session exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Target {
    ControlPlane,
    WorkerNode,
}

impl Target {
    /// Tab bar order.
    pub const ALL: [Self; 2] = [Self::ControlPlane, Self::WorkerNode];

    /// Wire name used by the provisioning API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ControlPlane => "control-plane",
            Self::WorkerNode => "worker-node",
        }
    }

    /// Prefix for locally generated tab ids.
    pub fn tab_prefix(&self) -> &'static str {
        match self {
            Self::ControlPlane => "cp",
            Self::WorkerNode => "wk",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::ControlPlane => "Control Plane",
            Self::WorkerNode => "Worker Node",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Locally generated tab id, `<prefix>-<sequence>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TabId(String);

impl TabId {
    pub fn new(target: Target, sequence: u32) -> Self {
        Self(format!("{}-{}", target.tab_prefix(), sequence))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TabId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Opaque token addressing one live remote shell, issued by the provisioning API.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TerminalIdentity(String);

impl TerminalIdentity {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TerminalIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabState {
    Loading,
    Ready,
    Failed,
}

/// One terminal tab attached to a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tab {
    pub id: TabId,
    pub target: Target,
    pub identity: Option<TerminalIdentity>,
    pub is_loading: bool,
    pub error: Option<String>,
    /// Last status reported by the tab's terminal instance.
    pub connected: bool,
}

impl Tab {
    pub fn loading(id: TabId, target: Target) -> Self {
        Self {
            id,
            target,
            identity: None,
            is_loading: true,
            error: None,
            connected: false,
        }
    }

    pub fn state(&self) -> TabState {
        if self.identity.is_some() {
            TabState::Ready
        } else if self.is_loading {
            TabState::Loading
        } else {
            TabState::Failed
        }
    }

    pub fn indicator(&self) -> &'static str {
        match self.state() {
            TabState::Loading => "◌",
            TabState::Ready if self.connected => "●",
            TabState::Ready => "○",
            TabState::Failed => "✗",
        }
    }
}
