// ABOUTME: Core data models for lab sessions, terminal targets, and terminal tabs

pub mod session;
pub mod terminal;

pub use session::{SessionInfo, SessionStatus};
pub use terminal::{Tab, TabId, TabState, Target, TerminalIdentity};
