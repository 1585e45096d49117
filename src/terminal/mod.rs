// ABOUTME: Terminal module for streaming remote lab shells into the TUI
// Framing codec, reconnecting WebSocket connection, vt100 surface and search overlay

pub mod backoff;
pub mod connection;
pub mod interactive_terminal;
pub mod protocol;
pub mod scrollback;
pub mod search;
pub mod terminal_emulator;
pub mod websocket_client;

pub use backoff::{ReconnectConfig, ReconnectPolicy};
pub use connection::{ConnectionEffect, ConnectionEvent, ConnectionMachine};
pub use interactive_terminal::{encode_key, ConnectionCallback, InteractiveTerminalComponent};
pub use protocol::{attach_url, ConnectionState, ControlFrame, TerminalSize};
pub use scrollback::ScrollbackLog;
pub use search::{SearchMatch, SearchOverlay};
pub use terminal_emulator::TerminalEmulatorWidget;
pub use websocket_client::{SurfaceEvent, WebSocketTerminalClient};
