// ABOUTME: Framing codec for the terminal attach stream between the TUI and the lab terminal service
// Control frames travel client -> server only; the server sends raw shell output back

use crate::models::TerminalIdentity;
use thiserror::Error;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

/// Message-type tag of the resize control frame.
pub const RESIZE_FRAME_TAG: u8 = 1;

/// Resize frames are always exactly this long.
pub const RESIZE_FRAME_LEN: usize = 5;

// ============================================
// Terminal dimensions
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalSize {
    pub cols: u16,
    pub rows: u16,
}

impl TerminalSize {
    /// Returns `None` when either dimension is zero; such sizes are never sent.
    pub fn new(cols: u16, rows: u16) -> Option<Self> {
        if cols == 0 || rows == 0 {
            None
        } else {
            Some(Self { cols, rows })
        }
    }
}

// ============================================
// Control frames (client -> server)
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFrame {
    Resize(TerminalSize),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("control frame has {actual} bytes, expected {expected}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("unknown control frame tag {0}")]
    UnknownTag(u8),

    #[error("resize frame carries a zero dimension")]
    ZeroDimension,
}

impl ControlFrame {
    pub fn resize(cols: u16, rows: u16) -> Option<Self> {
        TerminalSize::new(cols, rows).map(Self::Resize)
    }

    /// tag, cols (big-endian u16), rows (big-endian u16)
    pub fn encode(&self) -> [u8; RESIZE_FRAME_LEN] {
        match self {
            Self::Resize(size) => {
                let [c0, c1] = size.cols.to_be_bytes();
                let [r0, r1] = size.rows.to_be_bytes();
                [RESIZE_FRAME_TAG, c0, c1, r0, r1]
            }
        }
    }

    /// Decode a control frame. The client never receives these; the terminal
    /// service side and tests use it.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let Some(&tag) = bytes.first() else {
            return Err(FrameError::InvalidLength {
                expected: RESIZE_FRAME_LEN,
                actual: 0,
            });
        };
        if tag != RESIZE_FRAME_TAG {
            return Err(FrameError::UnknownTag(tag));
        }
        if bytes.len() != RESIZE_FRAME_LEN {
            return Err(FrameError::InvalidLength {
                expected: RESIZE_FRAME_LEN,
                actual: bytes.len(),
            });
        }
        let cols = u16::from_be_bytes([bytes[1], bytes[2]]);
        let rows = u16::from_be_bytes([bytes[3], bytes[4]]);
        TerminalSize::new(cols, rows)
            .map(Self::Resize)
            .ok_or(FrameError::ZeroDimension)
    }
}

// ============================================
// Stream payloads
// ============================================

/// Everything the client writes to the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Keystrokes, passed through unframed as a text message.
    Input(String),
    /// Binary control frame.
    Control(ControlFrame),
}

impl Outbound {
    pub fn into_message(self) -> Message {
        match self {
            Self::Input(data) => Message::Text(data),
            Self::Control(frame) => Message::Binary(frame.encode().to_vec()),
        }
    }
}

/// Everything the client can read from the stream.
///
/// Binary payloads are shell output, never control frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    Bytes(Vec<u8>),
    /// The remote end closed the stream. `intentional` is set for a normal
    /// closure (code 1000), which must not trigger a reconnect.
    Closed { intentional: bool, reason: Option<String> },
    /// Ping, pong and raw frames; nothing for the rendering surface.
    Ignored,
}

impl Inbound {
    pub fn from_message(message: Message) -> Self {
        match message {
            Message::Text(text) => Self::Text(text),
            Message::Binary(bytes) => Self::Bytes(bytes),
            Message::Close(frame) => {
                let intentional = frame
                    .as_ref()
                    .is_some_and(|frame| frame.code == CloseCode::Normal);
                let reason = frame
                    .map(|frame| frame.reason.into_owned())
                    .filter(|reason| !reason.is_empty());
                Self::Closed { intentional, reason }
            }
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Self::Ignored,
        }
    }

    /// Bytes to write to the rendering surface, if this payload carries output.
    pub fn into_output(self) -> Option<Vec<u8>> {
        match self {
            Self::Text(text) => Some(text.into_bytes()),
            Self::Bytes(bytes) => Some(bytes),
            Self::Closed { .. } | Self::Ignored => None,
        }
    }
}

// ============================================
// Connection state
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
        }
    }
}

// ============================================
// Attach URL
// ============================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttachUrlError {
    #[error("API base must use http or https, got {0}")]
    UnsupportedScheme(String),

    #[error("API base has no host: {0}")]
    MissingHost(String),

    #[error("invalid attach URL: {0}")]
    Parse(#[from] url::ParseError),
}

/// `{ws|wss}://{host}/api/v1/terminals/{identity}/attach`, with the scheme
/// upgraded from the API base.
pub fn attach_url(api_base: &Url, identity: &TerminalIdentity) -> Result<Url, AttachUrlError> {
    let scheme = match api_base.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => return Err(AttachUrlError::UnsupportedScheme(other.to_string())),
    };
    let host = api_base
        .host_str()
        .ok_or_else(|| AttachUrlError::MissingHost(api_base.to_string()))?;
    let authority = match api_base.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    let url = Url::parse(&format!(
        "{scheme}://{authority}/api/v1/terminals/{}/attach",
        identity.as_str()
    ))?;
    Ok(url)
}
