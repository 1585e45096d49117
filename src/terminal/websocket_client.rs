// ABOUTME: WebSocket client for one remote lab shell, run as a per-connection actor task
// Owns the transport, the reconnect timer, and the ordered queue of writes to the rendering surface

use crate::terminal::backoff::ReconnectConfig;
use crate::terminal::connection::{ConnectionEffect, ConnectionEvent, ConnectionMachine};
use crate::terminal::protocol::{ConnectionState, ControlFrame, Inbound, Outbound, TerminalSize};
use futures_util::{SinkExt, StreamExt};
use std::future::{pending, Future};
use std::pin::Pin;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Sleep};
use tokio_tungstenite::{connect_async, tungstenite, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Handshake = Pin<Box<dyn Future<Output = Result<WsStream, tungstenite::Error>> + Send>>;

/// Writes destined for the rendering surface, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// Clear the grid and scrollback.
    Reset,
    /// A status line from the client itself, followed by a newline.
    Line(String),
    /// Raw shell output.
    Output(Vec<u8>),
}

#[derive(Debug)]
enum Command {
    Connect,
    Input(String),
    Resize(TerminalSize),
    Dispose,
}

/// Handle to a connection actor.
///
/// Dropping the handle disposes the connection.
pub struct WebSocketTerminalClient {
    url: Url,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    task: Option<JoinHandle<()>>,
    disposed: bool,
}

impl WebSocketTerminalClient {
    /// Spawn the actor for `url`. Nothing connects until [`Self::connect`].
    ///
    /// Must be called inside a tokio runtime.
    pub fn spawn(
        url: Url,
        reconnect: ReconnectConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SurfaceEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (surface_tx, surface_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let actor = ConnectionActor {
            url: url.clone(),
            connect_timeout: reconnect.connect_timeout(),
            machine: ConnectionMachine::new(reconnect),
            commands: command_rx,
            surface: surface_tx,
            state: state_tx,
            socket: None,
            handshake: None,
            reconnect: None,
            size: None,
        };
        let task = tokio::spawn(actor.run());
        debug!("Spawned terminal connection actor for {}", url);

        let client = Self {
            url,
            commands: command_tx,
            state: state_rx,
            task: Some(task),
            disposed: false,
        };
        (client, surface_rx)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Open (or re-open) the stream. No-op while a handshake is in flight.
    pub fn connect(&self) {
        self.send(Command::Connect);
    }

    /// Forward keystrokes verbatim. Dropped unless connected.
    pub fn send_input(&self, data: impl Into<String>) {
        self.send(Command::Input(data.into()));
    }

    /// Record the surface size and send a resize frame if connected.
    pub fn send_resize(&self, size: TerminalSize) {
        self.send(Command::Resize(size));
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Watch connection state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Cancel any pending reconnect, stop delivering inbound data, and close
    /// the stream. Safe to call more than once.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        info!("Disposing terminal connection to {}", self.url);
        if self.commands.send(Command::Dispose).is_err() {
            debug!("Connection actor already stopped");
        }
        // The actor exits on its own after handling Dispose
        self.task.take();
    }

    fn send(&self, command: Command) {
        if self.disposed {
            debug!(?command, "Ignoring command for disposed connection");
            return;
        }
        if let Err(e) = self.commands.send(command) {
            warn!("Connection actor is gone, dropping {:?}", e.0);
        }
    }
}

impl Drop for WebSocketTerminalClient {
    fn drop(&mut self) {
        self.dispose();
    }
}

enum ActorEvent {
    Command(Option<Command>),
    Handshake(Result<WsStream, tungstenite::Error>),
    Inbound(Option<Result<tungstenite::Message, tungstenite::Error>>),
    ReconnectTimer,
}

struct ConnectionActor {
    url: Url,
    connect_timeout: Duration,
    machine: ConnectionMachine,
    commands: mpsc::UnboundedReceiver<Command>,
    surface: mpsc::UnboundedSender<SurfaceEvent>,
    state: watch::Sender<ConnectionState>,
    socket: Option<WsStream>,
    handshake: Option<Handshake>,
    reconnect: Option<Pin<Box<Sleep>>>,
    size: Option<TerminalSize>,
}

impl ConnectionActor {
    async fn run(mut self) {
        loop {
            let event = tokio::select! {
                command = self.commands.recv() => ActorEvent::Command(command),
                result = wait_handshake(&mut self.handshake) => ActorEvent::Handshake(result),
                message = next_message(&mut self.socket) => ActorEvent::Inbound(message),
                () = wait_timer(&mut self.reconnect) => ActorEvent::ReconnectTimer,
            };

            if !self.dispatch(event).await {
                break;
            }
        }
        debug!("Terminal connection actor for {} stopped", self.url);
    }

    /// Returns false once the connection has been disposed.
    async fn dispatch(&mut self, event: ActorEvent) -> bool {
        match event {
            ActorEvent::Command(None) | ActorEvent::Command(Some(Command::Dispose)) => {
                self.apply(ConnectionEvent::Disposed).await;
                return false;
            }
            ActorEvent::Command(Some(Command::Connect)) => {
                self.apply(ConnectionEvent::ConnectRequested).await;
            }
            ActorEvent::Command(Some(Command::Input(data))) => {
                if self.machine.state().is_connected() {
                    self.send(Outbound::Input(data)).await;
                } else {
                    debug!("Dropping {} bytes of input while not connected", data.len());
                }
            }
            ActorEvent::Command(Some(Command::Resize(size))) => {
                self.size = Some(size);
                if self.machine.state().is_connected() {
                    self.send(Outbound::Control(ControlFrame::Resize(size))).await;
                    debug!("Sent terminal resize: {}x{}", size.cols, size.rows);
                }
            }
            ActorEvent::Handshake(Ok(stream)) => {
                self.handshake = None;
                info!("WebSocket connected to {}", self.url);
                self.socket = Some(stream);
                self.apply(ConnectionEvent::Opened).await;
            }
            ActorEvent::Handshake(Err(e)) => {
                self.handshake = None;
                error!("WebSocket handshake with {} failed: {}", self.url, e);
                self.apply(ConnectionEvent::TransportError(e.to_string())).await;
                self.apply(ConnectionEvent::Closed { intentional: false }).await;
            }
            ActorEvent::Inbound(Some(Ok(message))) => self.on_message(message).await,
            ActorEvent::Inbound(Some(Err(e))) => {
                self.socket = None;
                self.apply(ConnectionEvent::TransportError(e.to_string())).await;
                self.apply(ConnectionEvent::Closed { intentional: false }).await;
            }
            ActorEvent::Inbound(None) => {
                self.socket = None;
                info!("WebSocket stream to {} ended", self.url);
                self.apply(ConnectionEvent::Closed { intentional: false }).await;
            }
            ActorEvent::ReconnectTimer => {
                self.reconnect = None;
                self.apply(ConnectionEvent::ReconnectTimerFired).await;
            }
        }
        true
    }

    async fn on_message(&mut self, message: tungstenite::Message) {
        match Inbound::from_message(message) {
            Inbound::Closed {
                intentional,
                reason,
            } => {
                info!(intentional, ?reason, "WebSocket closed by server");
                self.socket = None;
                self.apply(ConnectionEvent::Closed { intentional }).await;
            }
            inbound => {
                if let Some(bytes) = inbound.into_output() {
                    self.write(SurfaceEvent::Output(bytes));
                }
            }
        }
    }

    async fn apply(&mut self, event: ConnectionEvent) {
        for effect in self.machine.handle(event) {
            self.execute(effect).await;
        }
        let state = self.machine.state();
        self.state.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    async fn execute(&mut self, effect: ConnectionEffect) {
        match effect {
            ConnectionEffect::DetachTransport | ConnectionEffect::CloseTransport => {
                self.handshake = None;
                if let Some(mut socket) = self.socket.take() {
                    // Detached from the select loop first, so no further events fire for it
                    tokio::spawn(async move {
                        if let Err(e) = socket.close(None).await {
                            debug!("Error closing detached socket: {}", e);
                        }
                    });
                }
            }
            ConnectionEffect::OpenTransport => {
                let url = self.url.to_string();
                let limit = self.connect_timeout;
                debug!("Opening WebSocket to {} (timeout {:?})", url, limit);
                self.handshake = Some(Box::pin(async move {
                    match timeout(limit, connect_async(url.as_str())).await {
                        Ok(result) => result.map(|(stream, _response)| stream),
                        // A stalled upgrade counts as a failed handshake
                        Err(_elapsed) => Err(tungstenite::Error::Io(std::io::Error::new(
                            std::io::ErrorKind::TimedOut,
                            format!("handshake timed out after {}ms", limit.as_millis()),
                        ))),
                    }
                }));
            }
            ConnectionEffect::ClearSurface => self.write(SurfaceEvent::Reset),
            ConnectionEffect::WriteLine(line) => self.write(SurfaceEvent::Line(line.to_string())),
            ConnectionEffect::SendInitialResize => match self.size {
                Some(size) => self.send(Outbound::Control(ControlFrame::Resize(size))).await,
                None => debug!("No surface size yet, skipping initial resize"),
            },
            ConnectionEffect::ScheduleReconnect(delay) => {
                self.reconnect = Some(Box::pin(sleep(delay)));
            }
            ConnectionEffect::CancelReconnect => {
                self.reconnect = None;
            }
        }
    }

    async fn send(&mut self, frame: Outbound) {
        let Some(socket) = self.socket.as_mut() else {
            return;
        };
        if let Err(e) = socket.send(frame.into_message()).await {
            // The read side reports the broken stream and drives the reconnect
            warn!("Failed to send on terminal stream: {}", e);
        }
    }

    fn write(&self, event: SurfaceEvent) {
        if !self.machine.is_mounted() {
            return;
        }
        if self.surface.send(event).is_err() {
            debug!("Rendering surface is gone, dropping write");
        }
    }
}

async fn wait_handshake(handshake: &mut Option<Handshake>) -> Result<WsStream, tungstenite::Error> {
    match handshake.as_mut() {
        Some(future) => future.await,
        None => pending().await,
    }
}

async fn next_message(
    socket: &mut Option<WsStream>,
) -> Option<Result<tungstenite::Message, tungstenite::Error>> {
    match socket.as_mut() {
        Some(stream) => stream.next().await,
        None => pending().await,
    }
}

async fn wait_timer(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer.as_mut() {
        Some(sleep) => sleep.await,
        None => pending().await,
    }
}
