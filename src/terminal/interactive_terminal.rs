// ABOUTME: Interactive terminal component pairing one connection with one rendering surface
// Translates keys to shell input, fits the grid to its area, and hosts the search overlay

use crate::models::{TabId, TerminalIdentity};
use crate::terminal::{
    backoff::ReconnectConfig,
    protocol::{attach_url, AttachUrlError, ConnectionState},
    search::SearchOverlay,
    terminal_emulator::TerminalEmulatorWidget,
    websocket_client::{SurfaceEvent, WebSocketTerminalClient},
};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    prelude::*,
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Clear, Paragraph},
};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};
use url::Url;

/// Invoked with `true`/`false` whenever the stream becomes connected or drops.
pub type ConnectionCallback = Box<dyn FnMut(bool) + Send>;

const SCROLL_STEP: usize = 10;
const SEARCH_BAR_HEIGHT: u16 = 3;

/// Interactive terminal component
pub struct InteractiveTerminalComponent {
    tab_id: TabId,
    identity: TerminalIdentity,

    /// WebSocket client for the remote shell
    client: Option<WebSocketTerminalClient>,

    /// Terminal emulator widget
    surface: Option<TerminalEmulatorWidget>,
    surface_events: mpsc::UnboundedReceiver<SurfaceEvent>,

    state: watch::Receiver<ConnectionState>,
    reported_connected: bool,
    on_connection_change: Option<ConnectionCallback>,

    search: SearchOverlay,

    /// Cleared first on unmount so queued surface writes are dropped
    mounted: bool,

    /// Focus state
    is_focused: bool,
}

impl InteractiveTerminalComponent {
    /// Build the surface, spawn the connection, and start connecting.
    ///
    /// Must be called inside a tokio runtime.
    pub fn mount(
        tab_id: TabId,
        identity: TerminalIdentity,
        api_base: &Url,
        reconnect: ReconnectConfig,
        on_connection_change: ConnectionCallback,
    ) -> Result<Self, AttachUrlError> {
        let url = attach_url(api_base, &identity)?;
        info!(tab = %tab_id, identity = %identity, "Mounting terminal for {}", url);

        let surface = TerminalEmulatorWidget::new(80, 24);
        let (client, surface_events) = WebSocketTerminalClient::spawn(url, reconnect);
        let state = client.subscribe();

        client.send_resize(surface.size());
        client.connect();

        Ok(Self {
            tab_id,
            identity,
            client: Some(client),
            surface: Some(surface),
            surface_events,
            state,
            reported_connected: false,
            on_connection_change: Some(on_connection_change),
            search: SearchOverlay::new(),
            mounted: true,
            is_focused: false,
        })
    }

    pub fn tab_id(&self) -> &TabId {
        &self.tab_id
    }

    pub fn identity(&self) -> &TerminalIdentity {
        &self.identity
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn connection_state(&self) -> ConnectionState {
        if !self.mounted {
            return ConnectionState::Disconnected;
        }
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state().is_connected()
    }

    pub fn is_search_visible(&self) -> bool {
        self.search.is_visible()
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.is_focused = focused;
    }

    /// Apply queued surface writes in arrival order and report connection
    /// changes. Returns true when anything visible changed.
    pub fn pump(&mut self) -> bool {
        if !self.mounted {
            return false;
        }
        let mut changed = false;

        while let Ok(event) = self.surface_events.try_recv() {
            let Some(surface) = self.surface.as_mut() else {
                break;
            };
            match event {
                SurfaceEvent::Reset => surface.reset(),
                SurfaceEvent::Line(line) => surface.write_line(&line),
                SurfaceEvent::Output(bytes) => surface.write(&bytes),
            }
            changed = true;
        }

        let connected = self.state.borrow().is_connected();
        if connected != self.reported_connected {
            self.reported_connected = connected;
            debug!(tab = %self.tab_id, connected, "Terminal connection changed");
            if let Some(callback) = self.on_connection_change.as_mut() {
                callback(connected);
            }
            changed = true;
        }

        changed
    }

    /// Handle a key event. Returns true if the key was consumed.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if !self.mounted {
            return false;
        }

        if self.search.is_visible() {
            return self.handle_search_key(key);
        }

        match (key.code, key.modifiers) {
            (KeyCode::Char('f'), KeyModifiers::CONTROL) => {
                debug!(tab = %self.tab_id, "Opening search overlay");
                self.search.open();
                true
            }
            (KeyCode::PageUp, _) => {
                if let Some(surface) = self.surface.as_mut() {
                    surface.scroll_up(SCROLL_STEP);
                }
                true
            }
            (KeyCode::PageDown, _) => {
                if let Some(surface) = self.surface.as_mut() {
                    surface.scroll_down(SCROLL_STEP);
                }
                true
            }
            _ => match encode_key(key) {
                Some(data) => {
                    if let Some(client) = self.client.as_ref() {
                        client.send_input(data);
                    }
                    true
                }
                None => false,
            },
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent) -> bool {
        match (key.code, key.modifiers) {
            (KeyCode::Esc, _) | (KeyCode::Char('f'), KeyModifiers::CONTROL) => {
                self.search.close();
                if let Some(surface) = self.surface.as_mut() {
                    surface.clear_highlight();
                    surface.scroll_to_bottom();
                }
            }
            (KeyCode::Up, _) => self.step_search(false),
            (KeyCode::Enter, modifiers) if modifiers.contains(KeyModifiers::SHIFT) => {
                self.step_search(false);
            }
            (KeyCode::Enter | KeyCode::Down, _) => self.step_search(true),
            (KeyCode::Backspace, _) => self.search.backspace(),
            (KeyCode::Char(c), modifiers)
                if !modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                self.search.push_char(c);
            }
            _ => {}
        }
        true
    }

    fn step_search(&mut self, forward: bool) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        let lines = surface.buffer_lines();
        let found = if forward {
            self.search.find_next(&lines)
        } else {
            self.search.find_previous(&lines)
        };
        match found {
            Some(hit) => surface.reveal(hit.line, hit.column, hit.len),
            None => debug!(tab = %self.tab_id, query = self.search.query(), "No search matches"),
        }
    }

    /// Fit the grid to `area`, sending a resize when the size changes.
    pub fn fit(&mut self, area: Rect) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        let Some(size) = TerminalEmulatorWidget::proposed_size(area) else {
            debug!(tab = %self.tab_id, "No usable terminal size for {:?}", area);
            return;
        };
        if size == surface.size() {
            return;
        }
        surface.resize(size);
        if let Some(client) = self.client.as_ref() {
            client.send_resize(size);
        }
    }

    /// Manual reconnect while the stream is down.
    pub fn reconnect(&mut self) {
        if !self.mounted || self.is_connected() {
            return;
        }
        info!(tab = %self.tab_id, "Manual reconnect requested");
        if let Some(client) = self.client.as_ref() {
            client.connect();
        }
    }

    /// Clear the local grid and scrollback.
    pub fn clear(&mut self) {
        if let Some(surface) = self.surface.as_mut() {
            surface.reset();
        }
    }

    /// Plain text of the whole buffer.
    pub fn buffer_lines(&self) -> Vec<String> {
        self.surface
            .as_ref()
            .map(TerminalEmulatorWidget::buffer_lines)
            .unwrap_or_default()
    }

    pub fn render(&mut self, frame: &mut Frame<'_>, area: Rect) {
        if !self.mounted {
            return;
        }

        let (terminal_area, search_area) = if self.search.is_visible() {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(3), Constraint::Length(SEARCH_BAR_HEIGHT)])
                .split(area);
            (chunks[0], Some(chunks[1]))
        } else {
            (area, None)
        };

        self.fit(terminal_area);

        let state = self.connection_state();
        if let Some(surface) = self.surface.as_mut() {
            surface.set_title(format!(" {} · {} ", self.tab_id, state.label()));
            surface.set_focused(self.is_focused);
            frame.render_widget(&*surface, terminal_area);
        }

        if let Some(search_area) = search_area {
            self.render_search_bar(frame, search_area);
        }

        if !state.is_connected() {
            self.render_connection_status(frame, terminal_area, state);
        }
    }

    fn render_search_bar(&self, frame: &mut Frame<'_>, area: Rect) {
        let counter = match self.search.counter() {
            Some((current, total)) => format!("{current}/{total}"),
            None if self.search.query().is_empty() => String::new(),
            None => "no matches".to_string(),
        };

        let line = Line::from(vec![
            Span::styled("Find: ", Style::default().fg(Color::Yellow)),
            Span::raw(self.search.query().to_string()),
            Span::styled("█", Style::default().fg(Color::Gray)),
            Span::raw("  "),
            Span::styled(counter, Style::default().fg(Color::DarkGray)),
        ]);

        let block = Block::default()
            .title(" Search (Enter next · Shift+Enter prev · Esc close) ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow));

        frame.render_widget(Paragraph::new(line).block(block), area);
    }

    /// Small badge in the bottom-right corner with the reconnect affordance
    fn render_connection_status(&self, frame: &mut Frame<'_>, area: Rect, state: ConnectionState) {
        let (text, color) = match state {
            ConnectionState::Connecting => (" Connecting... ".to_string(), Color::Yellow),
            _ => (" Disconnected · F5 Reconnect ".to_string(), Color::Red),
        };
        let width = u16::try_from(text.chars().count())
            .unwrap_or(u16::MAX)
            .min(area.width.saturating_sub(2));
        if width == 0 || area.height < 3 {
            return;
        }
        let badge = Rect {
            x: area.right().saturating_sub(width + 1),
            y: area.bottom().saturating_sub(2),
            width,
            height: 1,
        };
        frame.render_widget(Clear, badge);
        frame.render_widget(
            Paragraph::new(text)
                .style(Style::default().fg(Color::Black).bg(color).add_modifier(Modifier::BOLD)),
            badge,
        );
    }

    /// Stop the connection and release the surface. Safe to call more than once.
    pub fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        self.mounted = false;
        info!(tab = %self.tab_id, identity = %self.identity, "Unmounting terminal");

        if let Some(mut client) = self.client.take() {
            client.dispose();
        }
        self.surface = None;
        self.search.close();
        self.on_connection_change = None;
        self.surface_events.close();
    }
}

impl Drop for InteractiveTerminalComponent {
    fn drop(&mut self) {
        self.unmount();
    }
}

/// Translate a key event into the bytes a shell expects.
pub fn encode_key(key: KeyEvent) -> Option<String> {
    let data: Vec<u8> = match key.code {
        KeyCode::Char(c) => {
            if key.modifiers.contains(KeyModifiers::CONTROL) {
                if !c.is_ascii() {
                    return None;
                }
                // Send control character
                vec![(c.to_ascii_lowercase() as u8) & 0x1f]
            } else if key.modifiers.contains(KeyModifiers::ALT) {
                // Send Alt+key sequence
                let mut data = vec![0x1b];
                data.extend(c.to_string().into_bytes());
                data
            } else {
                c.to_string().into_bytes()
            }
        }
        KeyCode::Enter => vec![b'\r'],
        KeyCode::Tab => vec![b'\t'],
        KeyCode::BackTab => vec![0x1b, b'[', b'Z'],
        KeyCode::Backspace => vec![0x7f],
        KeyCode::Esc => vec![0x1b],
        KeyCode::Up => vec![0x1b, b'[', b'A'],
        KeyCode::Down => vec![0x1b, b'[', b'B'],
        KeyCode::Right => vec![0x1b, b'[', b'C'],
        KeyCode::Left => vec![0x1b, b'[', b'D'],
        KeyCode::Home => vec![0x1b, b'[', b'H'],
        KeyCode::End => vec![0x1b, b'[', b'F'],
        KeyCode::Delete => vec![0x1b, b'[', b'3', b'~'],
        KeyCode::Insert => vec![0x1b, b'[', b'2', b'~'],
        KeyCode::F(n) => match n {
            1 => vec![0x1b, b'O', b'P'],
            2 => vec![0x1b, b'O', b'Q'],
            3 => vec![0x1b, b'O', b'R'],
            4 => vec![0x1b, b'O', b'S'],
            5 => vec![0x1b, b'[', b'1', b'5', b'~'],
            6 => vec![0x1b, b'[', b'1', b'7', b'~'],
            7 => vec![0x1b, b'[', b'1', b'8', b'~'],
            8 => vec![0x1b, b'[', b'1', b'9', b'~'],
            9 => vec![0x1b, b'[', b'2', b'0', b'~'],
            10 => vec![0x1b, b'[', b'2', b'1', b'~'],
            11 => vec![0x1b, b'[', b'2', b'3', b'~'],
            12 => vec![0x1b, b'[', b'2', b'4', b'~'],
            _ => return None,
        },
        _ => return None,
    };
    String::from_utf8(data).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::connection::CONNECTING_BANNER;
    use ratatui::{backend::TestBackend, Terminal};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_encode_plain_and_control_keys() {
        assert_eq!(encode_key(key(KeyCode::Char('a'), KeyModifiers::NONE)).as_deref(), Some("a"));
        assert_eq!(
            encode_key(key(KeyCode::Char('c'), KeyModifiers::CONTROL)).as_deref(),
            Some("\x03")
        );
        assert_eq!(
            encode_key(key(KeyCode::Char('D'), KeyModifiers::CONTROL)).as_deref(),
            Some("\x04")
        );
        assert_eq!(
            encode_key(key(KeyCode::Char('b'), KeyModifiers::ALT)).as_deref(),
            Some("\x1bb")
        );
        assert_eq!(encode_key(key(KeyCode::Enter, KeyModifiers::NONE)).as_deref(), Some("\r"));
        assert_eq!(encode_key(key(KeyCode::Backspace, KeyModifiers::NONE)).as_deref(), Some("\x7f"));
    }

    #[test]
    fn test_encode_navigation_and_function_keys() {
        assert_eq!(encode_key(key(KeyCode::Up, KeyModifiers::NONE)).as_deref(), Some("\x1b[A"));
        assert_eq!(encode_key(key(KeyCode::Delete, KeyModifiers::NONE)).as_deref(), Some("\x1b[3~"));
        assert_eq!(encode_key(key(KeyCode::F(1), KeyModifiers::NONE)).as_deref(), Some("\x1bOP"));
        assert_eq!(encode_key(key(KeyCode::F(12), KeyModifiers::NONE)).as_deref(), Some("\x1b[24~"));
        assert_eq!(encode_key(key(KeyCode::F(13), KeyModifiers::NONE)), None);
        assert_eq!(encode_key(key(KeyCode::Char('é'), KeyModifiers::CONTROL)), None);
    }

    #[test]
    fn test_encode_unicode_passthrough() {
        assert_eq!(encode_key(key(KeyCode::Char('é'), KeyModifiers::NONE)).as_deref(), Some("é"));
    }

    fn unreachable_base() -> Url {
        // Nothing listens on the discard port locally
        Url::parse("http://127.0.0.1:9/api/v1").unwrap()
    }

    fn mount_unreachable(callback: ConnectionCallback) -> InteractiveTerminalComponent {
        InteractiveTerminalComponent::mount(
            TabId::from("cp-1"),
            TerminalIdentity::new("term-1"),
            &unreachable_base(),
            ReconnectConfig {
                base_delay_ms: 5_000,
                ..ReconnectConfig::default()
            },
            callback,
        )
        .unwrap()
    }

    async fn pump_until(terminal: &mut InteractiveTerminalComponent, needle: &str) -> bool {
        for _ in 0..100 {
            terminal.pump();
            if terminal.buffer_lines().iter().any(|line| line.contains(needle)) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_mount_writes_connecting_banner() {
        let mut terminal = mount_unreachable(Box::new(|_| {}));
        assert!(terminal.is_mounted());
        assert!(pump_until(&mut terminal, CONNECTING_BANNER).await);
        assert!(!terminal.is_connected());
    }

    #[tokio::test]
    async fn test_search_keys_are_captured() {
        let mut terminal = mount_unreachable(Box::new(|_| {}));
        assert!(terminal.handle_key(key(KeyCode::Char('f'), KeyModifiers::CONTROL)));
        assert!(terminal.is_search_visible());

        // Typed characters go to the query, not the shell
        assert!(terminal.handle_key(key(KeyCode::Char('x'), KeyModifiers::NONE)));
        assert!(terminal.handle_key(key(KeyCode::Esc, KeyModifiers::NONE)));
        assert!(!terminal.is_search_visible());
    }

    fn fill_history(terminal: &mut InteractiveTerminalComponent, lines: usize) {
        let surface = terminal.surface.as_mut().unwrap();
        surface.write(b"needle at the very top\r\n");
        for i in 1..lines {
            surface.write(format!("filler {i}\r\n").as_bytes());
        }
    }

    fn screen_row(backend: &TestBackend, y: u16) -> String {
        let buffer = backend.buffer();
        (0..buffer.area.width)
            .map(|x| buffer.get(x, y).symbol().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_search_reveals_match_deep_in_history() {
        let mut terminal = mount_unreachable(Box::new(|_| {}));
        fill_history(&mut terminal, 150);
        let mut screen = Terminal::new(TestBackend::new(82, 26)).unwrap();

        terminal.handle_key(key(KeyCode::Char('f'), KeyModifiers::CONTROL));
        screen.draw(|frame| terminal.render(frame, frame.size())).unwrap();
        for c in "NEEDLE".chars() {
            terminal.handle_key(key(KeyCode::Char(c), KeyModifiers::NONE));
        }
        terminal.handle_key(key(KeyCode::Enter, KeyModifiers::NONE));
        screen.draw(|frame| terminal.render(frame, frame.size())).unwrap();

        assert_eq!(terminal.search.current_match().map(|m| m.line), Some(0));
        assert!(!terminal.surface.as_ref().unwrap().is_at_bottom());
        assert!(screen_row(screen.backend(), 1).contains("needle at the very top"));
    }

    #[tokio::test]
    async fn test_page_up_through_long_history_renders() {
        let mut terminal = mount_unreachable(Box::new(|_| {}));
        fill_history(&mut terminal, 150);
        let mut screen = Terminal::new(TestBackend::new(82, 26)).unwrap();

        for _ in 0..4 {
            assert!(terminal.handle_key(key(KeyCode::PageUp, KeyModifiers::NONE)));
        }
        screen.draw(|frame| terminal.render(frame, frame.size())).unwrap();

        // 151 buffered lines, 40 back from the end leaves filler 87 at the top
        assert_eq!(terminal.surface.as_ref().unwrap().scroll_offset(), 40);
        assert!(screen_row(screen.backend(), 1).contains("filler 87 "));

        for _ in 0..20 {
            terminal.handle_key(key(KeyCode::PageUp, KeyModifiers::NONE));
        }
        screen.draw(|frame| terminal.render(frame, frame.size())).unwrap();
        assert!(screen_row(screen.backend(), 1).contains("needle at the very top"));
    }

    #[tokio::test]
    async fn test_unmount_is_idempotent_and_silences_callbacks() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let recorded = calls.clone();
        let mut terminal = mount_unreachable(Box::new(move |connected| {
            recorded.lock().unwrap().push(connected);
        }));

        terminal.unmount();
        terminal.unmount();

        assert!(!terminal.is_mounted());
        assert!(!terminal.pump());
        assert!(!terminal.handle_key(key(KeyCode::Char('a'), KeyModifiers::NONE)));
        assert!(terminal.buffer_lines().is_empty());
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_mount_rejects_non_http_base() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let _guard = runtime.enter();
        let result = InteractiveTerminalComponent::mount(
            TabId::from("wk-1"),
            TerminalIdentity::new("t"),
            &Url::parse("ftp://example.com").unwrap(),
            ReconnectConfig::default(),
            Box::new(|_| {}),
        );
        assert!(matches!(result, Err(AttachUrlError::UnsupportedScheme(_))));
    }
}
