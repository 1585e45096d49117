// ABOUTME: Terminal emulator widget acting as the rendering surface for one remote shell
// Renders the live vt100 grid, or the plain-text scrollback log when scrolled into history

use crate::terminal::protocol::TerminalSize;
use crate::terminal::scrollback::ScrollbackLog;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Widget},
};

const DEFAULT_SCROLLBACK: usize = 5000;

/// A highlighted span of a buffered line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Highlight {
    line: usize,
    column: usize,
    len: usize,
}

/// Rendering surface for PTY output
pub struct TerminalEmulatorWidget {
    /// VT100 parser for the live screen; its own scrollback stays unused
    parser: vt100::Parser,

    /// Output history as text, shared by scrolling and search
    log: ScrollbackLog,

    /// Lines scrolled back from the end of the log
    scroll_offset: usize,

    /// Title for the terminal block
    title: String,

    /// Border style based on focus state
    border_style: Style,

    highlight: Option<Highlight>,
}

impl TerminalEmulatorWidget {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self::with_scrollback(cols, rows, DEFAULT_SCROLLBACK)
    }

    pub fn with_scrollback(cols: u16, rows: u16, scrollback_len: usize) -> Self {
        Self {
            parser: vt100::Parser::new(rows.max(1), cols.max(1), 0),
            log: ScrollbackLog::new(scrollback_len),
            scroll_offset: 0,
            title: String::from("Terminal"),
            border_style: Style::default().fg(Color::Gray),
            highlight: None,
        }
    }

    /// Write raw shell output
    pub fn write(&mut self, data: &[u8]) {
        tracing::trace!("Terminal surface processing {} bytes", data.len());
        self.parser.process(data);
        self.log.process(data);
        self.highlight = None;
        // New output snaps back to the live screen
        self.scroll_offset = 0;
    }

    /// Write a status line followed by CRLF
    pub fn write_line(&mut self, line: &str) {
        self.write(line.as_bytes());
        self.write(b"\r\n");
    }

    /// Clear the grid and scrollback, keeping the current size
    pub fn reset(&mut self) {
        let (rows, cols) = self.parser.screen().size();
        self.parser = vt100::Parser::new(rows, cols, 0);
        self.log.clear();
        self.scroll_offset = 0;
        self.highlight = None;
    }

    pub fn resize(&mut self, size: TerminalSize) {
        self.parser.set_size(size.rows, size.cols);
        self.highlight = None;
        self.scroll_offset = self.scroll_offset.min(self.max_offset());
    }

    pub fn size(&self) -> TerminalSize {
        let (rows, cols) = self.parser.screen().size();
        TerminalSize { cols, rows }
    }

    /// Grid size that fits `area` inside the border, if any.
    pub fn proposed_size(area: Rect) -> Option<TerminalSize> {
        let inner = Block::default().borders(Borders::ALL).inner(area);
        TerminalSize::new(inner.width, inner.height)
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    fn screen_rows(&self) -> usize {
        usize::from(self.parser.screen().size().0)
    }

    /// Furthest offset that still fills the screen with history.
    fn max_offset(&self) -> usize {
        self.log.len().saturating_sub(self.screen_rows())
    }

    /// Scroll up by n lines
    pub fn scroll_up(&mut self, n: usize) {
        self.scroll_offset = self.scroll_offset.saturating_add(n).min(self.max_offset());
        self.highlight = None;
    }

    /// Scroll down by n lines
    pub fn scroll_down(&mut self, n: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(n);
        self.highlight = None;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_offset = 0;
        self.highlight = None;
    }

    /// Check if at bottom
    pub fn is_at_bottom(&self) -> bool {
        self.scroll_offset == 0
    }

    /// Plain text of every buffered line, oldest first.
    pub fn buffer_lines(&self) -> Vec<String> {
        self.log.lines()
    }

    /// Scroll so buffer line `line` is visible and highlight `len` cells from `column`.
    pub fn reveal(&mut self, line: usize, column: usize, len: usize) {
        let total = self.log.len();
        if line >= total {
            tracing::debug!("Reveal of line {} ignored, buffer holds {}", line, total);
            return;
        }
        // Bring the line to the top row unless it is already on the last screen
        self.scroll_offset = total.saturating_sub(line + self.screen_rows());
        self.highlight = Some(Highlight { line, column, len });
    }

    pub fn clear_highlight(&mut self) {
        self.highlight = None;
    }

    /// The log view is shown while scrolled back or while a match is highlighted.
    fn shows_history(&self) -> bool {
        self.scroll_offset > 0 || self.highlight.is_some()
    }

    /// Set terminal title
    pub fn set_title(&mut self, title: String) {
        self.title = title;
    }

    /// Set border style based on focus
    pub fn set_focused(&mut self, focused: bool) {
        self.border_style = if focused {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::Gray)
        };
    }

    /// Convert VT100 cell attributes to ratatui Style
    fn cell_to_style(cell: &vt100::Cell) -> Style {
        let mut style = Style::default();

        style = match cell.fgcolor() {
            vt100::Color::Default => style,
            vt100::Color::Idx(n) => style.fg(Self::ansi_to_ratatui_color(n)),
            vt100::Color::Rgb(r, g, b) => style.fg(Color::Rgb(r, g, b)),
        };

        style = match cell.bgcolor() {
            vt100::Color::Default => style,
            vt100::Color::Idx(n) => style.bg(Self::ansi_to_ratatui_color(n)),
            vt100::Color::Rgb(r, g, b) => style.bg(Color::Rgb(r, g, b)),
        };

        if cell.bold() {
            style = style.add_modifier(Modifier::BOLD);
        }
        if cell.italic() {
            style = style.add_modifier(Modifier::ITALIC);
        }
        if cell.underline() {
            style = style.add_modifier(Modifier::UNDERLINED);
        }
        if cell.inverse() {
            style = style.add_modifier(Modifier::REVERSED);
        }

        style
    }

    fn ansi_to_ratatui_color(idx: u8) -> Color {
        match idx {
            0 => Color::Black,
            1 => Color::Red,
            2 => Color::Green,
            3 => Color::Yellow,
            4 => Color::Blue,
            5 => Color::Magenta,
            6 => Color::Cyan,
            7 => Color::Gray,
            8 => Color::DarkGray,
            9 => Color::LightRed,
            10 => Color::LightGreen,
            11 => Color::LightYellow,
            12 => Color::LightBlue,
            13 => Color::LightMagenta,
            14 => Color::LightCyan,
            15 => Color::White,
            n => Color::Indexed(n),
        }
    }

    fn is_highlighted(&self, line: usize, column: usize) -> bool {
        self.highlight.is_some_and(|h| {
            h.line == line && column >= h.column && column < h.column.saturating_add(h.len)
        })
    }

    fn render_live(&self, inner: Rect, buf: &mut Buffer) {
        let screen = self.parser.screen();
        let (rows, cols) = screen.size();

        for row in 0..rows.min(inner.height) {
            for col in 0..cols.min(inner.width) {
                let Some(cell) = screen.cell(row, col) else {
                    continue;
                };
                let contents = cell.contents();
                let symbol = if contents.is_empty() { " " } else { contents.as_str() };
                buf.get_mut(inner.x + col, inner.y + row)
                    .set_symbol(symbol)
                    .set_style(TerminalEmulatorWidget::cell_to_style(cell));
            }
        }

        if !screen.hide_cursor() && inner.width > 0 && inner.height > 0 {
            let (cursor_row, cursor_col) = screen.cursor_position();
            let x = inner.x + cursor_col.min(inner.width - 1);
            let y = inner.y + cursor_row.min(inner.height - 1);
            buf.get_mut(x, y)
                .set_style(Style::default().add_modifier(Modifier::REVERSED));
        }
    }

    fn render_history(&self, inner: Rect, buf: &mut Buffer) {
        let end = self.log.len().saturating_sub(self.scroll_offset);
        let start = end.saturating_sub(self.screen_rows());
        let match_style = Style::default().bg(Color::Rgb(0xff, 0x99, 0x00)).fg(Color::Black);

        for (y, index) in (inner.top()..inner.bottom()).zip(start..end) {
            let Some(line) = self.log.line(index) else {
                break;
            };
            for (x, (column, ch)) in (inner.left()..inner.right()).zip(line.chars().enumerate()) {
                let style = if self.is_highlighted(index, column) {
                    match_style
                } else {
                    Style::default()
                };
                buf.get_mut(x, y).set_char(ch).set_style(style);
            }
        }
    }
}

impl Widget for &TerminalEmulatorWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(self.title.clone())
            .borders(Borders::ALL)
            .border_style(self.border_style);
        let inner = block.inner(area);
        block.render(area, buf);

        if self.shows_history() {
            self.render_history(inner, buf);
        } else {
            self.render_live(inner, buf);
        }

        // Render scroll indicator
        let offset = self.scroll_offset;
        if offset > 0 {
            let indicator = format!(" ▲ {offset} lines below ");
            let max_x = area.right().saturating_sub(2);
            for (i, ch) in indicator.chars().enumerate() {
                let Ok(i) = u16::try_from(i) else { break };
                let x = area.left() + 2 + i;
                if x >= max_x {
                    break;
                }
                buf.get_mut(x, area.top())
                    .set_symbol(&ch.to_string())
                    .set_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));
            }
        }
    }
}
