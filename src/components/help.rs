// ABOUTME: Help overlay component displaying keyboard shortcuts

use ratatui::{
    prelude::*,
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Clear, List, ListItem},
};

pub struct HelpComponent;

impl HelpComponent {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let popup_area = centered_rect(60, 80, area);

        frame.render_widget(Clear, popup_area);

        let heading = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);
        let help_items = vec![
            ListItem::new("Targets:").style(heading),
            ListItem::new("  F1         Control plane shell"),
            ListItem::new("  F2         Worker node shell"),
            ListItem::new(""),
            ListItem::new("Tabs:").style(heading),
            ListItem::new("  Ctrl+T     New terminal for this target"),
            ListItem::new("  Ctrl+W     Close the active terminal"),
            ListItem::new("  Alt+←/→    Previous / next tab"),
            ListItem::new("  F5         Retry, reconnect, or re-check session"),
            ListItem::new(""),
            ListItem::new("Terminal:").style(heading),
            ListItem::new("  Ctrl+F     Find in buffer"),
            ListItem::new("  Enter/↓    Next match (while searching)"),
            ListItem::new("  Shift+Enter/↑  Previous match"),
            ListItem::new("  Esc        Close search"),
            ListItem::new("  PgUp/PgDn  Scroll history"),
            ListItem::new("  F6         Clear terminal"),
            ListItem::new(""),
            ListItem::new("General:").style(heading),
            ListItem::new("  F10        Toggle this help"),
            ListItem::new("  Ctrl+Q     Quit"),
        ];

        let help_list = List::new(help_items).block(
            Block::default()
                .title("Help - Press F10 or Esc to close")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        );

        frame.render_widget(help_list, popup_area);
    }
}

impl Default for HelpComponent {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a centered rectangle
pub fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
