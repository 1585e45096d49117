// ABOUTME: Top bar with the two target buttons and the active target's terminal tabs

use crate::app::AppState;
use crate::models::Target;
use ratatui::{
    prelude::*,
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Paragraph},
};

pub struct TabBarComponent;

impl TabBarComponent {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, state: &AppState) {
        let orchestrator = &state.orchestrator;
        let active_target = orchestrator.active_target();

        let mut spans = Vec::new();
        for (index, target) in Target::ALL.into_iter().enumerate() {
            let dot = if orchestrator.is_target_connected(target) { "●" } else { "○" };
            let label = format!(" F{} {} {} ", index + 1, target.label(), dot);
            let style = if target == active_target {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            spans.push(Span::styled(label, style));
            spans.push(Span::raw(" "));
        }

        spans.push(Span::styled("│ ", Style::default().fg(Color::DarkGray)));

        let tabs = orchestrator.tabs(active_target);
        if tabs.is_empty() {
            spans.push(Span::styled(
                "no terminals",
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            ));
        }
        let active_tab = orchestrator.active_tab_id();
        for tab in tabs {
            let style = if Some(&tab.id) == active_tab {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
            } else {
                Style::default().fg(Color::White)
            };
            spans.push(Span::styled(format!("{} {}", tab.indicator(), tab.id), style));
            spans.push(Span::raw("  "));
        }

        let title = format!(" {} Session {} ", state.session_status().indicator(), state.gate.session_id());
        let bar = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        );
        frame.render_widget(bar, area);
    }
}

impl Default for TabBarComponent {
    fn default() -> Self {
        Self::new()
    }
}
