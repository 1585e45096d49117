// ABOUTME: Placeholder panels for the terminal area: readiness gate, loading, failed and empty tabs

use crate::components::help::centered_rect;
use crate::models::{SessionStatus, Tab, Target};
use ratatui::{
    prelude::*,
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Paragraph, Wrap},
};

pub struct SessionStatusComponent;

impl SessionStatusComponent {
    pub fn new() -> Self {
        Self
    }

    /// Blocking panel shown until the session is ready.
    pub fn render_gate(&self, frame: &mut Frame, area: Rect, status: &SessionStatus) {
        let mut lines = Vec::new();
        let (title, color) = if status.is_loading {
            lines.push(Line::from(status.message.clone()).style(Style::default().fg(Color::Yellow)));
            lines.push(Line::from(""));
            lines.push(
                Line::from("Terminals open automatically once the lab is running.")
                    .style(Style::default().fg(Color::Gray)),
            );
            (" ◌ Preparing lab session ", Color::Yellow)
        } else {
            lines.push(
                Line::from(status.message.clone())
                    .style(Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
            );
            if let Some(error) = &status.error {
                lines.push(Line::from(""));
                lines.push(Line::from(error.clone()));
            }
            lines.push(Line::from(""));
            lines.push(Line::from("Press F5 to check again").style(Style::default().fg(Color::Gray)));
            (" ✗ Lab session unavailable ", Color::Red)
        };
        self.render_panel(frame, area, title, color, lines);
    }

    pub fn render_loading(&self, frame: &mut Frame, area: Rect, tab: &Tab) {
        let lines = vec![
            Line::from("Creating terminal session...").style(Style::default().fg(Color::Yellow)),
            Line::from(""),
            Line::from(format!("{} · {}", tab.target.label(), tab.id)).style(Style::default().fg(Color::Gray)),
        ];
        self.render_panel(frame, area, " ◌ Provisioning ", Color::Yellow, lines);
    }

    pub fn render_failed(&self, frame: &mut Frame, area: Rect, tab: &Tab) {
        let error = tab.error.clone().unwrap_or_else(|| "Unknown error".to_string());
        let lines = vec![
            Line::from("Failed to create terminal")
                .style(Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
            Line::from(""),
            Line::from(error),
            Line::from(""),
            Line::from("Press F5 to retry · Ctrl+W to close").style(Style::default().fg(Color::Gray)),
        ];
        self.render_panel(frame, area, " ✗ Terminal error ", Color::Red, lines);
    }

    pub fn render_attaching(&self, frame: &mut Frame, area: Rect, tab: &Tab) {
        let lines = vec![Line::from(format!("Attaching to {}...", tab.id))];
        self.render_panel(frame, area, " Connecting ", Color::Yellow, lines);
    }

    pub fn render_empty(&self, frame: &mut Frame, area: Rect, target: Target) {
        let lines = vec![
            Line::from(format!("No {} terminals open", target.label())),
            Line::from(""),
            Line::from("Press Ctrl+T to open one").style(Style::default().fg(Color::Gray)),
        ];
        self.render_panel(frame, area, " Terminals ", Color::Gray, lines);
    }

    fn render_panel(&self, frame: &mut Frame, area: Rect, title: &str, color: Color, lines: Vec<Line<'static>>) {
        let outer = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));
        frame.render_widget(outer, area);

        let panel_area = centered_rect(60, 40, area);
        let paragraph = Paragraph::new(lines)
            .block(
                Block::default()
                    .title(title.to_string())
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(color)),
            )
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, panel_area);
    }
}

impl Default for SessionStatusComponent {
    fn default() -> Self {
        Self::new()
    }
}
