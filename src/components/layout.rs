// ABOUTME: Main layout component: tab bar, terminal area, bottom menu bar and overlays

use ratatui::{
    prelude::*,
    style::{Color, Style},
    widgets::{Block, Borders, Paragraph},
};

use super::{HelpComponent, NotificationComponent, SessionStatusComponent, TabBarComponent};
use crate::app::App;
use crate::models::TabState;

pub struct LayoutComponent {
    tab_bar: TabBarComponent,
    session_status: SessionStatusComponent,
    notifications: NotificationComponent,
    help: HelpComponent,
}

impl LayoutComponent {
    pub fn new() -> Self {
        Self {
            tab_bar: TabBarComponent::new(),
            session_status: SessionStatusComponent::new(),
            notifications: NotificationComponent::new(),
            help: HelpComponent::new(),
        }
    }

    pub fn render(&mut self, frame: &mut Frame, app: &mut App) {
        let main_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Targets and tabs
                Constraint::Min(0),    // Terminal area
                Constraint::Length(3), // Bottom menu bar
            ])
            .split(frame.size());

        self.tab_bar.render(frame, main_chunks[0], &app.state);
        self.render_content(frame, main_chunks[1], app);
        self.render_menu_bar(frame, main_chunks[2]);

        if !app.state.notifications.is_empty() {
            self.notifications
                .render(frame, main_chunks[1], &app.state.notifications);
        }

        if app.state.help_visible {
            self.help.render(frame, frame.size());
        }
    }

    fn render_content(&self, frame: &mut Frame, area: Rect, app: &mut App) {
        let status = app.state.session_status();
        if !status.is_ready {
            self.session_status.render_gate(frame, area, &status);
            return;
        }

        let Some(tab) = app.state.orchestrator.active_tab().cloned() else {
            let target = app.state.orchestrator.active_target();
            self.session_status.render_empty(frame, area, target);
            return;
        };

        match tab.state() {
            TabState::Loading => self.session_status.render_loading(frame, area, &tab),
            TabState::Failed => self.session_status.render_failed(frame, area, &tab),
            TabState::Ready => match app.active_terminal_mut() {
                Some(terminal) => terminal.render(frame, area),
                None => self.session_status.render_attaching(frame, area, &tab),
            },
        }
    }

    fn render_menu_bar(&self, frame: &mut Frame, area: Rect) {
        let menu_text =
            "F1/F2 target  Ctrl+T new  Ctrl+W close  Alt+←/→ tabs  Ctrl+F search  F5 retry  F6 clear  F10 help  Ctrl+Q quit";

        let menu = Paragraph::new(menu_text)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan)),
            )
            .style(Style::default().fg(Color::Yellow))
            .alignment(Alignment::Center);

        frame.render_widget(menu, area);
    }
}

impl Default for LayoutComponent {
    fn default() -> Self {
        Self::new()
    }
}
