// ABOUTME: Toast stack rendered in the top-right corner over the terminal area

use crate::app::{Notification, NotificationType};
use ratatui::{
    prelude::*,
    style::{Color, Style},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

const TOAST_WIDTH: u16 = 48;
const TOAST_HEIGHT: u16 = 3;
const MAX_VISIBLE: usize = 4;

pub struct NotificationComponent;

impl NotificationComponent {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, notifications: &[Notification]) {
        let width = TOAST_WIDTH.min(area.width);
        let mut y = area.y;

        for notification in notifications.iter().rev().take(MAX_VISIBLE) {
            if y + TOAST_HEIGHT > area.bottom() {
                break;
            }
            let toast_area = Rect {
                x: area.right().saturating_sub(width),
                y,
                width,
                height: TOAST_HEIGHT,
            };
            let color = match notification.notification_type {
                NotificationType::Success => Color::Green,
                NotificationType::Error => Color::Red,
                NotificationType::Info => Color::Cyan,
                NotificationType::Warning => Color::Yellow,
            };

            frame.render_widget(Clear, toast_area);
            frame.render_widget(
                Paragraph::new(format!("{} {}", notification.icon(), notification.message))
                    .block(
                        Block::default()
                            .borders(Borders::ALL)
                            .border_style(Style::default().fg(color)),
                    )
                    .wrap(Wrap { trim: true }),
                toast_area,
            );
            y += TOAST_HEIGHT;
        }
    }
}

impl Default for NotificationComponent {
    fn default() -> Self {
        Self::new()
    }
}
