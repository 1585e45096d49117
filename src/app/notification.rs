// ABOUTME: Transient notifications (toasts) shown over the terminal area
// Each carries its own time-to-live taken from configuration

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationType {
    Success,
    Error,
    Info,
    Warning,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    pub notification_type: NotificationType,
    pub created_at: Instant,
    pub duration: Duration,
}

impl Notification {
    pub fn new(message: impl Into<String>, notification_type: NotificationType, duration: Duration) -> Self {
        Self {
            message: message.into(),
            notification_type,
            created_at: Instant::now(),
            duration,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) > self.duration
    }

    pub fn icon(&self) -> &'static str {
        match self.notification_type {
            NotificationType::Success => "✓",
            NotificationType::Error => "✗",
            NotificationType::Info => "ℹ",
            NotificationType::Warning => "⚠",
        }
    }
}
