// ABOUTME: Event handling system mapping global shortcuts to app actions
// Keys without a global meaning fall through to the active terminal

use crate::app::AppState;
use crate::models::Target;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    Quit,
    ToggleHelp,
    SwitchTarget(Target),
    AddTerminal,
    CloseTerminal,
    NextTab,
    PreviousTab,
    /// Page-level retry of a failed session, retry of a failed tab, or
    /// reconnect of a disconnected one.
    RetryOrReconnect,
    ClearTerminal,
}

pub struct EventHandler;

impl EventHandler {
    /// `None` means the key belongs to the active terminal.
    pub fn handle_key_event(key_event: KeyEvent, state: &AppState) -> Option<AppEvent> {
        if state.help_visible {
            return match key_event.code {
                KeyCode::F(10) | KeyCode::Esc => Some(AppEvent::ToggleHelp),
                KeyCode::Char('q') if key_event.modifiers.contains(KeyModifiers::CONTROL) => {
                    Some(AppEvent::Quit)
                }
                _ => None,
            };
        }

        let ctrl = key_event.modifiers.contains(KeyModifiers::CONTROL);
        let alt = key_event.modifiers.contains(KeyModifiers::ALT);

        match key_event.code {
            KeyCode::Char('q') if ctrl => Some(AppEvent::Quit),
            KeyCode::Char('t') if ctrl => Some(AppEvent::AddTerminal),
            KeyCode::Char('w') if ctrl => Some(AppEvent::CloseTerminal),
            KeyCode::Left if alt => Some(AppEvent::PreviousTab),
            KeyCode::Right if alt => Some(AppEvent::NextTab),
            KeyCode::F(1) => Some(AppEvent::SwitchTarget(Target::ControlPlane)),
            KeyCode::F(2) => Some(AppEvent::SwitchTarget(Target::WorkerNode)),
            KeyCode::F(5) => Some(AppEvent::RetryOrReconnect),
            KeyCode::F(6) => Some(AppEvent::ClearTerminal),
            KeyCode::F(10) => Some(AppEvent::ToggleHelp),
            _ => None,
        }
    }

    /// Whether keys that map to no event should reach the terminal.
    pub fn forwards_to_terminal(state: &AppState) -> bool {
        !state.help_visible
    }
}
