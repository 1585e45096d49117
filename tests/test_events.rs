// ABOUTME: Tests for global keyboard shortcuts and which keys fall through to the terminal

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use labterm::app::{AppEvent, AppState, EventHandler};
use labterm::models::Target;

fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
    KeyEvent::new(code, modifiers)
}

#[test]
fn test_global_shortcuts() {
    let state = AppState::new("s-1");
    let cases = [
        (press(KeyCode::Char('q'), KeyModifiers::CONTROL), AppEvent::Quit),
        (press(KeyCode::Char('t'), KeyModifiers::CONTROL), AppEvent::AddTerminal),
        (press(KeyCode::Char('w'), KeyModifiers::CONTROL), AppEvent::CloseTerminal),
        (press(KeyCode::Left, KeyModifiers::ALT), AppEvent::PreviousTab),
        (press(KeyCode::Right, KeyModifiers::ALT), AppEvent::NextTab),
        (press(KeyCode::F(1), KeyModifiers::NONE), AppEvent::SwitchTarget(Target::ControlPlane)),
        (press(KeyCode::F(2), KeyModifiers::NONE), AppEvent::SwitchTarget(Target::WorkerNode)),
        (press(KeyCode::F(5), KeyModifiers::NONE), AppEvent::RetryOrReconnect),
        (press(KeyCode::F(6), KeyModifiers::NONE), AppEvent::ClearTerminal),
        (press(KeyCode::F(10), KeyModifiers::NONE), AppEvent::ToggleHelp),
    ];
    for (key, expected) in cases {
        assert_eq!(EventHandler::handle_key_event(key, &state), Some(expected), "{key:?}");
    }
}

#[test]
fn test_shell_keys_fall_through() {
    let state = AppState::new("s-1");
    for key in [
        press(KeyCode::Char('q'), KeyModifiers::NONE),
        press(KeyCode::Char('c'), KeyModifiers::CONTROL),
        press(KeyCode::Char('d'), KeyModifiers::CONTROL),
        press(KeyCode::Char('f'), KeyModifiers::CONTROL),
        press(KeyCode::Left, KeyModifiers::NONE),
        press(KeyCode::Esc, KeyModifiers::NONE),
        press(KeyCode::Enter, KeyModifiers::NONE),
        press(KeyCode::Tab, KeyModifiers::NONE),
    ] {
        assert_eq!(EventHandler::handle_key_event(key, &state), None, "{key:?}");
    }
    assert!(EventHandler::forwards_to_terminal(&state));
}

#[test]
fn test_help_overlay_captures_keys() {
    let mut state = AppState::new("s-1");
    state.toggle_help();
    assert!(!EventHandler::forwards_to_terminal(&state));

    assert_eq!(
        EventHandler::handle_key_event(press(KeyCode::Esc, KeyModifiers::NONE), &state),
        Some(AppEvent::ToggleHelp)
    );
    assert_eq!(
        EventHandler::handle_key_event(press(KeyCode::F(10), KeyModifiers::NONE), &state),
        Some(AppEvent::ToggleHelp)
    );
    assert_eq!(
        EventHandler::handle_key_event(press(KeyCode::Char('q'), KeyModifiers::CONTROL), &state),
        Some(AppEvent::Quit)
    );
    assert_eq!(
        EventHandler::handle_key_event(press(KeyCode::F(1), KeyModifiers::NONE), &state),
        None
    );
}
