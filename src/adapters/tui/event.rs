use color_eyre::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    Quit,
    Tick,

    // Navigation
    NextView,
    PreviousView,
    Up,
    Down,
    Enter,
    Escape,

    // Input handling, interpreted per view
    Character(char),
    Backspace,
}

pub struct EventHandler {
    should_quit: bool,
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler {
    pub fn new() -> Self {
        Self { should_quit: false }
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub async fn next_event(&mut self) -> Result<AppEvent> {
        if event::poll(Duration::from_millis(100))? {
            match event::read()? {
                Event::Key(key_event) => Ok(self.handle_key_event(key_event)),
                _ => Ok(AppEvent::Tick),
            }
        } else {
            Ok(AppEvent::Tick)
        }
    }

    fn handle_key_event(&mut self, key_event: KeyEvent) -> AppEvent {
        match (key_event.code, key_event.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => {
                self.should_quit = true;
                AppEvent::Quit
            }
            (KeyCode::Tab, _) => AppEvent::NextView,
            (KeyCode::BackTab, _) => AppEvent::PreviousView,
            (KeyCode::Up, _) => AppEvent::Up,
            (KeyCode::Down, _) => AppEvent::Down,
            (KeyCode::Enter, _) => AppEvent::Enter,
            (KeyCode::Esc, _) => AppEvent::Escape,
            (KeyCode::Backspace, _) => AppEvent::Backspace,
            (KeyCode::Char(c), KeyModifiers::NONE) => AppEvent::Character(c),
            (KeyCode::Char(c), KeyModifiers::SHIFT) => {
                AppEvent::Character(c.to_uppercase().next().unwrap_or(c))
            }
            _ => AppEvent::Tick,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn ctrl_c_quits() {
        let mut handler = EventHandler::new();
        let event = handler.handle_key_event(key(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert_eq!(event, AppEvent::Quit);
        assert!(handler.should_quit());
    }

    #[test]
    fn letters_pass_through_as_characters() {
        let mut handler = EventHandler::new();
        assert_eq!(
            handler.handle_key_event(key(KeyCode::Char('q'), KeyModifiers::NONE)),
            AppEvent::Character('q')
        );
        assert_eq!(
            handler.handle_key_event(key(KeyCode::Char('a'), KeyModifiers::SHIFT)),
            AppEvent::Character('A')
        );
        assert!(!handler.should_quit());
    }

    #[test]
    fn tab_cycles_views() {
        let mut handler = EventHandler::new();
        assert_eq!(
            handler.handle_key_event(key(KeyCode::Tab, KeyModifiers::NONE)),
            AppEvent::NextView
        );
        assert_eq!(
            handler.handle_key_event(key(KeyCode::BackTab, KeyModifiers::SHIFT)),
            AppEvent::PreviousView
        );
    }
}
