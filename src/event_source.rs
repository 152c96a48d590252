use std::collections::VecDeque;
use std::time::Duration;

use anyhow::Result;
pub use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyEventState, KeyModifiers};

/// Seam between the key loop and the terminal, so the whole reader can run
/// against scripted input in tests.
pub trait EventSource {
    fn poll(&mut self, timeout: Duration) -> Result<bool>;
    fn read(&mut self) -> Result<Event>;
}

/// Live crossterm keyboard.
pub struct KeyboardEventSource;

impl EventSource for KeyboardEventSource {
    fn poll(&mut self, timeout: Duration) -> Result<bool> {
        Ok(crossterm::event::poll(timeout)?)
    }

    fn read(&mut self) -> Result<Event> {
        Ok(crossterm::event::read()?)
    }
}

/// Scripted event source for tests. Once the script runs out it keeps
/// producing `q` so a test that forgets to quit still terminates.
pub struct ScriptedEvents {
    events: VecDeque<Event>,
}

impl ScriptedEvents {
    pub fn new(events: impl IntoIterator<Item = Event>) -> Self {
        ScriptedEvents {
            events: events.into_iter().collect(),
        }
    }

    /// Builds a script from plain characters, the common case.
    pub fn from_chars(keys: &str) -> Self {
        ScriptedEvents::new(keys.chars().map(key_char))
    }

    pub fn push(&mut self, event: Event) {
        self.events.push_back(event);
    }
}

impl EventSource for ScriptedEvents {
    fn poll(&mut self, _timeout: Duration) -> Result<bool> {
        Ok(!self.events.is_empty())
    }

    fn read(&mut self) -> Result<Event> {
        Ok(self.events.pop_front().unwrap_or_else(|| key_char('q')))
    }
}

pub fn key(code: KeyCode) -> Event {
    Event::Key(KeyEvent {
        code,
        modifiers: KeyModifiers::empty(),
        kind: KeyEventKind::Press,
        state: KeyEventState::empty(),
    })
}

pub fn key_char(c: char) -> Event {
    key(KeyCode::Char(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_events_replay_in_order_then_fall_back_to_quit() {
        let mut source = ScriptedEvents::from_chars("jk");
        assert!(source.poll(Duration::ZERO).unwrap());
        assert_eq!(source.read().unwrap(), key_char('j'));
        assert_eq!(source.read().unwrap(), key_char('k'));
        assert!(!source.poll(Duration::ZERO).unwrap());
        assert_eq!(source.read().unwrap(), key_char('q'));
    }

    #[test]
    fn push_appends_to_the_script() {
        let mut source = ScriptedEvents::new([]);
        source.push(key(KeyCode::Esc));
        assert_eq!(source.read().unwrap(), key(KeyCode::Esc));
    }
}
