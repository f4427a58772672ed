//! Key events as the line editor sees them.

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// A keypress, reduced to what the editor reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Tab,
    Backspace,
    Esc,
    Up,
    Down,
    CtrlC,
    CtrlD,
    Other,
}

/// Reaction to a key pressed while a reply is streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKey {
    /// Stop the reply and stay in the session
    Stop,
    /// Leave the session
    Quit,
    Ignore,
}

impl Key {
    /// The key in a terminal event. Key releases, resizes and mouse events
    /// yield `None`.
    pub fn from_event(event: &Event) -> Option<Self> {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => Some(Self::from(*key)),
            _ => None,
        }
    }

    /// What this key means while a reply is streaming.
    pub fn during_reply(&self) -> ReplyKey {
        match self {
            Key::Esc => ReplyKey::Stop,
            Key::CtrlC => ReplyKey::Quit,
            _ => ReplyKey::Ignore,
        }
    }
}

impl From<KeyEvent> for Key {
    fn from(event: KeyEvent) -> Self {
        let ctrl = event.modifiers.contains(KeyModifiers::CONTROL);
        match event.code {
            KeyCode::Char('c') if ctrl => Key::CtrlC,
            KeyCode::Char('d') if ctrl => Key::CtrlD,
            KeyCode::Char(_) if ctrl => Key::Other,
            KeyCode::Char(c) => Key::Char(c),
            KeyCode::Enter => Key::Enter,
            KeyCode::Tab => Key::Tab,
            KeyCode::Backspace => Key::Backspace,
            KeyCode::Esc => Key::Esc,
            KeyCode::Up => Key::Up,
            KeyCode::Down => Key::Down,
            _ => Key::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> Event {
        Event::Key(KeyEvent::new(code, modifiers))
    }

    #[test]
    fn plain_and_control_chars() {
        assert_eq!(
            Key::from_event(&press(KeyCode::Char('a'), KeyModifiers::NONE)),
            Some(Key::Char('a'))
        );
        assert_eq!(
            Key::from_event(&press(KeyCode::Char('A'), KeyModifiers::SHIFT)),
            Some(Key::Char('A'))
        );
        assert_eq!(
            Key::from_event(&press(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Key::CtrlC)
        );
        assert_eq!(
            Key::from_event(&press(KeyCode::Char('d'), KeyModifiers::CONTROL)),
            Some(Key::CtrlD)
        );
        assert_eq!(
            Key::from_event(&press(KeyCode::Char('x'), KeyModifiers::CONTROL)),
            Some(Key::Other)
        );
    }

    #[test]
    fn releases_are_ignored() {
        let mut event = KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE);
        event.kind = KeyEventKind::Release;
        assert_eq!(Key::from_event(&Event::Key(event)), None);
        assert_eq!(Key::from_event(&Event::Resize(80, 24)), None);
    }

    #[test]
    fn keys_during_reply() {
        assert_eq!(Key::Esc.during_reply(), ReplyKey::Stop);
        assert_eq!(Key::CtrlC.during_reply(), ReplyKey::Quit);
        assert_eq!(Key::Enter.during_reply(), ReplyKey::Ignore);
        assert_eq!(Key::Char('q').during_reply(), ReplyKey::Ignore);
    }
}
