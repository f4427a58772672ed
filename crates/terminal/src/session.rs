//! Raw-mode terminal ownership.

use std::io;
use std::sync::Once;

use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tracing::debug;

static PANIC_HOOK: Once = Once::new();

/// Holds the terminal in raw mode for its lifetime.
///
/// Raw mode and cursor visibility are restored on drop. A panic hook does
/// the same, since release builds abort on panic without unwinding.
pub struct TerminalSession {
    _private: (),
}

impl TerminalSession {
    pub fn enter() -> io::Result<Self> {
        PANIC_HOOK.call_once(|| {
            let previous = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                restore();
                previous(info);
            }));
        });

        enable_raw_mode()?;
        debug!("Entered raw mode");
        Ok(Self { _private: () })
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        restore();
        debug!("Left raw mode");
    }
}

fn restore() {
    let _ = disable_raw_mode();
    let _ = crossterm::execute!(io::stdout(), crossterm::cursor::Show);
}
