//! [`Console`] implementations for a raw-mode terminal and for plain pipes.

use std::io::{self, Stdout, Write};
use std::time::Duration;

use async_trait::async_trait;
use crossterm::event;
use crossterm::queue;
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use parley_core::CancellationToken;
use parley_engine::{Console, InterruptWatch};
use tracing::debug;

use crate::input::next_key;
use crate::keys::{Key, ReplyKey};

const INTERRUPT_POLL: Duration = Duration::from_millis(50);

/// Raw mode does no newline translation.
fn raw_lines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\n', "\r\n")
}

/// Apply a key pressed while a reply streams. Returns `true` once the
/// watcher has fired and should stop.
fn react_during_reply(key: Key, cancel: &CancellationToken, quit: &CancellationToken) -> bool {
    match key.during_reply() {
        ReplyKey::Stop => {
            debug!("Reply interrupted");
            cancel.cancel();
            true
        }
        ReplyKey::Quit => {
            debug!("Quit during reply");
            quit.cancel();
            cancel.cancel();
            true
        }
        ReplyKey::Ignore => false,
    }
}

/// Console for an interactive terminal in raw mode.
///
/// Esc stops a streaming reply. Ctrl+C, which raw mode delivers as a key
/// rather than a signal, asks the session to end.
pub struct TerminalConsole {
    out: Stdout,
    quit: CancellationToken,
}

impl TerminalConsole {
    pub fn new() -> Self {
        Self {
            out: io::stdout(),
            quit: CancellationToken::new(),
        }
    }

    fn write_colored(&mut self, color: Option<Color>, text: &str) {
        let text = raw_lines(text);
        let result = match color {
            Some(color) => queue!(
                self.out,
                SetForegroundColor(color),
                Print(text),
                ResetColor,
                Print("\r\n")
            ),
            None => queue!(self.out, Print(text), Print("\r\n")),
        };
        if let Err(e) = result.and_then(|_| self.out.flush()) {
            debug!(error = %e, "Terminal write failed");
        }
    }
}

impl Default for TerminalConsole {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Console for TerminalConsole {
    fn print_chunk(&mut self, text: &str) {
        let _ = write!(self.out, "{}", raw_lines(text));
        let _ = self.out.flush();
    }

    fn finish_stream(&mut self) {
        let _ = write!(self.out, "\r\n");
        let _ = self.out.flush();
    }

    fn info(&mut self, message: &str) {
        self.write_colored(None, message);
    }

    fn error(&mut self, message: &str) {
        self.write_colored(Some(Color::Red), message);
    }

    async fn confirm(&mut self, prompt: &str) -> bool {
        let _ = queue!(
            self.out,
            SetForegroundColor(Color::Yellow),
            Print(format!("{prompt} [y/N] ")),
            ResetColor
        );
        let _ = self.out.flush();

        let key = next_key().await;
        if matches!(key, Ok(Key::CtrlC)) {
            self.quit.cancel();
        }
        let answer = matches!(key, Ok(Key::Char('y' | 'Y')));
        let _ = write!(self.out, "{}\r\n", if answer { "yes" } else { "no" });
        let _ = self.out.flush();
        answer
    }

    fn watch_interrupt(&mut self, cancel: CancellationToken) -> InterruptWatch {
        let stop = CancellationToken::new();
        let stopped = stop.clone();
        let quit = self.quit.clone();
        let handle = tokio::task::spawn_blocking(move || {
            while !stopped.is_cancelled() {
                match event::poll(INTERRUPT_POLL) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(_) => return,
                }
                match event::read() {
                    Ok(ev) => {
                        if let Some(key) = Key::from_event(&ev)
                            && react_during_reply(key, &cancel, &quit)
                        {
                            return;
                        }
                    }
                    Err(_) => return,
                }
            }
        });
        InterruptWatch::new(stop, handle)
    }

    fn quit_requested(&self) -> bool {
        self.quit.is_cancelled()
    }
}

/// Console for non-interactive use. Confirmations are always declined.
#[derive(Debug, Default)]
pub struct PlainConsole;

#[async_trait]
impl Console for PlainConsole {
    fn print_chunk(&mut self, text: &str) {
        let mut out = io::stdout();
        let _ = write!(out, "{text}");
        let _ = out.flush();
    }

    fn finish_stream(&mut self) {
        println!();
    }

    fn info(&mut self, message: &str) {
        println!("{message}");
    }

    fn error(&mut self, message: &str) {
        eprintln!("{message}");
    }

    async fn confirm(&mut self, prompt: &str) -> bool {
        eprintln!("{prompt} [y/N] no (not a terminal)");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newlines_become_crlf() {
        assert_eq!(raw_lines("a\nb"), "a\r\nb");
        assert_eq!(raw_lines("a\r\nb\n"), "a\r\nb\r\n");
        assert_eq!(raw_lines("plain"), "plain");
    }

    #[test]
    fn esc_stops_the_reply_only() {
        let cancel = CancellationToken::new();
        let quit = CancellationToken::new();
        assert!(react_during_reply(Key::Esc, &cancel, &quit));
        assert!(cancel.is_cancelled());
        assert!(!quit.is_cancelled());
    }

    #[test]
    fn ctrl_c_during_reply_quits() {
        let cancel = CancellationToken::new();
        let quit = CancellationToken::new();
        assert!(react_during_reply(Key::CtrlC, &cancel, &quit));
        assert!(cancel.is_cancelled());
        assert!(quit.is_cancelled());
    }

    #[test]
    fn other_keys_are_swallowed() {
        let cancel = CancellationToken::new();
        let quit = CancellationToken::new();
        assert!(!react_during_reply(Key::Char('x'), &cancel, &quit));
        assert!(!react_during_reply(Key::Enter, &cancel, &quit));
        assert!(!cancel.is_cancelled());
        assert!(!quit.is_cancelled());
    }

    #[test]
    fn fresh_console_has_no_quit_request() {
        assert!(!TerminalConsole::new().quit_requested());
        assert!(!PlainConsole.quit_requested());
    }

    #[tokio::test]
    async fn plain_console_declines_confirmation() {
        let mut console = PlainConsole;
        assert!(!console.confirm("Run it?").await);
    }
}
