//! Line sources for the session loop: the raw-mode editor or plain stdin.

use std::io::{self, Write};

use async_trait::async_trait;
use crossterm::event;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::editor::{EditorAction, LineEditor};
use crate::keys::Key;
use crate::render::Frame;

/// Where submitted lines come from.
#[async_trait]
pub trait LineSource: Send {
    /// The next line, or `None` when the user leaves.
    async fn read_line(&mut self) -> io::Result<Option<String>>;
}

/// Block until a key is pressed.
pub fn read_key() -> io::Result<Key> {
    loop {
        if let Some(key) = Key::from_event(&event::read()?) {
            return Ok(key);
        }
    }
}

/// [`read_key`] off the async runtime.
pub async fn next_key() -> io::Result<Key> {
    tokio::task::spawn_blocking(read_key)
        .await
        .map_err(io::Error::other)?
}

/// Interactive input through the [`LineEditor`]. Requires raw mode.
pub struct TerminalInput {
    editor: LineEditor,
    prompt: String,
    /// Row of the cursor within the drawn input line
    cursor_row: u16,
}

impl TerminalInput {
    pub fn new(editor: LineEditor, prompt: impl Into<String>) -> Self {
        Self {
            editor,
            prompt: prompt.into(),
            cursor_row: 0,
        }
    }

    fn frame(&self) -> Frame {
        let (width, _) = crossterm::terminal::size().unwrap_or((80, 24));
        Frame::build(&self.prompt, &self.editor, width)
    }

    fn redraw(&mut self, out: &mut impl Write) -> io::Result<()> {
        let frame = self.frame();
        frame.draw(out, self.cursor_row)?;
        self.cursor_row = frame.cursor_row;
        Ok(())
    }

    fn finish(&mut self, line: &str, out: &mut impl Write) -> io::Result<()> {
        Frame::submitted(&self.prompt, line).finish(out, self.cursor_row)?;
        self.cursor_row = 0;
        Ok(())
    }
}

#[async_trait]
impl LineSource for TerminalInput {
    async fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut out = io::stdout();
        self.cursor_row = 0;
        self.redraw(&mut out)?;

        loop {
            let key = next_key().await?;
            match self.editor.handle(key) {
                EditorAction::None => {}
                EditorAction::Redraw => self.redraw(&mut out)?,
                EditorAction::RedrawPanel => self.frame().draw_panel(&mut out)?,
                EditorAction::Submit(line) => {
                    self.finish(&line, &mut out)?;
                    return Ok(Some(line));
                }
                EditorAction::Exit => {
                    let line = self.editor.buffer().to_string();
                    self.finish(&line, &mut out)?;
                    return Ok(None);
                }
            }
        }
    }
}

/// Line-at-a-time stdin, for pipes and redirected input.
pub struct PlainInput {
    lines: Lines<BufReader<Stdin>>,
}

impl PlainInput {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for PlainInput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LineSource for PlainInput {
    async fn read_line(&mut self) -> io::Result<Option<String>> {
        self.lines.next_line().await
    }
}
