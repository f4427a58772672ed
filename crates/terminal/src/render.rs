//! Drawing the input line and the suggestion panel.

use std::io::{self, Write};

use crossterm::cursor::{MoveToColumn, MoveUp};
use crossterm::style::{Attribute, Print, SetAttribute};
use crossterm::terminal::{Clear, ClearType};
use crossterm::queue;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::autocomplete::PANEL_ROWS;
use crate::editor::LineEditor;

/// One screenful of editor state: the input line and the panel rows below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub line: String,
    pub rows: Vec<String>,
    /// Index into `rows` of the highlighted candidate
    pub selected_row: Option<usize>,
    /// Screen row of the cursor, counted from the first row of the input
    /// line once it has wrapped
    pub cursor_row: u16,
    /// Display column of the cursor on its row
    pub cursor_col: u16,
}

impl Frame {
    /// Lay out `editor` for a terminal `width` columns wide.
    pub fn build(prompt: &str, editor: &LineEditor, width: u16) -> Self {
        let line = format!("{prompt}{}", editor.buffer());
        let (cursor_row, cursor_col) = cursor_position(line.width(), width);

        let mut rows = Vec::new();
        let mut selected_row = None;
        if let Some(panel) = editor.panel() {
            let (start, window) = panel.window(PANEL_ROWS);
            for (i, candidate) in window.iter().enumerate() {
                let selected = start + i == panel.selected_index();
                if selected {
                    selected_row = Some(i);
                }
                let marker = if selected { '>' } else { ' ' };
                let row = if candidate.description.is_empty() {
                    format!("{marker} {}", candidate.label)
                } else {
                    format!("{marker} {}  {}", candidate.label, candidate.description)
                };
                rows.push(fit_width(&row, usize::from(width.saturating_sub(1))));
            }
        }

        Self {
            line,
            rows,
            selected_row,
            cursor_row,
            cursor_col,
        }
    }

    /// The input line as it stood when `line` was submitted.
    pub fn submitted(prompt: &str, line: &str) -> Self {
        Self {
            line: format!("{prompt}{line}"),
            rows: Vec::new(),
            selected_row: None,
            cursor_row: 0,
            cursor_col: 0,
        }
    }

    /// Redraw in place. `from_row` is the row the cursor sits on now,
    /// relative to the first row of the input line (the previous frame's
    /// `cursor_row`). The cursor is left at `(cursor_row, cursor_col)`.
    pub fn draw(&self, out: &mut impl Write, from_row: u16) -> io::Result<()> {
        if from_row > 0 {
            queue!(out, MoveUp(from_row))?;
        }
        queue!(
            out,
            MoveToColumn(0),
            Clear(ClearType::FromCursorDown),
            Print(&self.line)
        )?;
        if self.cursor_col == 0 && self.cursor_row > 0 {
            // The line filled its last row exactly; start the caret's row.
            queue!(out, Print("\r\n"))?;
        }
        self.draw_rows(out)
    }

    /// Redraw only the panel below an input line that is already on screen
    /// with the cursor at its end.
    pub fn draw_panel(&self, out: &mut impl Write) -> io::Result<()> {
        queue!(out, Clear(ClearType::FromCursorDown))?;
        self.draw_rows(out)
    }

    fn draw_rows(&self, out: &mut impl Write) -> io::Result<()> {
        for (i, row) in self.rows.iter().enumerate() {
            queue!(out, Print("\r\n"))?;
            if self.selected_row == Some(i) {
                queue!(
                    out,
                    SetAttribute(Attribute::Reverse),
                    Print(row),
                    SetAttribute(Attribute::Reset)
                )?;
            } else {
                queue!(out, Print(row))?;
            }
        }
        if !self.rows.is_empty() {
            queue!(out, MoveUp(u16::try_from(self.rows.len()).unwrap_or(u16::MAX)))?;
        }
        queue!(out, MoveToColumn(self.cursor_col))?;
        out.flush()
    }

    /// Redraw the input line without the panel and move to a fresh line.
    /// `from_row` is as for [`Frame::draw`].
    pub fn finish(&self, out: &mut impl Write, from_row: u16) -> io::Result<()> {
        if from_row > 0 {
            queue!(out, MoveUp(from_row))?;
        }
        queue!(
            out,
            MoveToColumn(0),
            Clear(ClearType::FromCursorDown),
            Print(&self.line),
            Print("\r\n")
        )?;
        out.flush()
    }
}

/// Row and column of the cell after `text_width` columns of text that
/// soft-wraps every `width` columns.
fn cursor_position(text_width: usize, width: u16) -> (u16, u16) {
    let width = usize::from(width.max(1));
    let row = u16::try_from(text_width / width).unwrap_or(u16::MAX);
    let col = u16::try_from(text_width % width).unwrap_or(0);
    (row, col)
}

/// Cut `text` to at most `max` display columns.
fn fit_width(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }
    let mut used = 0;
    let mut out = String::new();
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > max {
            break;
        }
        used += w;
        out.push(c);
    }
    out
}
