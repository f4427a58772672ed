//! Line editor state machine.
//!
//! [`LineEditor::handle`] consumes one key and reports what changed. It never
//! touches the terminal, so every transition is testable without a tty.

use crate::autocomplete::{Autocomplete, CandidateSource, CompletionMode};
use crate::keys::Key;

/// What the caller should do after a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorAction {
    /// Nothing changed
    None,
    /// Redraw the input line and the panel
    Redraw,
    /// Only the panel selection moved
    RedrawPanel,
    /// A line was entered
    Submit(String),
    /// Leave the session
    Exit,
}

pub struct LineEditor {
    buffer: String,
    panel: Option<Autocomplete>,
    source: Box<dyn CandidateSource>,
    recall: Vec<String>,
    recall_index: Option<usize>,
    draft: String,
}

impl LineEditor {
    pub fn new(source: Box<dyn CandidateSource>) -> Self {
        Self {
            buffer: String::new(),
            panel: None,
            source,
            recall: Vec::new(),
            recall_index: None,
            draft: String::new(),
        }
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// The open suggestion panel, if any.
    pub fn panel(&self) -> Option<&Autocomplete> {
        self.panel.as_ref()
    }

    pub fn is_suggesting(&self) -> bool {
        self.panel.is_some()
    }

    /// Previously submitted lines, oldest first.
    pub fn recall(&self) -> &[String] {
        &self.recall
    }

    pub fn handle(&mut self, key: Key) -> EditorAction {
        match key {
            Key::CtrlC => EditorAction::Exit,
            Key::CtrlD if self.buffer.is_empty() => EditorAction::Exit,
            Key::CtrlD => EditorAction::None,
            _ if self.panel.is_some() => self.handle_suggesting(key),
            _ => self.handle_editing(key),
        }
    }

    fn handle_editing(&mut self, key: Key) -> EditorAction {
        match key {
            Key::Char('/') if self.buffer.is_empty() => {
                self.buffer.push('/');
                self.open_panel(CompletionMode::Command, 0);
                EditorAction::Redraw
            }
            Key::Char('@') => {
                self.buffer.push('@');
                self.open_panel(CompletionMode::File, self.buffer.len());
                EditorAction::Redraw
            }
            Key::Char(c) => {
                self.buffer.push(c);
                self.recall_index = None;
                EditorAction::Redraw
            }
            Key::Backspace => match self.buffer.pop() {
                Some(_) => EditorAction::Redraw,
                None => EditorAction::None,
            },
            Key::Enter => self.submit(),
            Key::Up => self.recall_previous(),
            Key::Down => self.recall_next(),
            _ => EditorAction::None,
        }
    }

    fn handle_suggesting(&mut self, key: Key) -> EditorAction {
        let has_candidates = self.panel.as_ref().is_some_and(|p| !p.is_empty());

        match key {
            Key::Char('@') => {
                self.buffer.push('@');
                self.open_panel(CompletionMode::File, self.buffer.len());
                EditorAction::Redraw
            }
            Key::Char(c) => {
                self.buffer.push(c);
                self.refilter();
                EditorAction::Redraw
            }
            Key::Up | Key::Down if has_candidates => {
                if let Some(panel) = self.panel.as_mut() {
                    if key == Key::Up {
                        panel.up();
                    } else {
                        panel.down();
                    }
                }
                EditorAction::RedrawPanel
            }
            Key::Tab | Key::Enter if has_candidates => {
                self.commit();
                EditorAction::Redraw
            }
            Key::Enter => {
                self.panel = None;
                self.submit()
            }
            Key::Esc => {
                self.panel = None;
                EditorAction::Redraw
            }
            Key::Backspace => {
                self.buffer.pop();
                if self.trigger_removed() {
                    self.panel = None;
                } else {
                    self.refilter();
                }
                EditorAction::Redraw
            }
            _ => EditorAction::None,
        }
    }

    fn open_panel(&mut self, mode: CompletionMode, anchor: usize) {
        let candidates = self.source.candidates(mode);
        self.panel = Some(Autocomplete::open(mode, anchor, candidates));
        self.refilter();
    }

    /// Text typed since the trigger character.
    fn query(&self) -> &str {
        let start = match self.panel.as_ref().map(|p| p.mode) {
            Some(CompletionMode::File) => self.panel.as_ref().map_or(0, |p| p.anchor),
            Some(CompletionMode::Command) => 1,
            None => return "",
        };
        self.buffer.get(start..).unwrap_or("")
    }

    fn refilter(&mut self) {
        let query = self.query().to_string();
        if let Some(panel) = self.panel.as_mut() {
            panel.refilter(&query);
        }
    }

    fn trigger_removed(&self) -> bool {
        match self.panel.as_ref() {
            Some(p) if p.mode == CompletionMode::File => self.buffer.len() < p.anchor,
            Some(_) => self.buffer.is_empty(),
            None => false,
        }
    }

    /// Replace the text after the anchor with the selected candidate.
    fn commit(&mut self) {
        let Some(panel) = self.panel.take() else {
            return;
        };
        let Some(candidate) = panel.selected() else {
            return;
        };
        self.buffer.truncate(panel.anchor);
        self.buffer.push_str(&candidate.label);
        if panel.mode == CompletionMode::File {
            self.buffer.push(' ');
        }
    }

    fn submit(&mut self) -> EditorAction {
        let line = std::mem::take(&mut self.buffer);
        if !line.trim().is_empty() && self.recall.last() != Some(&line) {
            self.recall.push(line.clone());
        }
        self.recall_index = None;
        self.draft.clear();
        EditorAction::Submit(line)
    }

    fn recall_previous(&mut self) -> EditorAction {
        if self.recall.is_empty() {
            return EditorAction::None;
        }
        let index = match self.recall_index {
            None => {
                self.draft = self.buffer.clone();
                self.recall.len() - 1
            }
            Some(i) => i.saturating_sub(1),
        };
        self.recall_index = Some(index);
        self.buffer = self.recall[index].clone();
        EditorAction::Redraw
    }

    fn recall_next(&mut self) -> EditorAction {
        match self.recall_index {
            None => EditorAction::None,
            Some(i) if i + 1 < self.recall.len() => {
                self.recall_index = Some(i + 1);
                self.buffer = self.recall[i + 1].clone();
                EditorAction::Redraw
            }
            Some(_) => {
                self.recall_index = None;
                self.buffer = std::mem::take(&mut self.draft);
                EditorAction::Redraw
            }
        }
    }
}
