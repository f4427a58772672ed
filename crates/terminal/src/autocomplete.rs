//! Suggestion panel state for `/command` and `@file` completion.

use std::sync::Arc;

use parley_core::workspace::FileSource;
use parley_engine::COMMANDS;

/// Rows shown at once in the suggestion panel.
pub const PANEL_ROWS: usize = 8;

/// What the panel is completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionMode {
    Command,
    File,
}

/// One entry in the panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Text inserted on commit
    pub label: String,
    pub description: String,
}

impl Candidate {
    pub fn new(label: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            description: description.into(),
        }
    }
}

/// Supplies the candidate lists the panel filters.
pub trait CandidateSource: Send {
    fn candidates(&self, mode: CompletionMode) -> Vec<Candidate>;
}

/// Slash commands from the command catalog, files from the current directory.
pub struct WorkspaceCandidates {
    files: Arc<dyn FileSource>,
}

impl WorkspaceCandidates {
    pub fn new(files: Arc<dyn FileSource>) -> Self {
        Self { files }
    }
}

impl CandidateSource for WorkspaceCandidates {
    fn candidates(&self, mode: CompletionMode) -> Vec<Candidate> {
        match mode {
            CompletionMode::Command => COMMANDS
                .iter()
                .map(|c| Candidate::new(format!("/{}", c.name), c.description))
                .collect(),
            CompletionMode::File => self
                .files
                .list(".")
                .into_iter()
                .map(|entry| {
                    let kind = if entry.ends_with('/') { "dir" } else { "file" };
                    Candidate::new(entry, kind)
                })
                .collect(),
        }
    }
}

/// An open suggestion panel.
#[derive(Debug, Clone)]
pub struct Autocomplete {
    pub mode: CompletionMode,
    /// Byte offset in the buffer where the completed text starts
    pub anchor: usize,
    all: Vec<Candidate>,
    filtered: Vec<Candidate>,
    selected: usize,
}

impl Autocomplete {
    pub fn open(mode: CompletionMode, anchor: usize, all: Vec<Candidate>) -> Self {
        let filtered = all.clone();
        Self {
            mode,
            anchor,
            all,
            filtered,
            selected: 0,
        }
    }

    /// Keep the candidates whose label contains `query`, ignoring case.
    /// Resets the selection.
    pub fn refilter(&mut self, query: &str) {
        let query = query.to_lowercase();
        self.filtered = self
            .all
            .iter()
            .filter(|c| c.label.to_lowercase().contains(&query))
            .cloned()
            .collect();
        self.selected = 0;
    }

    pub fn up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn down(&mut self) {
        if self.selected + 1 < self.filtered.len() {
            self.selected += 1;
        }
    }

    pub fn selected(&self) -> Option<&Candidate> {
        self.filtered.get(self.selected)
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.filtered
    }

    pub fn is_empty(&self) -> bool {
        self.filtered.is_empty()
    }

    /// The slice of at most `rows` candidates to display, kept around the
    /// selection, with the index of its first entry.
    pub fn window(&self, rows: usize) -> (usize, &[Candidate]) {
        let total = self.filtered.len();
        let show = total.min(rows);
        let start = if self.selected < show {
            0
        } else {
            (self.selected + 1 - show).min(total - show)
        };
        (start, &self.filtered[start..start + show])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(names: &[&str]) -> Vec<Candidate> {
        names.iter().map(|n| Candidate::new(*n, "file")).collect()
    }

    #[test]
    fn filter_is_case_insensitive_contains() {
        let mut ac = Autocomplete::open(
            CompletionMode::File,
            1,
            files(&["README.md", "src/", "Cargo.toml"]),
        );
        ac.refilter("read");
        assert_eq!(ac.candidates().len(), 1);
        assert_eq!(ac.selected().unwrap().label, "README.md");

        ac.refilter("R");
        let labels: Vec<_> = ac.candidates().iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["README.md", "src/", "Cargo.toml"]);
    }

    #[test]
    fn selection_is_clamped() {
        let mut ac = Autocomplete::open(CompletionMode::File, 1, files(&["a", "b", "c"]));
        ac.up();
        assert_eq!(ac.selected_index(), 0);
        ac.down();
        ac.down();
        ac.down();
        assert_eq!(ac.selected_index(), 2);
    }

    #[test]
    fn refilter_resets_selection_and_may_empty() {
        let mut ac = Autocomplete::open(CompletionMode::File, 1, files(&["a", "b"]));
        ac.down();
        ac.refilter("zzz");
        assert!(ac.is_empty());
        assert!(ac.selected().is_none());
        assert_eq!(ac.window(PANEL_ROWS).1.len(), 0);
    }

    #[test]
    fn window_follows_selection() {
        let names: Vec<String> = (0..20).map(|i| format!("f{i:02}")).collect();
        let all = names.iter().map(|n| Candidate::new(n.clone(), "")).collect();
        let mut ac = Autocomplete::open(CompletionMode::File, 1, all);

        let (start, rows) = ac.window(PANEL_ROWS);
        assert_eq!((start, rows.len()), (0, PANEL_ROWS));

        for _ in 0..10 {
            ac.down();
        }
        let (start, rows) = ac.window(PANEL_ROWS);
        assert_eq!(start, 3);
        assert_eq!(rows.last().unwrap().label, "f10");

        for _ in 0..20 {
            ac.down();
        }
        let (start, rows) = ac.window(PANEL_ROWS);
        assert_eq!(start, 12);
        assert_eq!(rows.last().unwrap().label, "f19");
    }

    #[test]
    fn command_candidates_come_from_catalog() {
        struct NoFiles;
        #[async_trait::async_trait]
        impl FileSource for NoFiles {
            async fn read(
                &self,
                path: &str,
            ) -> Result<parley_core::workspace::FileContent, parley_core::error::ToolError> {
                Err(parley_core::error::ToolError::NotFound(path.into()))
            }
            fn list(&self, _dir: &str) -> Vec<String> {
                vec!["notes/".into(), "todo.txt".into()]
            }
        }

        let source = WorkspaceCandidates::new(Arc::new(NoFiles));
        let commands = source.candidates(CompletionMode::Command);
        assert!(commands.iter().any(|c| c.label == "/help"));
        assert!(commands.iter().any(|c| c.label == "/exit"));

        let files = source.candidates(CompletionMode::File);
        assert_eq!(files[0], Candidate::new("notes/", "dir"));
        assert_eq!(files[1], Candidate::new("todo.txt", "file"));
    }
}
