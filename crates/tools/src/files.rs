//! Local file access for `@file` references and path completion.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parley_core::error::ToolError;
use parley_core::workspace::{FileContent, FileSource, IGNORED_DIRS};
use tracing::debug;

const TOOL_NAME: &str = "file";

/// Files larger than this are refused rather than loaded into context.
pub const MAX_FILE_BYTES: u64 = 5 * 1024 * 1024;

/// Reads files relative to a root directory (normally the working directory).
pub struct LocalFiles {
    root: PathBuf,
}

impl LocalFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Rooted at the process working directory.
    pub fn current_dir() -> Self {
        Self::new(std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let expanded = match path.strip_prefix("~/") {
            Some(rest) => parley_config::dirs_home().join(rest),
            None => PathBuf::from(path),
        };
        // Absolute paths replace the root when joined.
        self.root.join(expanded)
    }
}

fn failed(path: &str, reason: impl std::fmt::Display) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: TOOL_NAME.into(),
        reason: format!("{path}: {reason}"),
    }
}

#[async_trait]
impl FileSource for LocalFiles {
    async fn read(&self, path: &str) -> Result<FileContent, ToolError> {
        let full = self.resolve(path);
        debug!(path = %full.display(), "Reading file");

        let meta = tokio::fs::metadata(&full).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => ToolError::NotFound(path.to_string()),
            ErrorKind::PermissionDenied => ToolError::PermissionDenied {
                tool_name: TOOL_NAME.into(),
                reason: path.to_string(),
            },
            _ => failed(path, e),
        })?;

        if meta.is_dir() {
            return Err(failed(path, "is a directory"));
        }
        if meta.len() > MAX_FILE_BYTES {
            return Err(failed(
                path,
                format!("file is {} bytes (limit {MAX_FILE_BYTES})", meta.len()),
            ));
        }

        let bytes = tokio::fs::read(&full).await.map_err(|e| failed(path, e))?;
        let size = bytes.len();
        let content = String::from_utf8(bytes).map_err(|_| failed(path, "not a UTF-8 text file"))?;

        Ok(FileContent {
            path: path.to_string(),
            content,
            size,
        })
    }

    fn list(&self, dir: &str) -> Vec<String> {
        let full = if dir.is_empty() { self.root.clone() } else { self.resolve(dir) };
        let Ok(entries) = std::fs::read_dir(&full) else {
            return Vec::new();
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.starts_with('.') || IGNORED_DIRS.contains(&name.as_str()) {
                    return None;
                }
                let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                Some(if is_dir { format!("{name}/") } else { name })
            })
            .collect();
        names.sort();
        names
    }
}
