//! Workspace collaborators: file access and shell execution.
//!
//! The session engine never touches the filesystem or spawns processes
//! itself; it goes through these traits so tests can substitute fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// Directory names never offered for completion (dependency caches, VCS).
pub const IGNORED_DIRS: &[&str] = &["node_modules", "target", "__pycache__", "vendor"];

/// Contents of a file read from the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    /// Path as requested
    pub path: String,
    pub content: String,
    /// Size in bytes
    pub size: usize,
}

/// Read access to the working directory.
#[async_trait]
pub trait FileSource: Send + Sync {
    /// Read a text file. A missing file is `ToolError::NotFound`.
    async fn read(&self, path: &str) -> Result<FileContent, ToolError>;

    /// Entry names in `dir`, sorted, excluding dotfiles and [`IGNORED_DIRS`].
    /// Directories carry a trailing `/`.
    fn list(&self, dir: &str) -> Vec<String>;
}

/// Captured result of a finished shell command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Exit code, `None` if terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Combined human-readable output, as shown to the user and the model.
    pub fn combined(&self) -> String {
        let stdout = self.stdout.trim_end();
        let stderr = self.stderr.trim_end();
        let mut text = String::new();
        if !self.success() {
            match self.exit_code {
                Some(code) => text.push_str(&format!("[exit code: {code}]\n")),
                None => text.push_str("[terminated by signal]\n"),
            }
        }
        text.push_str(stdout);
        if !stderr.is_empty() {
            if !stdout.is_empty() {
                text.push('\n');
            }
            text.push_str("[stderr]: ");
            text.push_str(stderr);
        }
        text
    }
}

/// Runs shell commands. Safety gating happens before this is called.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str) -> Result<CommandOutput, ToolError>;
}
