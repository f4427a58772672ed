//! Workspace collaborators for Parley: the shell runner behind `!command`
//! and the file reader behind `@file`.

pub mod files;
pub mod shell;

pub use files::LocalFiles;
pub use shell::ShellRunner;
