//! # Parley Engine
//!
//! The interactive session engine: classifies each submitted line, keeps
//! the context and the bounded history, and drives the model provider.
//! Rendering is left to a [`Console`] implementation.

pub mod commands;
pub mod console;
pub mod context;
pub mod history;
pub mod input;
pub mod orchestrator;

pub use commands::{CommandError, CommandInfo, SlashCommand, COMMANDS};
pub use console::{Console, InterruptWatch};
pub use context::{ContextAggregator, ContextItem};
pub use history::{optimize, HistoryLimits};
pub use input::{classify, extract_file_refs, ParsedInput};
pub use orchestrator::{Collaborators, Flow, Orchestrator, Reply, SessionSettings};
