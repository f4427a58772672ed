//! # Parley Terminal
//!
//! The interactive surface: a raw-mode line editor with `/` and `@`
//! completion, and the consoles the session engine writes through.

pub mod autocomplete;
pub mod console;
pub mod editor;
pub mod input;
pub mod keys;
pub mod render;
pub mod session;

pub use autocomplete::{Autocomplete, Candidate, CandidateSource, CompletionMode, WorkspaceCandidates};
pub use console::{PlainConsole, TerminalConsole};
pub use editor::{EditorAction, LineEditor};
pub use input::{LineSource, PlainInput, TerminalInput};
pub use keys::{Key, ReplyKey};
pub use render::Frame;
pub use session::TerminalSession;
