//! Session persistence backends for Parley.
//!
//! All backends implement `parley_core::SessionStore`:
//! - [`FileSessionStore`]: one JSON document per session on disk
//! - [`InMemorySessionStore`]: ephemeral, used by tests

pub mod file;
pub mod in_memory;

pub use file::FileSessionStore;
pub use in_memory::InMemorySessionStore;
