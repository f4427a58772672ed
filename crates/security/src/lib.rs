//! Command safety gate for Parley.
//!
//! Every `!command` the user types passes through [`CommandPolicy::classify`]
//! before anything is spawned.

pub mod command;

pub use command::{classify, CommandPolicy, CommandRule, CommandVerdict, PolicyError};
