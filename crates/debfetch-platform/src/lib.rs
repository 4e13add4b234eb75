//! Process plumbing for debfetch.
//!
//! Commands are always built as argument lists and spawned directly; a
//! [`Pipeline`] chains them stdout-to-stdin without a shell in between.

pub use command::Command;
pub use env::EnvOverrides;
pub use error::{Error, Result};
pub use pipeline::{Pipeline, StageOutcome};

pub mod command;
pub mod env;
mod error;
pub mod pipeline;
