//! Cross-cutting utilities: external command execution and progress output.

pub mod command;
pub mod progress;

pub use command::{ToolCommand, ToolOutput};
