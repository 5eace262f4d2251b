//! CLI commands

mod completions;
mod stores;
mod verbs;

pub use completions::CompletionsCommand;
pub use verbs::{InsertCommand, PublishCommand, SignCommand, StatusCommand, UpdateCommand};
