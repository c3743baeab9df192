// Discord layer - commands, event adapters and the platform executor.

#[path = "commands/command_catalog.rs"]
pub mod commands;

#[path = "guard/mod.rs"]
pub mod guard;

// Re-export shared framework types for convenience
pub use commands::{Data, Error};
