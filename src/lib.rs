//! cdo - Command-driven task tracking library
//!
//! This library provides the core functionality for the cdo CLI tool: a
//! personal task tracker driven entirely by free-text commands, with
//! recurring tasks, LIFO undo, and flat-file persistence.
//!
//! # Core Concepts
//!
//! - **Tasks**: floating, deadline, or event, classified by their schedule
//! - **Vaults**: file-backed stores for active, trashed, completed, and
//!   history tasks
//! - **Identity Bank**: stable `@base36` ids that survive edits and renames
//! - **Recurrence**: lazy catch-up scheduling, one occurrence at a time
//! - **Undo**: a stack of operation tags replayed in reverse
//!
//! # Module Organization
//!
//! - `engine`: the command interpreter owning all mutable state
//! - `parse`: free-text command grammar and date/time token scanning
//! - `task`: the task model and recurrence descriptor
//! - `vault`: persistent task stores and the record format
//! - `id_bank`: id generation, release, and rebinding
//! - `recurrence`: the catch-up scheduler
//! - `undo`: inverse replay of mutating commands
//! - `error`: error types and result aliases

pub mod engine;
pub mod error;
pub mod id_bank;
pub mod parse;
pub mod recurrence;
pub mod task;
pub mod undo;
pub mod vault;

pub use engine::Engine;
pub use error::{Error, Result};
