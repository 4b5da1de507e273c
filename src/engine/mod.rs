// src/engine/mod.rs

//! Execution engine for tokenflow.
//!
//! This module ties together:
//! - the priority command queue that serialises every state change
//! - the registry of live executions
//! - change tracking for external persistence (see [`sync`])
//! - fire-and-forget process notifications (see [`events`])
//!
//! The tree and transition algorithms operating on executions live in
//! [`crate::execution`] as further `impl Engine` blocks.

pub mod command;
pub mod core;
pub mod events;
pub mod queue;
pub mod sync;

pub use command::{Command, CommandCallback};
pub use core::Engine;
pub use events::{ProcessEvent, ProcessListener};
pub use queue::{CommandQueue, QueuedCommand};
pub use sync::{
    ExecutionSnapshot, JournalEntry, MemoryJournal, NoSync, SyncListener, SyncOp, SyncState,
};
