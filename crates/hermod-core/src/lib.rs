//! Hermod core: the shared foundation of the runtime.
//!
//! - **bus**: the in-process message bus connecting channels and the agent loop
//! - **types**: chat message / tool-call value types in the chat-completions layout
//! - **session**: per-conversation history with JSONL persistence
//! - **config**: typed configuration with camelCase JSON on disk
//! - **heartbeat**: the periodic wake-up service

pub mod bus;
pub mod config;
pub mod heartbeat;
pub mod session;
pub mod types;
pub mod utils;

/// Reserved channel name for internally-originated turns (subagent results,
/// scheduled triggers, heartbeats).
pub const SYSTEM_CHANNEL: &str = "system";

/// Reserved channel name for direct / stdin interaction.
pub const CLI_CHANNEL: &str = "cli";
