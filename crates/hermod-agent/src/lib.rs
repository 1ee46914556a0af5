//! The Hermod agent engine.
//!
//! - **tools**: the `Tool` trait, argument validation, the registry, and
//!   the built-in tool set
//! - **context**: system prompt and message-list assembly
//! - **memory** / **skills**: the workspace-backed knowledge the context
//!   builder draws from
//! - **subagent**: detached background reasoning tasks
//! - **agent_loop**: the orchestrator tying it all to the bus

pub mod agent_loop;
pub mod context;
pub mod memory;
pub mod skills;
pub mod subagent;
pub mod tools;

pub use agent_loop::{AgentLoop, AgentSettings};
pub use context::ContextBuilder;
pub use memory::MemoryStore;
pub use skills::SkillsLoader;
pub use subagent::SubagentManager;
pub use tools::{Tool, ToolRegistry};
