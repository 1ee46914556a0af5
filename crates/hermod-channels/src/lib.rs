//! Chat transports for Hermod.
//!
//! - **base**: the `Channel` trait and the `ChannelInbox` every transport
//!   uses to gate and publish inbound events
//! - **manager**: lifecycle orchestration wired to the bus dispatcher
//!
//! Concrete transports are feature-gated; `whatsapp` ships a WebSocket
//! client for a local bridge process.

pub mod base;
pub mod manager;

#[cfg(feature = "whatsapp")]
pub mod whatsapp;

pub use base::{Channel, ChannelInbox};
pub use manager::ChannelManager;
