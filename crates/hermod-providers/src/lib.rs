//! The LLM provider layer.
//!
//! - [`traits::LlmProvider`]: the one-call abstraction the agent loop uses
//! - [`registry`]: static provider specs and model-name matching
//! - [`http::HttpProvider`]: a generic client for OpenAI-compatible APIs

pub mod http;
pub mod registry;
pub mod traits;

pub use http::{create_provider, HttpProvider};
pub use registry::{ProviderSpec, PROVIDERS};
pub use traits::{LlmProvider, RequestConfig};
