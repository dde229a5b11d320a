//! # Parley Runtimes
//!
//! Model runtime implementations.

pub mod config;
pub mod llama_server;

// Re-exports
pub use config::LlamaServerConfig;
pub use llama_server::{LlamaServerBuilder, LlamaServerRuntime};
