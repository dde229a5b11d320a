//! Completion gateway.
//!
//! This module provides the entry point that sits between a transport's
//! requests and the model runtime. The gateway is responsible for:
//! - Assembling conversations and resolving response contracts per mode
//! - Applying the JSON output strategy that fits the runtime
//! - Turning runtime failures into renderable completions
//! - Translating raw delta streams into client events

pub mod executor;
pub mod request;

pub use executor::{
    ChatEventStream, Completion, CompletionGateway, CompletionGatewayBuilder, GatewayDefaults,
    STORY_MAX_TOKENS,
};
pub use request::{ChatRequest, StoryRequest, SuggestionRequest};
