//! # Parley Core
//!
//! Conversation orchestration over a locally hosted language model.
//!
//! This crate provides the message assembler, per-mode response contracts,
//! the stream translator and the completion gateway, together with the
//! runtime trait a model backend implements and the layer abstraction for
//! wrapping it.

pub mod assembler;
pub mod error;
pub mod gateway;
pub mod layer;
pub mod model;
pub mod schema;
pub mod strategy;
pub mod translate;
pub mod types;

#[cfg(test)]
mod testing;

// Re-exports
pub use assembler::{default_system_text, story_priming, truncate_history, MessageAssembler};
pub use error::ParleyError;
pub use gateway::{
    ChatEventStream, ChatRequest, Completion, CompletionGateway, GatewayDefaults, StoryRequest,
    SuggestionRequest, STORY_MAX_TOKENS,
};
pub use layer::{Layer, LayeredRuntime};
pub use model::{collect_text, ChatCompletionStream, ModelRuntime};
pub use strategy::{ConstrainedSchemaStrategy, JsonModeStrategy, JsonOutputStrategy};
pub use translate::{translate, MarkerVocabulary, StreamTranslator, TurnState};
pub use types::*;

/// Result type alias for Parley operations
pub type Result<T> = std::result::Result<T, ParleyError>;
