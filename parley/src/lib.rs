//! # Parley
//!
//! Conversation orchestration for a language model hosted on the local
//! machine behind llama.cpp's server.
//!
//! Parley turns a user's text, an optional system instruction and prior turns
//! into a well-formed conversation, attaches the response contract for the
//! interaction mode, and hands it to the model. Answers come back either as a
//! single completion or as a stream of turn events with the model's control
//! markers stripped out.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! parley = { version = "0.1", features = ["llama", "layers"] }
//! ```
//!
//! ```ignore
//! use parley::prelude::*;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let runtime = LlamaServerRuntime::builder()
//!     .model_path("./Meta-Llama-3-8B-Instruct.Q2_K.gguf")
//!     .build()?;
//!
//! let gateway = CompletionGateway::builder(runtime)
//!     .layer(QueueLayer::new())
//!     .layer(LoggingLayer::new())
//!     .finish();
//!
//! let completion = gateway
//!     .suggest(SuggestionRequest::new("Something like Alien, but funnier"))
//!     .await?;
//! println!("{}", completion.text());
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `default`: `llama` and `layers`
//! - `llama`: llama.cpp server runtime
//! - `layers`: Built-in layers (logging, admission queue)
//! - `schema`: Re-export of `schemars` for deriving response schemas
//! - `full`: All features enabled

// Re-export core types and traits
pub use parley_core::*;

// Re-export runtimes under `runtime` module
#[cfg(feature = "parley-runtime")]
pub mod runtime {
    //! Model runtime implementations.
    pub use parley_runtime::*;
}

// Re-export layers under `layer` module
#[cfg(feature = "parley-layer")]
pub mod layer {
    //! Built-in runtime layers.
    pub use parley_core::layer::*;
    pub use parley_layer::*;
}

// Re-export schemars when schema feature is enabled
#[cfg(feature = "schema")]
pub mod schemars {
    pub use ::schemars::*;
}

/// Prelude module for convenient imports
pub mod prelude {
    //! Prelude module containing the most commonly used types and traits.
    //!
    //! ```
    //! use parley::prelude::*;
    //! ```

    pub use crate::{
        collect_text, ChatRequest, Completion, CompletionGateway, Layer, MarkerVocabulary,
        Message, Mode, ModelRuntime, ParleyError, ResponseSchema, Result, Role, StoryRequest,
        StreamEvent, SuggestionRequest, Turn,
    };

    #[cfg(feature = "parley-runtime")]
    pub use crate::runtime::*;

    #[cfg(feature = "parley-layer")]
    pub use parley_layer::*;
}
