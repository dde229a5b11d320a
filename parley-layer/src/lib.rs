//! # Parley Layers
//!
//! Built-in layers for model runtimes.
//!
//! Currently implemented layers:
//! - `LoggingLayer`: Logs every runtime call with timing information
//! - `QueueLayer`: Bounds in-flight calls, queueing or rejecting the rest
//!
//! Failed calls are never resent: a failure surfaces as a failure payload
//! to the caller.
//!
//! ## Usage
//!
//! ```ignore
//! use parley_core::CompletionGateway;
//! use parley_layer::{LoggingLayer, Overflow, QueueLayer};
//!
//! let gateway = CompletionGateway::builder(runtime)
//!     .layer(QueueLayer::new().with_overflow(Overflow::Wait))
//!     .layer(LoggingLayer::new())
//!     .finish();
//! ```

pub mod logging;
pub mod queue;

// Re-exports
pub use logging::LoggingLayer;
pub use queue::{Overflow, QueueLayer};
