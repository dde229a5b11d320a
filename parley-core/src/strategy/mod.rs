//! Strategy layer for runtime-specific behaviours.
//!
//! Defines how a response contract is expressed to runtimes with different
//! JSON output capabilities (grammar-constrained schema vs plain JSON mode).

pub mod json_output;

pub use json_output::{
    detect_json_strategy, ConstrainedSchemaStrategy, JsonModeStrategy, JsonOutputStrategy,
};
