//! Default response contracts per interaction mode.
//!
//! Every default is built fresh by a factory function, so a caller mutating
//! a resolved schema can never leak into the next request.

use crate::types::{Mode, ResponseSchema};
use serde_json::json;

/// Number of movies a suggestion must contain, no more and no fewer.
pub const SUGGESTED_MOVIES: u64 = 3;

/// Contract for suggestion mode: a short reply plus exactly three movie titles.
pub fn suggestion_schema() -> ResponseSchema {
    ResponseSchema::json_object(json!({
        "type": "object",
        "properties": {
            "general_response": {"type": "string"},
            "movies": {
                "type": "array",
                "items": {"type": "string"},
                "minItems": SUGGESTED_MOVIES,
                "maxItems": SUGGESTED_MOVIES,
            },
        },
        "required": ["general_response", "movies"],
    }))
}

/// Contract for story mode: a single `story` text field.
pub fn story_schema() -> ResponseSchema {
    ResponseSchema::json_object(json!({
        "type": "object",
        "properties": {
            "story": {"type": "string"},
        },
        "required": ["story"],
    }))
}

/// Chat is streamed, and streamed JSON mode is unsupported, so it stays free text.
pub fn chat_schema() -> ResponseSchema {
    ResponseSchema::Text
}

/// Default contract for a mode
pub fn default_schema(mode: Mode) -> ResponseSchema {
    match mode {
        Mode::Suggestion => suggestion_schema(),
        Mode::Chat => chat_schema(),
        Mode::Story => story_schema(),
    }
}

/// Resolve the contract for a call.
///
/// An override replaces the default wholesale; fields are never merged.
pub fn resolve(mode: Mode, override_schema: Option<ResponseSchema>) -> ResponseSchema {
    override_schema.unwrap_or_else(|| default_schema(mode))
}
