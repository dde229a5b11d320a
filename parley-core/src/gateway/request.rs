//! Mode-level requests accepted by the gateway.
//!
//! These mirror what a transport receives from a client. Optional fields fall
//! back to the mode defaults when absent.

use crate::types::{ResponseSchema, Turn};
use serde::Deserialize;

/// Single-turn structured suggestion
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SuggestionRequest {
    #[serde(alias = "query")]
    pub message: String,
    #[serde(default, alias = "preMessage")]
    pub system: Option<String>,
    #[serde(default)]
    pub schema: Option<ResponseSchema>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl SuggestionRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_schema(mut self, schema: ResponseSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// One streamed chat turn on top of caller-held history
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<Turn>,
    #[serde(default, alias = "preMessage")]
    pub system: Option<String>,
    #[serde(default)]
    pub schema: Option<ResponseSchema>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Keep only this many trailing words of history
    #[serde(default)]
    pub history_word_budget: Option<usize>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_history(mut self, history: Vec<Turn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_schema(mut self, schema: ResponseSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_history_word_budget(mut self, words: usize) -> Self {
        self.history_word_budget = Some(words);
        self
    }
}

/// Long-form persona generation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoryRequest {
    pub prompt: String,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub priming: Option<Vec<String>>,
    #[serde(default)]
    pub schema: Option<ResponseSchema>,
}

impl StoryRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_priming(mut self, priming: Vec<String>) -> Self {
        self.priming = Some(priming);
        self
    }

    pub fn with_schema(mut self, schema: ResponseSchema) -> Self {
        self.schema = Some(schema);
        self
    }
}
