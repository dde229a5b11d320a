//! Core types for conversation orchestration.

use crate::error::ParleyError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Message role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Lowercase wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a new system message
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: text.into(),
        }
    }

    /// Create a new user message
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
        }
    }

    /// Create a new assistant message
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
        }
    }
}

/// A prior exchange supplied by the caller.
///
/// Turns carry only the role and text; the assembler decides how they become
/// messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    #[serde(alias = "content")]
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Ordered message list handed to the runtime in one call.
///
/// Only the assembler builds conversations, so the first message is always
/// the synthesized system message.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub(crate) fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn first(&self) -> Option<&Message> {
        self.messages.first()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }
}

/// Interaction mode served by the gateway
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Single-turn structured movie suggestion
    Suggestion,
    /// Multi-turn streaming chat
    Chat,
    /// Single-shot story generation with a fixed persona
    Story,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Suggestion => "suggestion",
            Mode::Chat => "chat",
            Mode::Story => "story",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output-shape contract passed through to the runtime.
///
/// The runtime is expected, not guaranteed, to honour a `JsonObject` shape.
/// Nothing in this crate validates generated output against it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseSchema {
    /// Free text
    Text,
    /// JSON object following a JSON-schema-like shape
    JsonObject { schema: serde_json::Value },
}

impl ResponseSchema {
    /// Create a JSON object contract from a schema tree
    pub fn json_object(schema: serde_json::Value) -> Self {
        Self::JsonObject { schema }
    }

    /// Shape of the contract, if it is structured
    pub fn shape(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Text => None,
            Self::JsonObject { schema } => Some(schema),
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Self::JsonObject { .. })
    }
}

/// Sampling parameters for one runtime call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    /// Temperature (0.0 - 2.0)
    pub temperature: f32,
    /// Maximum number of tokens to generate; `None` leaves it to the runtime
    pub max_tokens: Option<u32>,
    pub stream: bool,
    pub response_schema: ResponseSchema,
}

impl GenerationConfig {
    pub fn new(temperature: f32) -> Self {
        Self {
            temperature,
            max_tokens: None,
            stream: false,
            response_schema: ResponseSchema::Text,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_response_schema(mut self, schema: ResponseSchema) -> Self {
        self.response_schema = schema;
        self
    }

    /// Check parameter ranges before anything reaches the runtime
    pub fn validate(&self) -> Result<(), ParleyError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ParleyError::invalid_input(format!(
                "temperature must be within [0, 2], got {}",
                self.temperature
            )));
        }
        if self.max_tokens == Some(0) {
            return Err(ParleyError::invalid_input(
                "max_tokens must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Event emitted to the transport while a chat reply streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A new turn starts for the given role
    RoleAnnounce(Role),
    /// Generated text, verbatim
    TextChunk(String),
    /// The turn finished
    EndOfTurn,
    /// The stream failed after it started; always the last event
    Aborted(String),
}

impl StreamEvent {
    /// Text written to the client for this event
    pub fn render(&self) -> String {
        match self {
            StreamEvent::RoleAnnounce(role) => format!("{}: ", role),
            StreamEvent::TextChunk(text) => text.clone(),
            StreamEvent::EndOfTurn => "\n".to_string(),
            StreamEvent::Aborted(reason) => format!("Error: {}", reason),
        }
    }
}

// ============================================================================
// Runtime wire types
// ============================================================================

/// Response format as sent to the runtime
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Plain text response
    Text,
    /// JSON object response (basic JSON mode, no grammar)
    JsonObject,
    /// Grammar-constrained JSON following a schema
    JsonSchema {
        name: String,
        schema: serde_json::Value,
        strict: bool,
    },
}

/// Chat completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

impl ChatCompletionRequest {
    /// Create a new chat completion request
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            temperature: None,
            max_tokens: None,
            response_format: None,
            stream: None,
        }
    }

    /// Build a request from a conversation and its generation parameters.
    ///
    /// The response format is left unset; a JSON output strategy fills it in.
    pub fn from_config(conversation: Conversation, config: &GenerationConfig) -> Self {
        Self {
            messages: conversation.into_messages(),
            temperature: Some(config.temperature),
            max_tokens: config.max_tokens,
            response_format: None,
            stream: Some(config.stream),
        }
    }
}

/// Usage statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Finish reason
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    Other(String),
}

/// Single choice in chat completion response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub message: Message,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

/// Chat completion response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub model: String,
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Usage,
}

/// Chat completion streaming chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub model: String,
    pub choices: Vec<ChoiceDelta>,
}

impl ChatCompletionChunk {
    /// Chunk carrying a single delta, as produced by a local runtime
    pub fn from_delta(delta: MessageDelta) -> Self {
        Self {
            id: String::new(),
            model: String::new(),
            choices: vec![ChoiceDelta {
                index: 0,
                delta,
                finish_reason: None,
            }],
        }
    }
}

/// Delta choice in streaming response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceDelta {
    pub index: u32,
    pub delta: MessageDelta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

/// Message delta for streaming.
///
/// `role` and `content` are independent; either, both or neither may be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl MessageDelta {
    pub fn role(role: Role) -> Self {
        Self {
            role: Some(role),
            content: None,
        }
    }

    pub fn content(text: impl Into<String>) -> Self {
        Self {
            role: None,
            content: Some(text.into()),
        }
    }
}

/// Runtime information
#[derive(Debug, Clone)]
pub struct RuntimeInfo {
    pub id: String,
    pub name: String,
    /// Whether the runtime can constrain decoding to a JSON schema
    pub constrained_decoding: bool,
}

/// Per-call context used to correlate log lines
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub runtime_id: String,
    pub operation: &'static str,
}

impl RequestContext {
    /// Create a new request context
    pub fn new(info: &Arc<RuntimeInfo>, operation: &'static str) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            runtime_id: info.id.clone(),
            operation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_schema_wire_shape() {
        let schema = ResponseSchema::json_object(serde_json::json!({"type": "object"}));
        assert_eq!(
            serde_json::to_value(&schema).unwrap(),
            serde_json::json!({"type": "json_object", "schema": {"type": "object"}})
        );
        assert_eq!(
            serde_json::to_value(ResponseSchema::Text).unwrap(),
            serde_json::json!({"type": "text"})
        );
    }

    #[test]
    fn test_delta_fields_are_optional() {
        let delta: MessageDelta = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(delta, MessageDelta::default());

        let delta: MessageDelta =
            serde_json::from_value(serde_json::json!({"content": "Hi", "role": "assistant"}))
                .unwrap();
        assert_eq!(delta.role, Some(Role::Assistant));
        assert_eq!(delta.content.as_deref(), Some("Hi"));
    }

    #[test]
    fn test_turn_accepts_message_shape() {
        let turns: Vec<Turn> = serde_json::from_value(serde_json::json!([
            {"role": "user", "content": "Any comedies?"},
            {"role": "assistant", "text": "Try Airplane!"}
        ]))
        .unwrap();

        assert_eq!(
            turns,
            vec![Turn::user("Any comedies?"), Turn::assistant("Try Airplane!")]
        );
    }

    #[test]
    fn test_generation_config_validation() {
        assert!(GenerationConfig::new(0.7).validate().is_ok());
        assert!(GenerationConfig::new(2.0).with_max_tokens(1).validate().is_ok());
        assert!(matches!(
            GenerationConfig::new(2.5).validate(),
            Err(ParleyError::InvalidInput(_))
        ));
        assert!(matches!(
            GenerationConfig::new(0.7).with_max_tokens(0).validate(),
            Err(ParleyError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_stream_event_render() {
        assert_eq!(StreamEvent::RoleAnnounce(Role::Assistant).render(), "assistant: ");
        assert_eq!(StreamEvent::TextChunk("Hi".into()).render(), "Hi");
        assert_eq!(StreamEvent::EndOfTurn.render(), "\n");
        assert_eq!(StreamEvent::Aborted("eof".into()).render(), "Error: eof");
    }
}
