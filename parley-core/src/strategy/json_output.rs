//! JSON output strategies for runtimes with different decoding capabilities.
//!
//! - `ConstrainedSchemaStrategy`: runtimes that compile a schema into a
//!   decoding grammar (llama.cpp server)
//! - `JsonModeStrategy`: runtimes that only offer a plain JSON mode; the
//!   shape is described to the model in its instructions instead

use crate::error::ParleyError;
use crate::types::{ChatCompletionRequest, Message, ResponseFormat, ResponseSchema, Role, RuntimeInfo};

/// Strategy for turning a response contract into request fields.
pub trait JsonOutputStrategy: Send + Sync {
    /// Get the strategy name for debugging
    fn name(&self) -> &str;

    /// Apply the contract to a chat completion request.
    ///
    /// A `Text` contract always yields a plain text response format.
    fn apply(
        &self,
        req: &mut ChatCompletionRequest,
        schema: &ResponseSchema,
    ) -> Result<(), ParleyError>;
}

/// Strategy for runtimes that support grammar-constrained JSON decoding.
#[derive(Debug, Clone)]
pub struct ConstrainedSchemaStrategy {
    /// Whether the runtime should reject tokens outside the schema
    pub strict: bool,
}

impl ConstrainedSchemaStrategy {
    /// Create a new strategy with strict mode enabled
    pub fn new() -> Self {
        Self { strict: true }
    }

    /// Create a new strategy with configurable strict mode
    pub fn with_strict(strict: bool) -> Self {
        Self { strict }
    }
}

impl Default for ConstrainedSchemaStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonOutputStrategy for ConstrainedSchemaStrategy {
    fn name(&self) -> &str {
        "ConstrainedSchemaStrategy"
    }

    fn apply(
        &self,
        req: &mut ChatCompletionRequest,
        schema: &ResponseSchema,
    ) -> Result<(), ParleyError> {
        req.response_format = Some(match schema {
            ResponseSchema::Text => ResponseFormat::Text,
            ResponseSchema::JsonObject { schema } => ResponseFormat::JsonSchema {
                name: "response".to_string(),
                schema: schema.clone(),
                strict: self.strict,
            },
        });

        Ok(())
    }
}

/// Strategy for runtimes that only support basic JSON object mode.
///
/// Sets the response format to `JsonObject` and describes the shape in the
/// prompt. The instruction is appended to the existing system message so the
/// conversation keeps exactly one system message.
#[derive(Debug, Clone)]
pub struct JsonModeStrategy {
    /// Append to the system message (true) or to the last user message (false)
    pub use_system_message: bool,
}

impl JsonModeStrategy {
    /// Create a new JSON mode strategy that extends the system message
    pub fn new() -> Self {
        Self {
            use_system_message: true,
        }
    }

    /// Create a new JSON mode strategy with configurable injection point
    pub fn with_system_message(use_system_message: bool) -> Self {
        Self { use_system_message }
    }

    /// Build a JSON instruction from a schema
    fn build_json_instruction(schema: &serde_json::Value) -> Result<String, ParleyError> {
        let schema_str = serde_json::to_string_pretty(schema)?;
        Ok(format!(
            "You must respond with valid JSON that matches this schema:\n```json\n{}\n```\n\nIMPORTANT:\n\
            1. Only return the JSON object, nothing else\n\
            2. Ensure all required fields are present\n\
            3. Follow the schema structure exactly\n\
            4. Use the correct data types for each field",
            schema_str
        ))
    }

    fn append_to(message: &mut Message, instruction: &str) {
        if message.content.trim().is_empty() {
            message.content = instruction.to_string();
        } else {
            message.content = format!("{}\n\n{}", message.content, instruction);
        }
    }
}

impl Default for JsonModeStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonOutputStrategy for JsonModeStrategy {
    fn name(&self) -> &str {
        "JsonModeStrategy"
    }

    fn apply(
        &self,
        req: &mut ChatCompletionRequest,
        schema: &ResponseSchema,
    ) -> Result<(), ParleyError> {
        let shape = match schema {
            ResponseSchema::Text => {
                req.response_format = Some(ResponseFormat::Text);
                return Ok(());
            }
            ResponseSchema::JsonObject { schema } => schema,
        };

        req.response_format = Some(ResponseFormat::JsonObject);
        let instruction = Self::build_json_instruction(shape)?;

        let target = if self.use_system_message {
            req.messages.first_mut().filter(|m| m.role == Role::System)
        } else {
            req.messages.iter_mut().rev().find(|m| m.role == Role::User)
        };

        match target {
            Some(message) => Self::append_to(message, &instruction),
            None if self.use_system_message => req.messages.insert(0, Message::system(instruction)),
            None => req.messages.push(Message::user(instruction)),
        }

        Ok(())
    }
}

/// Pick the JSON output strategy matching a runtime's capabilities.
pub fn detect_json_strategy(info: &RuntimeInfo) -> Box<dyn JsonOutputStrategy> {
    if info.constrained_decoding {
        Box::new(ConstrainedSchemaStrategy::new())
    } else {
        Box::new(JsonModeStrategy::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape() -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "story": {"type": "string"}
            },
            "required": ["story"]
        })
    }

    fn request() -> ChatCompletionRequest {
        ChatCompletionRequest::new(vec![
            Message::system("You are a Children's book author."),
            Message::user("A story about rain"),
        ])
    }

    #[test]
    fn test_constrained_schema_strategy() {
        let strategy = ConstrainedSchemaStrategy::new();
        let mut req = request();

        strategy
            .apply(&mut req, &ResponseSchema::json_object(shape()))
            .unwrap();

        match req.response_format {
            Some(ResponseFormat::JsonSchema { schema, strict, .. }) => {
                assert_eq!(schema, shape());
                assert!(strict);
            }
            _ => panic!("Expected JsonSchema response format"),
        }
        assert_eq!(req.messages.len(), 2);
    }

    #[test]
    fn test_lenient_constrained_schema() {
        let strategy = ConstrainedSchemaStrategy::with_strict(false);
        let mut req = request();

        strategy
            .apply(&mut req, &ResponseSchema::json_object(shape()))
            .unwrap();

        assert!(matches!(
            req.response_format,
            Some(ResponseFormat::JsonSchema { strict: false, .. })
        ));
    }

    #[test]
    fn test_text_contract_is_plain_text() {
        let strategies: Vec<Box<dyn JsonOutputStrategy>> = vec![
            Box::new(ConstrainedSchemaStrategy::new()),
            Box::new(JsonModeStrategy::new()),
        ];

        for strategy in strategies {
            let mut req = request();
            strategy.apply(&mut req, &ResponseSchema::Text).unwrap();
            assert_eq!(req.response_format, Some(ResponseFormat::Text));
            assert_eq!(req.messages, request().messages);
        }
    }

    #[test]
    fn test_json_mode_extends_system_message() {
        let strategy = JsonModeStrategy::new();
        let mut req = request();

        strategy
            .apply(&mut req, &ResponseSchema::json_object(shape()))
            .unwrap();

        assert_eq!(req.response_format, Some(ResponseFormat::JsonObject));
        assert_eq!(req.messages.len(), 2);
        assert_eq!(req.messages[0].role, Role::System);
        assert!(req.messages[0]
            .content
            .starts_with("You are a Children's book author."));
        assert!(req.messages[0].content.contains("\"story\""));
    }

    #[test]
    fn test_json_mode_extends_last_user_message() {
        let strategy = JsonModeStrategy::with_system_message(false);
        let mut req = request();

        strategy
            .apply(&mut req, &ResponseSchema::json_object(shape()))
            .unwrap();

        assert_eq!(req.messages[0].content, "You are a Children's book author.");
        assert!(req.messages[1].content.starts_with("A story about rain\n\n"));
    }

    #[test]
    fn test_detect_json_strategy() {
        let mut info = RuntimeInfo {
            id: "llama-server".to_string(),
            name: "llama.cpp server".to_string(),
            constrained_decoding: true,
        };
        assert_eq!(detect_json_strategy(&info).name(), "ConstrainedSchemaStrategy");

        info.constrained_decoding = false;
        assert_eq!(detect_json_strategy(&info).name(), "JsonModeStrategy");
    }
}
