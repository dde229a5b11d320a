//! Error types for Parley operations.

/// The main error type for Parley operations.
#[derive(Debug, thiserror::Error)]
pub enum ParleyError {
    /// Caller supplied text or parameters that break an assembly contract
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The runtime answered but produced nothing usable
    #[error("No response from the model.")]
    EmptyResponse,

    /// The runtime failed or returned a malformed structure
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// A streaming call failed after it started delivering output
    #[error("Stream aborted: {0}")]
    StreamAborted(String),

    /// Startup configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ParleyError {
    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a runtime error
    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    /// Create a stream aborted error
    pub fn stream_aborted(msg: impl Into<String>) -> Self {
        Self::StreamAborted(msg.into())
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// The underlying reason, without the variant prefix
    pub fn reason(&self) -> String {
        match self {
            Self::EmptyResponse => self.to_string(),
            Self::InvalidInput(reason)
            | Self::Runtime(reason)
            | Self::StreamAborted(reason)
            | Self::Configuration(reason) => reason.clone(),
            Self::Serialization(e) => e.to_string(),
        }
    }

    /// Render the error as the text handed to an end user in place of a completion.
    ///
    /// An empty response reads as a plain notice; everything else is prefixed
    /// with `Error:` followed by the underlying reason.
    pub fn payload(&self) -> String {
        match self {
            Self::EmptyResponse => self.reason(),
            _ => format!("Error: {}", self.reason()),
        }
    }

    /// Whether the error was raised before any runtime call was attempted
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::Configuration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_for_empty_response() {
        assert_eq!(
            ParleyError::EmptyResponse.payload(),
            "No response from the model."
        );
    }

    #[test]
    fn test_payload_prefixes_reason() {
        let err = ParleyError::runtime("model crashed");
        assert_eq!(err.payload(), "Error: model crashed");
        assert_eq!(err.reason(), "model crashed");
        assert_eq!(err.to_string(), "Runtime error: model crashed");
    }

    #[test]
    fn test_input_errors() {
        assert!(ParleyError::invalid_input("empty").is_input_error());
        assert!(!ParleyError::stream_aborted("eof").is_input_error());
    }
}
