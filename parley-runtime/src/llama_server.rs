//! llama.cpp server runtime using the async-openai crate.
//!
//! `llama-server` exposes an OpenAI-compatible chat completions endpoint for
//! the single model it loaded at startup. This runtime only maps Parley's
//! request and delta types onto that endpoint; assembly and translation stay
//! in the gateway.

use crate::config::LlamaServerConfig;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
    CreateChatCompletionResponse, CreateChatCompletionStreamResponse,
    ResponseFormat as OpenAIResponseFormat,
    ResponseFormatJsonSchema as OpenAIResponseFormatJsonSchema,
};
use async_openai::Client;
use async_trait::async_trait;
use futures::stream::StreamExt;
use parley_core::error::ParleyError;
use parley_core::model::{ChatCompletionStream, ModelRuntime};
use parley_core::types::*;
use std::path::PathBuf;
use std::sync::Arc;

/// Runtime backed by a llama.cpp server
#[derive(Clone)]
pub struct LlamaServerRuntime {
    client: Client<OpenAIConfig>,
    model: String,
    info: Arc<RuntimeInfo>,
}

impl std::fmt::Debug for LlamaServerRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlamaServerRuntime")
            .field("model", &self.model)
            .field("info", &self.info)
            .finish()
    }
}

impl LlamaServerRuntime {
    /// Create a builder for configuration options
    pub fn builder() -> LlamaServerBuilder {
        LlamaServerBuilder::default()
    }

    /// Build a runtime from a validated configuration.
    ///
    /// Fails with `Configuration` when the weight file is missing or corrupt.
    pub fn from_config(config: LlamaServerConfig) -> Result<Self, ParleyError> {
        config.validate()?;

        let mut openai_config = OpenAIConfig::new().with_api_base(config.api_base.clone());
        if let Some(api_key) = &config.api_key {
            openai_config = openai_config.with_api_key(api_key.clone());
        }

        let model = config.model_name();
        tracing::info!(
            "llama-server runtime ready: api_base={}, model={}, chat_format={}, context_window={}, gpu_layers={}",
            config.api_base,
            model,
            config.chat_format,
            config.context_window,
            config.gpu_layers
        );

        Ok(Self {
            client: Client::with_config(openai_config),
            model,
            info: Arc::new(RuntimeInfo {
                id: "llama-server".to_string(),
                name: "llama.cpp server".to_string(),
                constrained_decoding: config.constrained_decoding,
            }),
        })
    }

    /// Convert our Message type to OpenAI's ChatCompletionRequestMessage
    fn convert_message(msg: &Message) -> Result<ChatCompletionRequestMessage, ParleyError> {
        let content = msg.content.clone();

        match msg.role {
            Role::System => {
                let msg = ChatCompletionRequestSystemMessageArgs::default()
                    .content(content)
                    .build()
                    .map_err(|e| {
                        ParleyError::runtime(format!("Failed to build system message: {}", e))
                    })?;
                Ok(ChatCompletionRequestMessage::System(msg))
            }
            Role::User => {
                let msg = ChatCompletionRequestUserMessageArgs::default()
                    .content(content)
                    .build()
                    .map_err(|e| {
                        ParleyError::runtime(format!("Failed to build user message: {}", e))
                    })?;
                Ok(ChatCompletionRequestMessage::User(msg))
            }
            Role::Assistant => {
                let msg = ChatCompletionRequestAssistantMessageArgs::default()
                    .content(content)
                    .build()
                    .map_err(|e| {
                        ParleyError::runtime(format!("Failed to build assistant message: {}", e))
                    })?;
                Ok(ChatCompletionRequestMessage::Assistant(msg))
            }
        }
    }

    /// Convert our ResponseFormat to OpenAI's ResponseFormat
    fn convert_response_format(format: &ResponseFormat) -> OpenAIResponseFormat {
        match format {
            ResponseFormat::Text => OpenAIResponseFormat::Text,
            ResponseFormat::JsonObject => OpenAIResponseFormat::JsonObject,
            ResponseFormat::JsonSchema {
                name,
                schema,
                strict,
            } => OpenAIResponseFormat::JsonSchema {
                json_schema: OpenAIResponseFormatJsonSchema {
                    name: name.clone(),
                    schema: Some(schema.clone()),
                    strict: Some(*strict),
                    description: None,
                },
            },
        }
    }

    fn convert_role(role: &async_openai::types::Role) -> Role {
        match role {
            async_openai::types::Role::System => Role::System,
            async_openai::types::Role::User => Role::User,
            _ => Role::Assistant,
        }
    }

    fn convert_finish_reason(reason: async_openai::types::FinishReason) -> FinishReason {
        match reason {
            async_openai::types::FinishReason::Stop => FinishReason::Stop,
            async_openai::types::FinishReason::Length => FinishReason::Length,
            async_openai::types::FinishReason::ContentFilter => FinishReason::ContentFilter,
            other => FinishReason::Other(format!("{:?}", other)),
        }
    }

    /// Build CreateChatCompletionRequest from our ChatCompletionRequest
    #[allow(deprecated)]
    fn build_request(
        &self,
        req: &ChatCompletionRequest,
    ) -> Result<CreateChatCompletionRequest, ParleyError> {
        let messages: Result<Vec<_>, _> = req.messages.iter().map(Self::convert_message).collect();

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(&self.model).messages(messages?);

        if let Some(max_tokens) = req.max_tokens {
            builder.max_tokens(max_tokens);
        }
        if let Some(temperature) = req.temperature {
            builder.temperature(temperature);
        }
        if let Some(response_format) = &req.response_format {
            builder.response_format(Self::convert_response_format(response_format));
        }
        if let Some(stream) = req.stream {
            builder.stream(stream);
        }

        builder
            .build()
            .map_err(|e| ParleyError::runtime(format!("Failed to build request: {}", e)))
    }

    /// Convert the server response to our ChatCompletionResponse
    fn convert_response(response: CreateChatCompletionResponse) -> ChatCompletionResponse {
        let choices = response
            .choices
            .into_iter()
            .map(|choice| Choice {
                index: choice.index,
                message: Message {
                    role: Self::convert_role(&choice.message.role),
                    content: choice.message.content.unwrap_or_default(),
                },
                finish_reason: choice.finish_reason.map(Self::convert_finish_reason),
            })
            .collect();

        let usage = response.usage.map_or_else(Usage::default, |u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        ChatCompletionResponse {
            id: response.id,
            model: response.model,
            choices,
            usage,
        }
    }

    /// Convert a server stream chunk to our ChatCompletionChunk
    fn convert_stream_chunk(response: CreateChatCompletionStreamResponse) -> ChatCompletionChunk {
        let choices = response
            .choices
            .into_iter()
            .map(|choice| ChoiceDelta {
                index: choice.index,
                delta: MessageDelta {
                    role: choice.delta.role.as_ref().map(Self::convert_role),
                    content: choice.delta.content,
                },
                finish_reason: choice.finish_reason.map(Self::convert_finish_reason),
            })
            .collect();

        ChatCompletionChunk {
            id: response.id,
            model: response.model,
            choices,
        }
    }
}

#[async_trait]
impl ModelRuntime for LlamaServerRuntime {
    fn info(&self) -> Arc<RuntimeInfo> {
        self.info.clone()
    }

    async fn complete(
        &self,
        req: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ParleyError> {
        let mut server_req = self.build_request(&req)?;
        server_req.stream = Some(false);

        let response = self
            .client
            .chat()
            .create(server_req)
            .await
            .map_err(|e| ParleyError::runtime(format!("llama-server error: {}", e)))?;

        Ok(Self::convert_response(response))
    }

    async fn complete_stream(
        &self,
        req: ChatCompletionRequest,
    ) -> Result<Box<ChatCompletionStream>, ParleyError> {
        let mut server_req = self.build_request(&req)?;
        server_req.stream = Some(true);

        let stream = self
            .client
            .chat()
            .create_stream(server_req)
            .await
            .map_err(|e| ParleyError::runtime(format!("llama-server error: {}", e)))?;

        // Dropping this stream closes the HTTP response, which stops generation server-side
        let chat_stream = stream.map(|result| match result {
            Ok(response) => Ok(Self::convert_stream_chunk(response)),
            Err(e) => Err(ParleyError::runtime(format!("Stream error: {}", e))),
        });

        Ok(Box::new(chat_stream))
    }
}

/// Builder for a llama.cpp server runtime
#[derive(Default)]
pub struct LlamaServerBuilder {
    config: LlamaServerConfig,
}

impl LlamaServerBuilder {
    /// Set API base URL
    pub fn api_base(mut self, api_base: impl Into<String>) -> Self {
        self.config.api_base = api_base.into();
        self
    }

    /// Set API key
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.api_key = Some(api_key.into());
        self
    }

    /// Set the GGUF weight file
    pub fn model_path(mut self, model_path: impl Into<PathBuf>) -> Self {
        self.config.model_path = model_path.into();
        self
    }

    /// Set the chat template name
    pub fn chat_format(mut self, chat_format: impl Into<String>) -> Self {
        self.config.chat_format = chat_format.into();
        self
    }

    /// Set the context window
    pub fn context_window(mut self, context_window: u32) -> Self {
        self.config.context_window = context_window;
        self
    }

    /// Set GPU offload: -1 for all layers, 0 for CPU only
    pub fn gpu_layers(mut self, gpu_layers: i32) -> Self {
        self.config.gpu_layers = gpu_layers;
        self
    }

    /// Declare whether the server supports schema-constrained decoding
    pub fn constrained_decoding(mut self, enabled: bool) -> Self {
        self.config.constrained_decoding = enabled;
        self
    }

    /// Inspect the configuration being built
    pub fn config(&self) -> &LlamaServerConfig {
        &self.config
    }

    /// Build the runtime
    pub fn build(self) -> Result<LlamaServerRuntime, ParleyError> {
        LlamaServerRuntime::from_config(self.config)
    }
}
