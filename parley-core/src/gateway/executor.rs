//! CompletionGateway implementation.
//!
//! The gateway is the single entry point over a loaded model runtime. It
//! exposes the three core operations (structured completion, streaming chat,
//! persona completion) plus mode-level wrappers that assemble the
//! conversation and resolve the response contract first.

use super::request::{ChatRequest, StoryRequest, SuggestionRequest};
use crate::assembler::{story_priming, truncate_history, MessageAssembler};
use crate::error::ParleyError;
use crate::layer::Layer;
use crate::model::ModelRuntime;
use crate::schema;
use crate::strategy::{detect_json_strategy, JsonOutputStrategy};
use crate::translate::{translate, MarkerVocabulary};
use crate::types::*;
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::borrow::Cow;
use std::pin::Pin;
use std::sync::Arc;

/// Type-erased runtime shared by every request
type BoxedRuntime = Arc<dyn ModelRuntime>;

/// Stream of chat events handed to the transport
pub type ChatEventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Token ceiling for persona completions, whatever the caller asks for.
pub const STORY_MAX_TOKENS: u32 = 1024;

/// Startup-time generation defaults
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GatewayDefaults {
    /// Temperature used when a request does not set one
    pub temperature: f32,
    /// Chat `max_tokens` used when a request does not set one
    pub chat_max_tokens: u32,
}

impl Default for GatewayDefaults {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            chat_max_tokens: 1000,
        }
    }
}

/// Outcome of a blocking completion.
///
/// Runtime failures are values, not errors: every outcome renders to text.
#[derive(Debug)]
pub enum Completion {
    /// The model's reply
    Generated(String),
    /// The runtime failed or answered with nothing usable
    Failed(ParleyError),
}

impl Completion {
    /// Renderable text: the reply, or the error payload
    pub fn text(&self) -> Cow<'_, str> {
        match self {
            Completion::Generated(text) => Cow::Borrowed(text),
            Completion::Failed(err) => Cow::Owned(err.payload()),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Completion::Failed(_))
    }

    pub fn into_result(self) -> Result<String, ParleyError> {
        match self {
            Completion::Generated(text) => Ok(text),
            Completion::Failed(err) => Err(err),
        }
    }

    /// Parse the reply as JSON.
    ///
    /// Best effort only: the response contract is a hint to the runtime and is
    /// not checked here. A failed completion keeps its kind, `EmptyResponse`
    /// or `Runtime`.
    pub fn parse_json<T: DeserializeOwned>(&self) -> Result<T, ParleyError> {
        match self {
            Completion::Generated(text) => Ok(serde_json::from_str(text)?),
            Completion::Failed(ParleyError::EmptyResponse) => Err(ParleyError::EmptyResponse),
            Completion::Failed(err) => Err(ParleyError::runtime(err.reason())),
        }
    }
}

/// Builder for composing a gateway over a runtime.
///
/// Layers wrap the runtime with static dispatch while building; the result is
/// type-erased once in [`finish`](CompletionGatewayBuilder::finish).
///
/// # Example
///
/// ```ignore
/// let gateway = CompletionGateway::builder(runtime)
///     .layer(LoggingLayer::new())
///     .layer(QueueLayer::new())
///     .finish();
/// ```
pub struct CompletionGatewayBuilder<R> {
    runtime: R,
    json_strategy: Option<Box<dyn JsonOutputStrategy>>,
    vocabulary: MarkerVocabulary,
    defaults: GatewayDefaults,
}

impl<R: ModelRuntime> CompletionGatewayBuilder<R> {
    /// Create a new builder with a runtime
    pub fn new(runtime: R) -> Self {
        Self {
            runtime,
            json_strategy: None,
            vocabulary: MarkerVocabulary::default(),
            defaults: GatewayDefaults::default(),
        }
    }

    /// Add a layer to wrap the runtime
    pub fn layer<L>(self, layer: L) -> CompletionGatewayBuilder<L::LayeredRuntime>
    where
        L: Layer<R>,
    {
        CompletionGatewayBuilder {
            runtime: layer.layer(self.runtime),
            json_strategy: self.json_strategy,
            vocabulary: self.vocabulary,
            defaults: self.defaults,
        }
    }

    /// Set a custom JSON output strategy
    ///
    /// If not set, the strategy is picked from the runtime's capabilities.
    pub fn json_strategy(mut self, strategy: Box<dyn JsonOutputStrategy>) -> Self {
        self.json_strategy = Some(strategy);
        self
    }

    /// Set the chat-template markers used by stream translation
    pub fn markers(mut self, vocabulary: MarkerVocabulary) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    /// Set generation defaults
    pub fn defaults(mut self, defaults: GatewayDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Finish building and create a CompletionGateway
    pub fn finish(self) -> CompletionGateway {
        let runtime: BoxedRuntime = Arc::new(self.runtime);

        let json_strategy = self
            .json_strategy
            .unwrap_or_else(|| detect_json_strategy(&runtime.info()));

        CompletionGateway {
            runtime,
            json_strategy,
            vocabulary: self.vocabulary,
            defaults: self.defaults,
        }
    }
}

/// Entry point for all completions against the loaded model.
///
/// Holds no conversation state; every call is a closed transaction.
pub struct CompletionGateway {
    runtime: BoxedRuntime,
    json_strategy: Box<dyn JsonOutputStrategy>,
    vocabulary: MarkerVocabulary,
    defaults: GatewayDefaults,
}

impl CompletionGateway {
    /// Create a new builder
    pub fn builder<R: ModelRuntime>(runtime: R) -> CompletionGatewayBuilder<R> {
        CompletionGatewayBuilder::new(runtime)
    }

    /// Get runtime information
    pub fn info(&self) -> Arc<RuntimeInfo> {
        self.runtime.info()
    }

    pub fn defaults(&self) -> &GatewayDefaults {
        &self.defaults
    }

    // ==================== Core operations ====================

    /// Run one blocking completion and extract the first choice's content.
    ///
    /// Only input errors are returned as `Err`, and only before the runtime
    /// is called. Runtime failures come back as [`Completion::Failed`].
    pub async fn structured_complete(
        &self,
        conversation: Conversation,
        schema: ResponseSchema,
        temperature: f32,
    ) -> Result<Completion, ParleyError> {
        let config = GenerationConfig::new(temperature).with_response_schema(schema);
        self.complete_blocking("structured_complete", conversation, config)
            .await
    }

    /// Open a streaming chat completion.
    ///
    /// The returned stream is lazy: nothing reaches the runtime until it is
    /// first polled. A failure while opening or mid-stream becomes one final
    /// [`StreamEvent::Aborted`]; events already delivered stand. Dropping the
    /// stream drops the runtime stream with it.
    pub fn stream_chat(
        &self,
        conversation: Conversation,
        schema: ResponseSchema,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<ChatEventStream, ParleyError> {
        let config = GenerationConfig::new(temperature)
            .with_max_tokens(max_tokens)
            .with_stream(true)
            .with_response_schema(schema);
        config.validate()?;

        let ctx = RequestContext::new(&self.runtime.info(), "stream_chat");
        if config.response_schema.is_structured() {
            tracing::warn!(
                "[{}] stream_chat: structured output is not supported while streaming, schema forwarded as a hint",
                ctx.request_id
            );
        }

        let mut req = ChatCompletionRequest::from_config(conversation, &config);
        self.json_strategy.apply(&mut req, &config.response_schema)?;

        tracing::debug!(
            "[{}] stream_chat request: runtime={}, messages={}, max_tokens={}",
            ctx.request_id,
            ctx.runtime_id,
            req.messages.len(),
            max_tokens
        );

        let runtime = self.runtime.clone();
        let vocabulary = self.vocabulary.clone();

        let events = async_stream::stream! {
            let raw = match runtime.complete_stream(req).await {
                Ok(raw) => raw,
                Err(err) => {
                    tracing::error!("[{}] stream_chat failed to open: {}", ctx.request_id, err);
                    yield StreamEvent::Aborted(err.reason());
                    return;
                }
            };

            let mut translated = translate(raw, vocabulary);
            while let Some(event) = translated.next().await {
                match event {
                    Ok(event) => yield event,
                    Err(err) => {
                        let err = ParleyError::stream_aborted(err.reason());
                        tracing::error!("[{}] {}", ctx.request_id, err);
                        yield StreamEvent::Aborted(err.reason());
                        return;
                    }
                }
            }

            tracing::debug!("[{}] stream_chat finished", ctx.request_id);
        };

        Ok(Box::pin(events))
    }

    /// Run a persona completion: priming statements go in as assistant turns
    /// and output is capped at [`STORY_MAX_TOKENS`].
    pub async fn persona_complete(
        &self,
        prompt: &str,
        system_text: Option<&str>,
        priming: &[String],
        schema: ResponseSchema,
    ) -> Result<Completion, ParleyError> {
        let conversation =
            MessageAssembler::new(Mode::Story).assemble_persona(system_text, priming, prompt)?;

        let config = GenerationConfig::new(self.defaults.temperature)
            .with_max_tokens(STORY_MAX_TOKENS)
            .with_response_schema(schema);
        self.complete_blocking("persona_complete", conversation, config)
            .await
    }

    // ==================== Mode-level operations ====================

    /// Suggest movies for a user message
    pub async fn suggest(&self, req: SuggestionRequest) -> Result<Completion, ParleyError> {
        let conversation = MessageAssembler::new(Mode::Suggestion).assemble(
            req.system.as_deref(),
            &[],
            &req.message,
        )?;
        let schema = schema::resolve(Mode::Suggestion, req.schema);
        let temperature = req.temperature.unwrap_or(self.defaults.temperature);

        self.structured_complete(conversation, schema, temperature)
            .await
    }

    /// Stream one chat reply on top of the caller's history
    pub fn chat(&self, req: ChatRequest) -> Result<ChatEventStream, ParleyError> {
        let history = match req.history_word_budget {
            Some(words) => truncate_history(&req.history, words),
            None => req.history,
        };

        let conversation =
            MessageAssembler::new(Mode::Chat).assemble(req.system.as_deref(), &history, &req.message)?;
        let schema = schema::resolve(Mode::Chat, req.schema);

        self.stream_chat(
            conversation,
            schema,
            req.temperature.unwrap_or(self.defaults.temperature),
            req.max_tokens.unwrap_or(self.defaults.chat_max_tokens),
        )
    }

    /// Generate a story with the children's-author persona
    pub async fn story(&self, req: StoryRequest) -> Result<Completion, ParleyError> {
        let priming = req.priming.unwrap_or_else(story_priming);
        let schema = schema::resolve(Mode::Story, req.schema);

        self.persona_complete(&req.prompt, req.system.as_deref(), &priming, schema)
            .await
    }

    // ==================== Internals ====================

    async fn complete_blocking(
        &self,
        operation: &'static str,
        conversation: Conversation,
        config: GenerationConfig,
    ) -> Result<Completion, ParleyError> {
        config.validate()?;

        let ctx = RequestContext::new(&self.runtime.info(), operation);
        let mut req = ChatCompletionRequest::from_config(conversation, &config);
        self.json_strategy.apply(&mut req, &config.response_schema)?;

        tracing::debug!(
            "[{}] {} request: runtime={}, messages={}, strategy={}",
            ctx.request_id,
            ctx.operation,
            ctx.runtime_id,
            req.messages.len(),
            self.json_strategy.name()
        );

        let completion = match self.runtime.complete(req).await {
            Ok(response) => Self::first_choice_content(response),
            Err(err) => Completion::Failed(Self::normalize(err)),
        };

        if let Completion::Failed(err) = &completion {
            tracing::error!("[{}] {} failed: {}", ctx.request_id, ctx.operation, err);
        }

        Ok(completion)
    }

    fn first_choice_content(response: ChatCompletionResponse) -> Completion {
        let Some(choice) = response.choices.into_iter().next() else {
            return Completion::Failed(ParleyError::runtime("No choices in response"));
        };

        if choice.message.content.trim().is_empty() {
            return Completion::Failed(ParleyError::EmptyResponse);
        }

        Completion::Generated(choice.message.content)
    }

    fn normalize(err: ParleyError) -> ParleyError {
        match err {
            err @ (ParleyError::Runtime(_) | ParleyError::EmptyResponse) => err,
            other => ParleyError::runtime(other.reason()),
        }
    }
}
