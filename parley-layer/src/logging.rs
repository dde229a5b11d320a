//! Logging layer for runtime calls.

use parley_core::error::ParleyError;
use parley_core::impl_layered_runtime;
use parley_core::layer::{Layer, LayeredRuntime};
use parley_core::model::{ChatCompletionStream, ModelRuntime};
use parley_core::types::*;
use async_trait::async_trait;
use futures::StreamExt;
use std::time::{Duration, Instant};

/// Logs each runtime call: request shape, latency, token usage and outcome.
///
/// Streams are logged once more when they close, with the chunk count and
/// time to first chunk.
#[derive(Debug, Clone)]
pub struct LoggingLayer {
    prefix: String,
}

impl LoggingLayer {
    /// Create a new logging layer
    pub fn new() -> Self {
        Self {
            prefix: "[Parley]".to_string(),
        }
    }

    /// Create a logging layer with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for LoggingLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ModelRuntime> Layer<R> for LoggingLayer {
    type LayeredRuntime = LoggingRuntime<R>;

    fn layer(&self, inner: R) -> Self::LayeredRuntime {
        LoggingRuntime {
            inner,
            prefix: self.prefix.clone(),
        }
    }
}

/// Runtime wrapped with logging
#[derive(Debug)]
pub struct LoggingRuntime<R> {
    inner: R,
    prefix: String,
}

impl<R: ModelRuntime> LoggingRuntime<R> {
    fn describe(req: &ChatCompletionRequest) -> String {
        let format = match &req.response_format {
            None | Some(ResponseFormat::Text) => "text",
            Some(ResponseFormat::JsonObject) => "json_object",
            Some(ResponseFormat::JsonSchema { .. }) => "json_schema",
        };
        format!(
            "messages={} format={} max_tokens={:?} temperature={:?}",
            req.messages.len(),
            format,
            req.max_tokens,
            req.temperature
        )
    }
}

#[async_trait]
impl<R: ModelRuntime> LayeredRuntime for LoggingRuntime<R> {
    type Inner = R;

    fn inner(&self) -> &Self::Inner {
        &self.inner
    }

    async fn layered_complete(
        &self,
        req: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ParleyError> {
        let runtime = self.inner.info();
        tracing::debug!("{} {} complete: {}", self.prefix, runtime.id, Self::describe(&req));

        let started = Instant::now();
        let result = self.inner.complete(req).await;

        match &result {
            Ok(response) => {
                let finish = response.choices.first().and_then(|c| c.finish_reason.clone());
                tracing::debug!(
                    "{} {} generated in {:?}: prompt_tokens={} completion_tokens={} finish={:?}",
                    self.prefix,
                    runtime.id,
                    started.elapsed(),
                    response.usage.prompt_tokens,
                    response.usage.completion_tokens,
                    finish
                );
            }
            Err(e) => {
                tracing::error!(
                    "{} {} failed after {:?}: {}",
                    self.prefix,
                    runtime.id,
                    started.elapsed(),
                    e
                );
            }
        }

        result
    }

    async fn layered_complete_stream(
        &self,
        req: ChatCompletionRequest,
    ) -> Result<Box<ChatCompletionStream>, ParleyError> {
        let runtime = self.inner.info();
        tracing::debug!("{} {} stream: {}", self.prefix, runtime.id, Self::describe(&req));

        let started = Instant::now();
        let raw = self.inner.complete_stream(req).await.map_err(|e| {
            tracing::error!(
                "{} {} stream failed to open after {:?}: {}",
                self.prefix,
                runtime.id,
                started.elapsed(),
                e
            );
            e
        })?;

        let mut stats = StreamStats {
            label: format!("{} {}", self.prefix, runtime.id),
            started,
            first_chunk: None,
            chunks: 0,
        };

        Ok(Box::new(raw.map(move |chunk| {
            stats.record(&chunk);
            chunk
        })))
    }
}

impl_layered_runtime!(LoggingRuntime);

/// Per-stream counters, reported when the stream is dropped
struct StreamStats {
    label: String,
    started: Instant,
    first_chunk: Option<Duration>,
    chunks: usize,
}

impl StreamStats {
    fn record(&mut self, chunk: &Result<ChatCompletionChunk, ParleyError>) {
        match chunk {
            Ok(_) => {
                self.chunks += 1;
                if self.first_chunk.is_none() {
                    self.first_chunk = Some(self.started.elapsed());
                }
            }
            Err(e) => tracing::error!("{} stream error after {} chunks: {}", self.label, self.chunks, e),
        }
    }
}

impl Drop for StreamStats {
    fn drop(&mut self) {
        tracing::debug!(
            "{} stream closed: chunks={} first_chunk={:?} total={:?}",
            self.label,
            self.chunks,
            self.first_chunk,
            self.started.elapsed()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Debug)]
    struct FixedRuntime {
        fail: bool,
    }

    #[async_trait]
    impl ModelRuntime for FixedRuntime {
        fn info(&self) -> Arc<RuntimeInfo> {
            Arc::new(RuntimeInfo {
                id: "fixed".to_string(),
                name: "Fixed".to_string(),
                constrained_decoding: true,
            })
        }

        async fn complete(
            &self,
            _req: ChatCompletionRequest,
        ) -> Result<ChatCompletionResponse, ParleyError> {
            if self.fail {
                return Err(ParleyError::runtime("model crashed"));
            }
            Ok(ChatCompletionResponse {
                id: "fixed-1".to_string(),
                model: "fixed".to_string(),
                choices: vec![Choice {
                    index: 0,
                    message: Message::assistant("done"),
                    finish_reason: Some(FinishReason::Stop),
                }],
                usage: Usage::default(),
            })
        }

        async fn complete_stream(
            &self,
            _req: ChatCompletionRequest,
        ) -> Result<Box<ChatCompletionStream>, ParleyError> {
            Ok(Box::new(futures::stream::iter(vec![Ok(
                ChatCompletionChunk::from_delta(MessageDelta::content("done")),
            )])))
        }
    }

    fn request() -> ChatCompletionRequest {
        ChatCompletionRequest::new(vec![Message::user("hello")])
    }

    #[tokio::test]
    async fn test_passes_results_through() {
        let runtime = LoggingLayer::with_prefix("[test]").layer(FixedRuntime { fail: false });

        assert_eq!(runtime.info().id, "fixed");

        let response = runtime.complete(request()).await.unwrap();
        assert_eq!(response.choices[0].message.content, "done");

        let chunks: Vec<_> = runtime
            .complete_stream(request())
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(chunks.len(), 1);
    }

    #[tokio::test]
    async fn test_passes_errors_through() {
        let runtime = LoggingLayer::new().layer(FixedRuntime { fail: true });

        let err = runtime.complete(request()).await.unwrap_err();
        assert_eq!(err.reason(), "model crashed");
    }
}
