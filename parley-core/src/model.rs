//! Model runtime trait and stream helpers.

use crate::error::ParleyError;
use crate::types::*;
use async_trait::async_trait;
use futures::Stream;
use std::fmt::Debug;
use std::sync::Arc;

/// Stream type alias for raw chat completion chunks
pub type ChatCompletionStream =
    dyn Stream<Item = Result<ChatCompletionChunk, ParleyError>> + Send + Unpin;

/// Capability interface of a loaded model.
///
/// One runtime instance is created at startup and shared by every request.
/// Implementations receive the entire conversation on each call and keep no
/// state between calls. Dropping a stream returned by
/// [`complete_stream`](ModelRuntime::complete_stream) must stop generation.
#[async_trait]
pub trait ModelRuntime: Send + Sync + Debug + 'static {
    /// Get runtime information
    fn info(&self) -> Arc<RuntimeInfo>;

    /// Blocking chat completion
    async fn complete(
        &self,
        req: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ParleyError>;

    /// Streaming chat completion
    ///
    /// Returns a lazy stream of token deltas.
    async fn complete_stream(
        &self,
        req: ChatCompletionRequest,
    ) -> Result<Box<ChatCompletionStream>, ParleyError>;
}

#[async_trait]
impl<R: ModelRuntime + ?Sized> ModelRuntime for Arc<R> {
    fn info(&self) -> Arc<RuntimeInfo> {
        (**self).info()
    }

    async fn complete(
        &self,
        req: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ParleyError> {
        (**self).complete(req).await
    }

    async fn complete_stream(
        &self,
        req: ChatCompletionRequest,
    ) -> Result<Box<ChatCompletionStream>, ParleyError> {
        (**self).complete_stream(req).await
    }
}

/// Fold a translated event stream back into the reply text.
///
/// Role prefixes, end-of-turn boundaries and abort notices are dropped, which
/// leaves exactly what should be stored as the assistant's turn in history.
pub async fn collect_text<S>(stream: S) -> String
where
    S: Stream<Item = StreamEvent>,
{
    use futures::StreamExt;

    futures::pin_mut!(stream);
    let mut content = String::new();

    while let Some(event) = stream.next().await {
        if let StreamEvent::TextChunk(text) = event {
            content.push_str(&text);
        }
    }

    content
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_collect_text_keeps_only_chunks() {
        let events = futures::stream::iter(vec![
            StreamEvent::RoleAnnounce(Role::Assistant),
            StreamEvent::TextChunk("Hello".to_string()),
            StreamEvent::TextChunk(" there".to_string()),
            StreamEvent::EndOfTurn,
        ]);

        assert_eq!(collect_text(events).await, "Hello there");
    }

    #[tokio::test]
    async fn test_collect_text_skips_abort_notice() {
        let events = futures::stream::iter(vec![
            StreamEvent::TextChunk("Once".to_string()),
            StreamEvent::Aborted("connection reset".to_string()),
        ]);

        assert_eq!(collect_text(events).await, "Once");
    }
}
