//! Stream translation.
//!
//! Re-shapes a runtime's raw delta stream into [`StreamEvent`]s a client can
//! render directly. Chat-template markers are matched against a
//! [`MarkerVocabulary`], so switching templates never touches the state
//! machine itself.

use crate::error::ParleyError;
use crate::types::{ChatCompletionChunk, MessageDelta, StreamEvent};
use futures::Stream;
use pin_project::pin_project;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

/// Special tokens that open and close a turn in a chat template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerVocabulary {
    pub turn_start: String,
    pub turn_end: String,
}

impl MarkerVocabulary {
    pub fn new(turn_start: impl Into<String>, turn_end: impl Into<String>) -> Self {
        Self {
            turn_start: turn_start.into(),
            turn_end: turn_end.into(),
        }
    }

    /// ChatML markers
    pub fn chatml() -> Self {
        Self::new("<|im_start|>", "<|im_end|>")
    }

    /// Llama 3 instruct markers
    pub fn llama3() -> Self {
        Self::new("<|start_header_id|>", "<|eot_id|>")
    }
}

impl Default for MarkerVocabulary {
    fn default() -> Self {
        Self::chatml()
    }
}

/// Position of the translator within a single turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// No delta with a role or text has arrived yet
    AwaitingRole,
    /// The turn is producing text
    InTurn,
    /// Terminal: end marker seen, stream exhausted or failed
    Ended,
}

/// Events produced by one delta: at most two, in order.
type Emitted = Option<(StreamEvent, Option<StreamEvent>)>;

/// The per-delta rules, separate from any stream plumbing.
#[derive(Debug, Clone)]
pub struct TurnMachine {
    vocabulary: MarkerVocabulary,
    state: TurnState,
}

impl TurnMachine {
    pub fn new(vocabulary: MarkerVocabulary) -> Self {
        Self {
            vocabulary,
            state: TurnState::AwaitingRole,
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Mark the turn finished without an end marker
    pub fn end(&mut self) {
        self.state = TurnState::Ended;
    }

    /// Apply one delta.
    ///
    /// Rules, first match wins:
    /// 1. text containing the end marker ends the turn; text before the marker
    ///    is still emitted
    /// 2. text that is only a start marker drops the whole delta, role included
    /// 3. a role opens the turn
    /// 4. any other text is passed through verbatim
    pub fn on_delta(&mut self, delta: MessageDelta) -> Emitted {
        if self.state == TurnState::Ended {
            return None;
        }

        let text = delta.content.unwrap_or_default();

        if let Some(at) = text.find(&self.vocabulary.turn_end) {
            self.state = TurnState::Ended;
            let before = &text[..at];
            if before.is_empty() || self.is_start_marker(before) {
                return Some((StreamEvent::EndOfTurn, None));
            }
            return Some((
                StreamEvent::TextChunk(before.to_string()),
                Some(StreamEvent::EndOfTurn),
            ));
        }

        if self.is_start_marker(&text) {
            return None;
        }

        let chunk = (!text.is_empty()).then(|| StreamEvent::TextChunk(text));

        match (delta.role, chunk) {
            (Some(role), chunk) => {
                self.state = TurnState::InTurn;
                Some((StreamEvent::RoleAnnounce(role), chunk))
            }
            (None, Some(chunk)) => {
                self.state = TurnState::InTurn;
                Some((chunk, None))
            }
            (None, None) => None,
        }
    }

    fn is_start_marker(&self, text: &str) -> bool {
        text.trim() == self.vocabulary.turn_start
    }
}

/// Stream adapter applying [`TurnMachine`] to raw runtime chunks.
///
/// Once the turn ends the inner stream is dropped immediately, releasing the
/// runtime's generation resources. A runtime error is forwarded once and
/// also ends the turn.
#[pin_project]
pub struct StreamTranslator<S> {
    #[pin]
    inner: Option<S>,
    machine: TurnMachine,
    pending: Option<StreamEvent>,
}

impl<S> StreamTranslator<S>
where
    S: Stream<Item = Result<ChatCompletionChunk, ParleyError>>,
{
    pub fn new(inner: S, vocabulary: MarkerVocabulary) -> Self {
        Self {
            inner: Some(inner),
            machine: TurnMachine::new(vocabulary),
            pending: None,
        }
    }

    pub fn state(&self) -> TurnState {
        self.machine.state()
    }
}

impl<S> Stream for StreamTranslator<S>
where
    S: Stream<Item = Result<ChatCompletionChunk, ParleyError>>,
{
    type Item = Result<StreamEvent, ParleyError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if let Some(event) = this.pending.take() {
                return Poll::Ready(Some(Ok(event)));
            }

            let Some(inner) = this.inner.as_mut().as_pin_mut() else {
                return Poll::Ready(None);
            };

            match ready!(inner.poll_next(cx)) {
                Some(Ok(chunk)) => {
                    let Some(choice) = chunk.choices.into_iter().next() else {
                        continue;
                    };
                    let emitted = this.machine.on_delta(choice.delta);

                    if this.machine.state() == TurnState::Ended {
                        this.inner.set(None);
                    }

                    if let Some((first, second)) = emitted {
                        *this.pending = second;
                        return Poll::Ready(Some(Ok(first)));
                    }
                }
                Some(Err(err)) => {
                    this.machine.end();
                    this.inner.set(None);
                    return Poll::Ready(Some(Err(err)));
                }
                None => {
                    this.machine.end();
                    this.inner.set(None);
                    return Poll::Ready(None);
                }
            }
        }
    }
}

/// Translate a raw delta stream using the given marker vocabulary
pub fn translate<S>(raw: S, vocabulary: MarkerVocabulary) -> StreamTranslator<S>
where
    S: Stream<Item = Result<ChatCompletionChunk, ParleyError>>,
{
    StreamTranslator::new(raw, vocabulary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn chunks(
        deltas: Vec<MessageDelta>,
    ) -> impl Stream<Item = Result<ChatCompletionChunk, ParleyError>> {
        futures::stream::iter(
            deltas
                .into_iter()
                .map(|delta| Ok(ChatCompletionChunk::from_delta(delta))),
        )
    }

    async fn events(deltas: Vec<MessageDelta>) -> Vec<StreamEvent> {
        translate(chunks(deltas), MarkerVocabulary::chatml())
            .map(|event| event.unwrap())
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_role_text_end() {
        let out = events(vec![
            MessageDelta::role(Role::Assistant),
            MessageDelta::content("Hello"),
            MessageDelta::content("<|im_end|>"),
        ])
        .await;

        assert_eq!(
            out,
            vec![
                StreamEvent::RoleAnnounce(Role::Assistant),
                StreamEvent::TextChunk("Hello".to_string()),
                StreamEvent::EndOfTurn,
            ]
        );
    }

    #[tokio::test]
    async fn test_start_marker_is_suppressed() {
        let out = events(vec![
            MessageDelta::content("<|im_start|>"),
            MessageDelta::role(Role::Assistant),
            MessageDelta::content("Hi"),
        ])
        .await;

        assert_eq!(
            out,
            vec![
                StreamEvent::RoleAnnounce(Role::Assistant),
                StreamEvent::TextChunk("Hi".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_role_and_content_in_one_delta() {
        let out = events(vec![MessageDelta {
            role: Some(Role::Assistant),
            content: Some("Sure".to_string()),
        }])
        .await;

        assert_eq!(
            out,
            vec![
                StreamEvent::RoleAnnounce(Role::Assistant),
                StreamEvent::TextChunk("Sure".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_text_before_end_marker_is_kept() {
        let out = events(vec![MessageDelta::content("bye.<|im_end|>")]).await;

        assert_eq!(
            out,
            vec![
                StreamEvent::TextChunk("bye.".to_string()),
                StreamEvent::EndOfTurn,
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_deltas_emit_nothing() {
        let out = events(vec![
            MessageDelta::default(),
            MessageDelta::content(""),
            MessageDelta::content("a"),
        ])
        .await;

        assert_eq!(out, vec![StreamEvent::TextChunk("a".to_string())]);
    }

    #[tokio::test]
    async fn test_stops_consuming_after_end_marker() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = pulled.clone();
        let raw = chunks(vec![
            MessageDelta::content("done"),
            MessageDelta::content("<|im_end|>"),
            MessageDelta::content("leaked"),
            MessageDelta::content("more"),
        ])
        .inspect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let mut translator = translate(raw, MarkerVocabulary::chatml());
        let mut out = Vec::new();
        while let Some(event) = translator.next().await {
            out.push(event.unwrap());
        }

        assert_eq!(
            out,
            vec![StreamEvent::TextChunk("done".to_string()), StreamEvent::EndOfTurn]
        );
        assert_eq!(pulled.load(Ordering::SeqCst), 2);
        assert_eq!(translator.state(), TurnState::Ended);
    }

    #[tokio::test]
    async fn test_error_is_forwarded_once_and_ends() {
        let raw = futures::stream::iter(vec![
            Ok(ChatCompletionChunk::from_delta(MessageDelta::content("part"))),
            Err(ParleyError::runtime("decode failed")),
            Ok(ChatCompletionChunk::from_delta(MessageDelta::content("never"))),
        ]);

        let out: Vec<_> = translate(raw, MarkerVocabulary::chatml()).collect().await;

        assert_eq!(out.len(), 2);
        assert_eq!(
            out[0].as_ref().unwrap(),
            &StreamEvent::TextChunk("part".to_string())
        );
        assert!(matches!(out[1], Err(ParleyError::Runtime(_))));
    }

    #[tokio::test]
    async fn test_swapped_vocabulary() {
        let raw = chunks(vec![
            MessageDelta::content("<|start_header_id|>"),
            MessageDelta::content("Hey"),
            MessageDelta::content("<|eot_id|>"),
        ]);

        let out: Vec<_> = translate(raw, MarkerVocabulary::llama3())
            .map(|event| event.unwrap())
            .collect()
            .await;

        assert_eq!(
            out,
            vec![StreamEvent::TextChunk("Hey".to_string()), StreamEvent::EndOfTurn]
        );
    }

    #[test]
    fn test_machine_states() {
        let mut machine = TurnMachine::new(MarkerVocabulary::chatml());
        assert_eq!(machine.state(), TurnState::AwaitingRole);

        machine.on_delta(MessageDelta::role(Role::Assistant));
        assert_eq!(machine.state(), TurnState::InTurn);

        machine.on_delta(MessageDelta::content("<|im_end|>"));
        assert_eq!(machine.state(), TurnState::Ended);
        assert_eq!(machine.on_delta(MessageDelta::content("late")), None);
    }

    #[test]
    fn test_start_marker_with_role_emits_nothing() {
        let mut machine = TurnMachine::new(MarkerVocabulary::chatml());

        let emitted = machine.on_delta(MessageDelta {
            role: Some(Role::Assistant),
            content: Some("<|im_start|>".to_string()),
        });

        assert_eq!(emitted, None);
        assert_eq!(machine.state(), TurnState::AwaitingRole);

        let emitted = machine.on_delta(MessageDelta::role(Role::Assistant));
        assert_eq!(emitted, Some((StreamEvent::RoleAnnounce(Role::Assistant), None)));
    }
}
