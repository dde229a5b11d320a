//! Stub runtimes for unit tests.

use crate::error::ParleyError;
use crate::model::{ChatCompletionStream, ModelRuntime};
use crate::types::*;
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// What a blocking call answers with
#[derive(Debug, Clone)]
pub enum Reply {
    Content(String),
    NoChoices,
    Fail(String),
}

/// Scripted runtime that counts every call and every delta it produces.
#[derive(Debug)]
pub struct ScriptedRuntime {
    info: Arc<RuntimeInfo>,
    reply: Reply,
    deltas: Vec<Result<MessageDelta, String>>,
    open_error: Option<String>,
    pub complete_calls: AtomicUsize,
    pub stream_calls: AtomicUsize,
    pub produced: Arc<AtomicUsize>,
    pub last_request: Mutex<Option<ChatCompletionRequest>>,
}

impl ScriptedRuntime {
    pub fn new(reply: Reply) -> Self {
        Self {
            info: Arc::new(RuntimeInfo {
                id: "scripted".to_string(),
                name: "Scripted".to_string(),
                constrained_decoding: true,
            }),
            reply,
            deltas: Vec::new(),
            open_error: None,
            complete_calls: AtomicUsize::new(0),
            stream_calls: AtomicUsize::new(0),
            produced: Arc::new(AtomicUsize::new(0)),
            last_request: Mutex::new(None),
        }
    }

    pub fn streaming(deltas: Vec<Result<MessageDelta, String>>) -> Self {
        Self {
            deltas,
            ..Self::new(Reply::NoChoices)
        }
    }

    pub fn failing_to_open(reason: &str) -> Self {
        Self {
            open_error: Some(reason.to_string()),
            ..Self::new(Reply::NoChoices)
        }
    }

    pub fn without_constrained_decoding(mut self) -> Self {
        self.info = Arc::new(RuntimeInfo {
            constrained_decoding: false,
            ..(*self.info).clone()
        });
        self
    }

    pub fn calls(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst) + self.stream_calls.load(Ordering::SeqCst)
    }

    pub fn produced(&self) -> usize {
        self.produced.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> ChatCompletionRequest {
        self.last_request
            .lock()
            .unwrap()
            .clone()
            .expect("runtime was never called")
    }
}

#[async_trait]
impl ModelRuntime for ScriptedRuntime {
    fn info(&self) -> Arc<RuntimeInfo> {
        self.info.clone()
    }

    async fn complete(
        &self,
        req: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ParleyError> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(req);

        let choices = match &self.reply {
            Reply::Fail(reason) => return Err(ParleyError::runtime(reason.clone())),
            Reply::NoChoices => Vec::new(),
            Reply::Content(text) => vec![Choice {
                index: 0,
                message: Message::assistant(text.clone()),
                finish_reason: Some(FinishReason::Stop),
            }],
        };

        Ok(ChatCompletionResponse {
            id: "cmpl-1".to_string(),
            model: "scripted".to_string(),
            choices,
            usage: Usage::default(),
        })
    }

    async fn complete_stream(
        &self,
        req: ChatCompletionRequest,
    ) -> Result<Box<ChatCompletionStream>, ParleyError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(req);

        if let Some(reason) = &self.open_error {
            return Err(ParleyError::runtime(reason.clone()));
        }

        let produced = self.produced.clone();
        let stream = futures::stream::iter(self.deltas.clone()).map(move |delta| {
            produced.fetch_add(1, Ordering::SeqCst);
            delta
                .map(ChatCompletionChunk::from_delta)
                .map_err(ParleyError::runtime)
        });

        Ok(Box::new(stream))
    }
}
