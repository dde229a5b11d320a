//! Admission layer bounding in-flight runtime calls.
//!
//! A local model saturates its hardware with one generation, so concurrent
//! calls either queue up or get turned away. Streaming calls hold their slot
//! until the stream is dropped or finishes.

use parley_core::error::ParleyError;
use parley_core::impl_layered_runtime;
use parley_core::layer::{Layer, LayeredRuntime};
use parley_core::model::{ChatCompletionStream, ModelRuntime};
use parley_core::types::*;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// What to do when every slot is taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overflow {
    /// Wait for a slot
    Wait,
    /// Fail immediately with a runtime error
    Reject,
}

/// Queue layer configuration
#[derive(Debug, Clone)]
pub struct QueueLayer {
    capacity: usize,
    overflow: Overflow,
}

impl QueueLayer {
    /// One call at a time, later callers wait
    pub fn new() -> Self {
        Self {
            capacity: 1,
            overflow: Overflow::Wait,
        }
    }

    /// Set how many calls may run at once
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Set the overflow policy
    pub fn with_overflow(mut self, overflow: Overflow) -> Self {
        self.overflow = overflow;
        self
    }
}

impl Default for QueueLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ModelRuntime> Layer<R> for QueueLayer {
    type LayeredRuntime = QueueRuntime<R>;

    fn layer(&self, inner: R) -> Self::LayeredRuntime {
        QueueRuntime {
            inner,
            slots: Arc::new(Semaphore::new(self.capacity)),
            overflow: self.overflow,
        }
    }
}

/// Runtime wrapped with an admission queue
#[derive(Debug)]
pub struct QueueRuntime<R> {
    inner: R,
    slots: Arc<Semaphore>,
    overflow: Overflow,
}

impl<R: ModelRuntime> QueueRuntime<R> {
    /// Number of free slots right now
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    async fn admit(&self) -> Result<OwnedSemaphorePermit, ParleyError> {
        match self.overflow {
            Overflow::Wait => self
                .slots
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| ParleyError::runtime("runtime queue closed")),
            Overflow::Reject => self.slots.clone().try_acquire_owned().map_err(|_| {
                tracing::debug!("rejecting call, all {} slots busy", self.slots.available_permits());
                ParleyError::runtime("runtime busy")
            }),
        }
    }
}

#[async_trait]
impl<R: ModelRuntime> LayeredRuntime for QueueRuntime<R> {
    type Inner = R;

    fn inner(&self) -> &Self::Inner {
        &self.inner
    }

    async fn layered_complete(
        &self,
        req: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ParleyError> {
        let _slot = self.admit().await?;
        self.inner.complete(req).await
    }

    async fn layered_complete_stream(
        &self,
        req: ChatCompletionRequest,
    ) -> Result<Box<ChatCompletionStream>, ParleyError> {
        let slot = self.admit().await?;
        let inner = self.inner.complete_stream(req).await?;

        Ok(Box::new(SlotStream {
            inner,
            slot: Some(slot),
        }))
    }
}

impl_layered_runtime!(QueueRuntime);

/// Runtime stream that owns a queue slot until it ends or is dropped
struct SlotStream {
    inner: Box<ChatCompletionStream>,
    slot: Option<OwnedSemaphorePermit>,
}

impl Stream for SlotStream {
    type Item = Result<ChatCompletionChunk, ParleyError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let polled = Pin::new(&mut self.inner).poll_next(cx);
        if let Poll::Ready(None) = polled {
            self.slot = None;
        }
        polled
    }
}
