//! Layer trait and abstractions.
//!
//! Layers wrap a model runtime with cross-cutting concerns such as logging or
//! admission control. A layered runtime is itself a runtime, so layers stack.

use crate::error::ParleyError;
use crate::model::ModelRuntime;
use crate::types::*;
use async_trait::async_trait;
use std::sync::Arc;

/// Layer trait for wrapping runtimes.
///
/// Each layer wraps an inner runtime and returns a new runtime with enhanced
/// behaviour.
pub trait Layer<R: ModelRuntime> {
    /// The type of the layered runtime
    type LayeredRuntime: ModelRuntime;

    /// Wrap the inner runtime with this layer
    fn layer(&self, inner: R) -> Self::LayeredRuntime;
}

/// Helper trait for layered runtimes.
///
/// Provides default forwarding implementations for the runtime methods.
/// Implementers only override the methods they want to intercept.
#[async_trait]
pub trait LayeredRuntime: Sized + ModelRuntime {
    /// The inner runtime type
    type Inner: ModelRuntime;

    /// Get a reference to the inner runtime
    fn inner(&self) -> &Self::Inner;

    /// Default implementation for info - forwards to inner
    fn layered_info(&self) -> Arc<RuntimeInfo> {
        self.inner().info()
    }

    /// Default implementation for complete - forwards to inner
    async fn layered_complete(
        &self,
        req: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ParleyError> {
        self.inner().complete(req).await
    }

    /// Default implementation for complete_stream - forwards to inner
    async fn layered_complete_stream(
        &self,
        req: ChatCompletionRequest,
    ) -> Result<Box<crate::model::ChatCompletionStream>, ParleyError> {
        self.inner().complete_stream(req).await
    }
}

/// Implement `ModelRuntime` for a type by forwarding to its `LayeredRuntime` methods.
#[macro_export]
macro_rules! impl_layered_runtime {
    ($type:ident) => {
        #[async_trait::async_trait]
        impl<R: $crate::model::ModelRuntime> $crate::model::ModelRuntime for $type<R> {
            fn info(&self) -> std::sync::Arc<$crate::types::RuntimeInfo> {
                $crate::layer::LayeredRuntime::layered_info(self)
            }

            async fn complete(
                &self,
                req: $crate::types::ChatCompletionRequest,
            ) -> Result<$crate::types::ChatCompletionResponse, $crate::error::ParleyError> {
                $crate::layer::LayeredRuntime::layered_complete(self, req).await
            }

            async fn complete_stream(
                &self,
                req: $crate::types::ChatCompletionRequest,
            ) -> Result<Box<$crate::model::ChatCompletionStream>, $crate::error::ParleyError>
            {
                $crate::layer::LayeredRuntime::layered_complete_stream(self, req).await
            }
        }
    };
}
