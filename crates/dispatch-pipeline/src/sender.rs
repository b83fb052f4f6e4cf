//! Top-level registrar: routes a message to the decorator registered for
//! its channel, validating before it ever reaches the pipeline.

use std::sync::Arc;

use dashmap::DashMap;
use dispatch_core::{ChannelType, DispatchContext, Message, SendOptions, SendResult};

use crate::decorator::{DecoratorHandle, ProviderDecorator, SenderMiddleware};
use crate::error::DispatchError;
use crate::provider::Provider;

/// Owns one decorator per [`ChannelType`] and forwards sends to it by the
/// message's own channel. Unconfigured channels fail fast with
/// `provider-not-configured` rather than silently dropping the message.
#[derive(Default)]
pub struct Sender {
    providers: DashMap<ChannelType, Arc<dyn DecoratorHandle>>,
    default_middleware: SenderMiddleware,
}

impl Sender {
    pub fn new() -> Self {
        Self::default()
    }

    /// A `Sender` whose providers inherit `default_middleware` for any field
    /// left unset in the bundle passed to [`Self::register_provider`] — e.g.
    /// a shared rate limiter applied across every channel unless a provider
    /// registers its own.
    pub fn with_default_middleware(default_middleware: SenderMiddleware) -> Self {
        Self { providers: DashMap::new(), default_middleware }
    }

    /// Install a provider for `channel`, wrapping it in a decorator built
    /// from `middleware` layered onto the `Sender`'s default bundle (fields
    /// `middleware` leaves `None` fall back to the default). Replaces any
    /// provider already registered for the same channel.
    pub fn register_provider<P: Provider + 'static>(
        &self,
        channel: ChannelType,
        provider: P,
        middleware: SenderMiddleware,
    ) {
        let middleware = middleware.merged_onto(&self.default_middleware);
        let decorator = ProviderDecorator::new(channel.to_string(), provider, middleware);
        self.providers.insert(channel, decorator);
    }

    fn lookup(&self, channel: ChannelType) -> Result<Arc<dyn DecoratorHandle>, DispatchError> {
        self.providers
            .get(&channel)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| DispatchError::provider_not_configured(channel.to_string()))
    }

    /// Route `message` to its channel's decorator and discard the result,
    /// keeping only whether it succeeded.
    pub async fn send(&self, ctx: &DispatchContext, message: Arc<dyn Message>, options: SendOptions) -> Result<(), DispatchError> {
        self.send_with_result(ctx, message, options).await.map(|_| ())
    }

    /// Same routing as [`Self::send`], returning the provider's
    /// [`SendResult`] on success.
    pub async fn send_with_result(
        &self,
        ctx: &DispatchContext,
        message: Arc<dyn Message>,
        options: SendOptions,
    ) -> Result<SendResult, DispatchError> {
        message.validate().map_err(|e| DispatchError::validation_failed(e.to_string()))?;
        let decorator = self.lookup(message.channel_type())?;
        decorator.send(ctx, message, options).await
    }

    /// Fire-and-forget dispatch: validates up front, then hands off to the
    /// channel's decorator (queue or detached task) without waiting for the
    /// outcome. Deliver results via `options.callback` instead.
    pub async fn send_async(&self, ctx: DispatchContext, message: Arc<dyn Message>, options: SendOptions) -> Result<(), DispatchError> {
        message.validate().map_err(|e| DispatchError::validation_failed(e.to_string()))?;
        let decorator = self.lookup(message.channel_type())?;
        decorator.send_async(ctx, message, options).await
    }

    /// Close every registered decorator, in registration order is not
    /// guaranteed — decorators don't depend on each other.
    pub async fn close(&self) -> Result<(), DispatchError> {
        for entry in self.providers.iter() {
            entry.value().close().await?;
        }
        Ok(())
    }
}
