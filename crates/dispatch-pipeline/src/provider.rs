//! The base `Provider` contract a [`crate::decorator::ProviderDecorator`]
//! wraps — either an [`crate::transformer::HttpProviderShell`] or a
//! non-HTTP provider (e.g. SMTP) implementing it directly.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dispatch_core::{AfterHook, BeforeHook, DispatchContext, Message, SendResult};

use crate::error::DispatchError;

/// Per-send overrides that don't affect selection or retry, only how the
/// underlying transport call is made.
#[derive(Clone, Default)]
pub struct ProviderSendOptions {
    pub http_client: Option<reqwest::Client>,
    pub timeout: Option<Duration>,
    pub before_hooks: Vec<BeforeHook>,
    pub after_hooks: Vec<AfterHook>,
}

#[async_trait]
pub trait Provider: Send + Sync {
    async fn send(
        &self,
        ctx: &DispatchContext,
        message: &dyn Message,
        options: &ProviderSendOptions,
    ) -> Result<SendResult, DispatchError>;

    /// Forwarded by `ProviderDecorator::close` if the provider holds
    /// resources (e.g. an SMTP transport) that need releasing.
    async fn close(&self) -> Result<(), DispatchError> {
        Ok(())
    }
}

/// Convenience for call sites that only have an `Arc<dyn Provider>`.
pub type SharedProvider = Arc<dyn Provider>;
