//! Context carriers — per-request routing overrides and metadata.
//!
//! Go/Java thread through an implicit `context.Context`/thread-local; Rust
//! has no equivalent ambient carrier, so `dispatchkit` makes the override
//! explicit as a [`DispatchContext`] value threaded through `Sender` and
//! `ProviderDecorator` calls. The constructor/accessor names below mirror
//! the spec's `WithRoute`/`GetRoute`/`WithMetadata`/`GetMetadata` helpers so
//! the opaque-key intent survives the translation to an explicit struct.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;

use crate::account::StrategyType;

/// Overrides selection: pin a specific account and/or strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteInfo {
    pub account_name: Option<String>,
    pub strategy_type: Option<StrategyType>,
}

/// Arbitrary tags forwarded to providers/evaluators.
pub type Metadata = HashMap<String, serde_json::Value>;

/// The per-send context carried alongside a message through the pipeline.
///
/// Cancellation is backed by a [`CancellationToken`] rather than a plain
/// bool: cloning a `DispatchContext` (as every layer of the pipeline does
/// to move it into a spawned task) shares the same underlying token, so
/// calling [`Self::cancel`] on any clone is visible to all of them and to
/// anything awaiting [`Self::cancelled`].
#[derive(Debug, Clone, Default)]
pub struct DispatchContext {
    route: Option<RouteInfo>,
    metadata: Metadata,
    cancellation: CancellationToken,
}

impl DispatchContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_route(mut self, route: RouteInfo) -> Self {
        self.route = Some(route);
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn get_route(&self) -> Option<&RouteInfo> {
        self.route.as_ref()
    }

    pub fn get_metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// A clone of the underlying token, for callers that need to race a
    /// future against cancellation with `tokio::select!` instead of
    /// polling [`Self::is_cancelled`].
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Resolves once this context (or any clone sharing its token) is
    /// cancelled.
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await
    }
}
