//! Provider decorator: the middleware pipeline (rate limit → circuit
//! breaker → retry → send) plus async dispatch, the queue worker loop, and
//! graceful shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dispatch_core::{DispatchContext, Message, RouteInfo, SendOptions, SendOptionsSnapshot, SendResult};
use dispatch_queue::{Queue, QueueError, QueueItem};
use parking_lot::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::circuit_breaker::CircuitBreaker;
use crate::error::DispatchError;
use crate::provider::{Provider, ProviderSendOptions};
use crate::rate_limiter::RateLimiter;
use crate::retry;
use crate::strategy;

/// The reliability bundle a decorator wraps a provider with. Every field is
/// optional — an empty bundle degrades to "call the provider directly".
#[derive(Default, Clone)]
pub struct SenderMiddleware {
    pub rate_limiter: Option<Arc<RateLimiter>>,
    pub circuit_breaker: Option<Arc<CircuitBreaker>>,
    pub queue: Option<Arc<dyn Queue>>,
}

impl SenderMiddleware {
    /// Layers `self` (the per-provider overrides passed to
    /// `Sender::register_provider`) onto `defaults` (the `Sender`'s global
    /// bundle), preferring `self`'s field wherever it is set.
    pub fn merged_onto(self, defaults: &SenderMiddleware) -> SenderMiddleware {
        SenderMiddleware {
            rate_limiter: self.rate_limiter.or_else(|| defaults.rate_limiter.clone()),
            circuit_breaker: self.circuit_breaker.or_else(|| defaults.circuit_breaker.clone()),
            queue: self.queue.or_else(|| defaults.queue.clone()),
        }
    }
}

/// The short sleep the worker loop takes when `dequeue` returns nothing
/// (pluggable queue backends aren't required to block).
const QUEUE_BACKOFF: Duration = Duration::from_millis(10);

pub struct ProviderDecorator<P: Provider> {
    channel: String,
    provider: Arc<P>,
    middleware: SenderMiddleware,
    closed: AtomicBool,
    worker_tasks: Mutex<JoinSet<()>>,
    /// Cancelled by `close`, so the worker loop can race a blocking
    /// `queue.dequeue()` call against shutdown instead of only noticing it
    /// on the next loop iteration.
    shutdown: CancellationToken,
    /// Set once in `new`, so methods that only borrow `&self` (e.g. through
    /// a `dyn DecoratorHandle` object) can still obtain an owned `Arc<Self>`
    /// to move into a spawned task.
    self_weak: OnceLock<Weak<Self>>,
}

impl<P: Provider + 'static> ProviderDecorator<P> {
    /// Construct the decorator. If `middleware.queue` is present, a worker
    /// task is started immediately.
    pub fn new(channel: impl Into<String>, provider: P, middleware: SenderMiddleware) -> Arc<Self> {
        let this = Arc::new(Self {
            channel: channel.into(),
            provider: Arc::new(provider),
            middleware,
            closed: AtomicBool::new(false),
            worker_tasks: Mutex::new(JoinSet::new()),
            shutdown: CancellationToken::new(),
            self_weak: OnceLock::new(),
        });
        let _ = this.self_weak.set(Arc::downgrade(&this));

        if let Some(queue) = this.middleware.queue.clone() {
            let worker_handle = Arc::clone(&this);
            this.worker_tasks.lock().spawn(async move {
                worker_handle.run_worker_loop(queue).await;
            });
        }

        this
    }

    fn arc_self(&self) -> Arc<Self> {
        self.self_weak
            .get()
            .and_then(Weak::upgrade)
            .expect("ProviderDecorator is always held behind the Arc returned by `new`")
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// The synchronous send pipeline (spec §4.H steps 1-7).
    pub async fn send(
        &self,
        ctx: &DispatchContext,
        message: Arc<dyn Message>,
        options: SendOptions,
    ) -> Result<SendResult, DispatchError> {
        if ctx.is_cancelled() {
            return Err(DispatchError::cancelled("context already cancelled"));
        }

        let start = std::time::Instant::now();
        tracing::info!(provider = %self.channel, "send start");

        if let Some(limiter) = &self.middleware.rate_limiter {
            if !options.disable_rate_limiter && !limiter.allow() {
                metrics::counter!("dispatchkit_send_total", "channel" => self.channel.clone(), "result" => "rate_limited")
                    .increment(1);
                tracing::warn!(provider = %self.channel, "rate limit exceeded");
                return Err(DispatchError::rate_limit_exceeded());
            }
        }

        let provider = Arc::clone(&self.provider);
        let provider_options = ProviderSendOptions {
            http_client: None,
            timeout: options.timeout,
            before_hooks: options.before_hooks.clone(),
            after_hooks: options.after_hooks.clone(),
        };
        let ctx = ctx.clone();
        let policy = options.retry_policy.clone().unwrap_or_default();

        let attempt_once = {
            let provider = Arc::clone(&provider);
            let ctx = ctx.clone();
            let message = Arc::clone(&message);
            let provider_options = provider_options.clone();
            move || {
                let provider = Arc::clone(&provider);
                let ctx = ctx.clone();
                let message = Arc::clone(&message);
                let provider_options = provider_options.clone();
                async move { provider.send(&ctx, message.as_ref(), &provider_options).await }
            }
        };

        let retry_ctx = ctx.clone();
        let result = match &self.middleware.circuit_breaker {
            Some(breaker) if !options.disable_circuit_breaker => {
                breaker.execute(|| run_retry_loop(retry_ctx, policy, attempt_once)).await
            }
            _ => run_retry_loop(retry_ctx, policy, attempt_once).await,
        };

        let duration = start.elapsed();
        metrics::histogram!("dispatchkit_send_duration_seconds", "channel" => self.channel.clone())
            .record(duration.as_secs_f64());
        let outcome = if result.is_ok() { "success" } else { "error" };
        metrics::counter!("dispatchkit_send_total", "channel" => self.channel.clone(), "result" => outcome).increment(1);
        tracing::info!(provider = %self.channel, success = result.is_ok(), duration_ms = duration.as_millis() as u64, "send end");

        result
    }

    /// Async dispatch (spec §4.H "Async send"): enqueue if a queue is
    /// configured, otherwise fall back to a detached task.
    pub async fn send_async(
        &self,
        ctx: DispatchContext,
        message: Arc<dyn Message>,
        mut options: SendOptions,
    ) -> Result<(), DispatchError> {
        options.r#async = true;
        options.stash_snapshot();
        let id = message.message_id().to_string();

        if let Some(queue) = &self.middleware.queue {
            let item = QueueItem {
                id: id.clone(),
                provider: self.channel.clone(),
                message: Arc::clone(&message),
                priority: options.priority,
                scheduled_at: options.delay_until,
                metadata: options.metadata.clone(),
                created_at: Utc::now(),
                callback: options.callback.clone(),
            };
            metrics::counter!("dispatchkit_queue_enqueue_total", "channel" => self.channel.clone()).increment(1);
            queue.enqueue(item).await?;
            return Ok(());
        }

        let decorator = self.arc_self();
        let callback = options.callback.clone();
        let delay_until = options.delay_until;

        self.worker_tasks.lock().spawn(async move {
            if let Some(at) = delay_until {
                let now = Utc::now();
                if at > now {
                    if let Ok(wait) = (at - now).to_std() {
                        tokio::time::sleep(wait).await;
                    }
                }
            }
            if decorator.is_closed() {
                if let Some(cb) = callback {
                    cb(&id, Err(DispatchError::cancelled("decorator closed before delayed send fired").to_string()));
                }
                return;
            }
            let result = decorator.send(&ctx, message, options).await;
            if let Some(cb) = callback {
                cb(&id, result.as_ref().map_err(|e| e.to_string()));
            }
        });

        Ok(())
    }

    async fn run_worker_loop(self: Arc<Self>, queue: Arc<dyn Queue>) {
        loop {
            if self.is_closed() {
                return;
            }
            let dequeued = tokio::select! {
                _ = self.shutdown.cancelled() => return,
                result = queue.dequeue() => result,
            };
            match dequeued {
                Ok(item) => {
                    let decorator = Arc::clone(&self);
                    tokio::spawn(async move { decorator.process_queue_item(item).await });
                }
                Err(QueueError::Closed { .. }) => return,
                Err(err) => {
                    tracing::error!(provider = %self.channel, error = %err, "queue dequeue failed");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
            tokio::time::sleep(QUEUE_BACKOFF).await;
        }
    }

    async fn process_queue_item(self: Arc<Self>, item: QueueItem) {
        let queue_latency = Utc::now() - item.created_at;
        metrics::histogram!("dispatchkit_queue_latency_seconds", "channel" => self.channel.clone())
            .record(queue_latency.num_milliseconds().max(0) as f64 / 1000.0);

        let mut options = SendOptions { r#async: true, ..Default::default() };
        if let Some(raw) = item.metadata.get(SendOptions::METADATA_KEY) {
            if let Ok(snapshot) = serde_json::from_value::<SendOptionsSnapshot>(raw.clone()) {
                apply_snapshot(&mut options, &snapshot);
            }
        }
        options.callback = item.callback.clone();

        let mut ctx = DispatchContext::new();
        if options.account_name.is_some() || options.strategy_name.is_some() {
            let strategy_type = options.strategy_name.as_deref().and_then(strategy::strategy_type_by_name);
            ctx = ctx.with_route(RouteInfo { account_name: options.account_name.clone(), strategy_type });
        }

        if let Some(at) = item.scheduled_at {
            let now = Utc::now();
            if at > now {
                if let Ok(wait) = (at - now).to_std() {
                    tokio::time::sleep(wait).await;
                }
            }
        }

        let callback = options.callback.clone();
        let result = self.send(&ctx, item.message, options).await;
        if let Some(cb) = callback {
            cb(&item.id, result.as_ref().map_err(|e| e.to_string()));
        }
    }

    /// Cancel background work, wait for it, then forward `Close` to the
    /// wrapped provider. Idempotent.
    pub async fn close(&self) -> Result<(), DispatchError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.shutdown.cancel();
        if let Some(queue) = &self.middleware.queue {
            queue.close();
        }
        let mut tasks = self.worker_tasks.lock();
        while tasks.join_next().await.is_some() {}
        drop(tasks);
        self.provider.close().await
    }
}

/// Object-safe, provider-type-erased view of a [`ProviderDecorator`], so a
/// [`crate::sender::Sender`] can hold one registry keyed by channel instead
/// of being generic over every provider type it routes to.
#[async_trait]
pub trait DecoratorHandle: Send + Sync {
    async fn send(&self, ctx: &DispatchContext, message: Arc<dyn Message>, options: SendOptions) -> Result<SendResult, DispatchError>;

    async fn send_async(&self, ctx: DispatchContext, message: Arc<dyn Message>, options: SendOptions) -> Result<(), DispatchError>;

    async fn close(&self) -> Result<(), DispatchError>;
}

#[async_trait]
impl<P: Provider + 'static> DecoratorHandle for ProviderDecorator<P> {
    async fn send(&self, ctx: &DispatchContext, message: Arc<dyn Message>, options: SendOptions) -> Result<SendResult, DispatchError> {
        ProviderDecorator::send(self, ctx, message, options).await
    }

    async fn send_async(&self, ctx: DispatchContext, message: Arc<dyn Message>, options: SendOptions) -> Result<(), DispatchError> {
        ProviderDecorator::send_async(self, ctx, message, options).await
    }

    async fn close(&self) -> Result<(), DispatchError> {
        ProviderDecorator::close(self).await
    }
}

fn apply_snapshot(options: &mut SendOptions, snapshot: &SendOptionsSnapshot) {
    options.priority = snapshot.priority;
    options.delay_until = snapshot.delay_until;
    options.timeout = snapshot.timeout_ms.map(Duration::from_millis);
    options.account_name = snapshot.account_name.clone();
    options.strategy_name = snapshot.strategy_name.clone();
    options.disable_circuit_breaker = snapshot.disable_circuit_breaker;
    options.disable_rate_limiter = snapshot.disable_rate_limiter;
}

/// `ctx`'s cancellation is raced against the backoff sleep between
/// attempts, so a caller cancelling mid-retry gets `Cancelled` back
/// immediately instead of waiting out the remaining delay.
async fn run_retry_loop<F, Fut>(ctx: DispatchContext, policy: dispatch_core::RetryPolicy, attempt_once: F) -> Result<SendResult, DispatchError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<SendResult, DispatchError>>,
{
    let mut attempt = 0u32;
    loop {
        match attempt_once().await {
            Ok(result) => return Ok(result),
            Err(err) => {
                if err.is_terminal() || !retry::should_retry(&policy, attempt, &err) {
                    return if attempt > 0 { Err(DispatchError::retry_exhausted(attempt + 1, err)) } else { Err(err) };
                }
                let delay = retry::next_delay(&policy, attempt);
                tokio::select! {
                    _ = ctx.cancelled() => {
                        return Err(DispatchError::cancelled("context cancelled during retry backoff"));
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
        }
    }
}
