//! `Transformer` contract plus the HTTP provider shell that drives the
//! 7-step select → hooks → transform → call → evaluate sequence.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dispatch_core::{Account, DispatchContext, HttpRequestSpec, Message, ProviderConfig, SendResult};

use crate::error::DispatchError;
use crate::evaluator::{self, ResponseEvaluatorConfig};
use crate::provider::{Provider, ProviderSendOptions};
use crate::selection;

/// A provider plug-in's message-to-HTTP-request mapping. `account` is the
/// credential set chosen by the selection algorithm for this send.
#[async_trait]
pub trait Transformer<A: Account>: Send + Sync {
    /// Whether this transformer handles `message` at all (channel + shape).
    fn can_transform(&self, message: &dyn Message) -> bool;

    /// Build the outgoing request, and optionally override the shell's
    /// default response evaluator for this call.
    async fn transform(
        &self,
        ctx: &DispatchContext,
        message: &dyn Message,
        account: &A,
    ) -> Result<(HttpRequestSpec, Option<ResponseEvaluatorConfig>), DispatchError>;
}

/// Generic HTTP provider shell: given a validated [`ProviderConfig`] and a
/// [`Transformer`], implements [`Provider`] for any message the transformer
/// accepts.
pub struct HttpProviderShell<A: Account, T: Transformer<A>> {
    config: Arc<ProviderConfig<A>>,
    transformer: T,
    default_evaluator: ResponseEvaluatorConfig,
    client: reqwest::Client,
}

impl<A: Account, T: Transformer<A>> HttpProviderShell<A, T> {
    pub fn new(config: Arc<ProviderConfig<A>>, transformer: T, default_evaluator: ResponseEvaluatorConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent("dispatchkit/0.1")
            .build()
            .expect("default reqwest client configuration is valid");
        Self { config, transformer, default_evaluator, client }
    }
}

#[async_trait]
impl<A: Account + 'static, T: Transformer<A> + 'static> Provider for HttpProviderShell<A, T> {
    async fn send(
        &self,
        ctx: &DispatchContext,
        message: &dyn Message,
        options: &ProviderSendOptions,
    ) -> Result<SendResult, DispatchError> {
        // Step 1: the transformer's own predicate gates which messages it
        // accepts at all, before any selection/hook work happens.
        if !self.transformer.can_transform(message) {
            return Err(DispatchError::unsupported_message(message.channel_type().to_string()));
        }

        // Step 2: account selection, honoring any context override.
        let account = selection::select(&self.config, ctx, None)?;

        // Step 3: before-hooks may adjust the context (route/metadata) and
        // abort the send outright before the transformer ever runs.
        let mut ctx = ctx.clone();
        for hook in &options.before_hooks {
            hook(&mut ctx)?;
        }

        // Step 4: build the request; apply the default Content-Type if the
        // transformer didn't set one.
        let (mut spec, evaluator_override) = self.transformer.transform(&ctx, message, &account).await?;
        spec.apply_default_content_type();

        // Step 5: issue the call.
        let timeout = options.timeout.or(spec.timeout).unwrap_or(Duration::from_secs(30));
        let client = options.http_client.clone().unwrap_or_else(|| self.client.clone());
        let http_result = execute_http(&client, &spec, timeout).await;

        // Step 6: evaluate.
        let result = http_result.and_then(|send_result| {
            let evaluator = evaluator_override.as_ref().unwrap_or(&self.default_evaluator);
            evaluator::evaluate(evaluator, &send_result).map(|_| send_result)
        });

        // Step 7: after-hooks run unconditionally with the final outcome.
        for hook in &options.after_hooks {
            match &result {
                Ok(send_result) => hook(Ok(send_result)),
                Err(err) => hook(Err(&err.to_string())),
            }
        }

        result
    }
}

async fn execute_http(client: &reqwest::Client, spec: &HttpRequestSpec, timeout: Duration) -> Result<SendResult, DispatchError> {
    let method = reqwest::Method::from_bytes(spec.method.as_str().as_bytes())
        .map_err(|e| DispatchError::internal(format!("invalid method: {e}")))?;

    let mut builder = client.request(method, &spec.url).timeout(timeout);
    for (key, value) in &spec.headers {
        builder = builder.header(key, value);
    }
    if !spec.query_params.is_empty() {
        builder = builder.query(&spec.query_params);
    }
    if !spec.body.is_empty() {
        builder = builder.body(spec.body.clone());
    }

    let response = builder.send().await.map_err(|e| DispatchError::internal(e.to_string()))?;
    let status_code = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
        .collect();
    let body = response.bytes().await.map_err(|e| DispatchError::internal(e.to_string()))?.to_vec();

    Ok(SendResult { config: spec.clone(), status_code, headers, body })
}
