//! End-to-end pipeline scenarios: account selection, retry, rate limiting,
//! async dispatch with callbacks, and account override, driven through the
//! real `ProviderDecorator` against a `wiremock` server. The two
//! vendor-specific signing scenarios (Aliyun, Lark) are checked at the
//! transformer-output level here since their endpoints are fixed vendor
//! hosts; their response-evaluation halves are covered in
//! `dispatch-pipeline`'s evaluator unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dispatch_core::{ChannelType, DispatchContext, ProviderConfig, RetryPolicy, RouteInfo, SendOptions, StrategyType};
use dispatch_pipeline::decorator::SenderMiddleware;
use dispatch_pipeline::rate_limiter::RateLimiter;
use dispatch_pipeline::transformer::{HttpProviderShell, Transformer};
use dispatch_pipeline::ProviderDecorator;

use dispatch_providers::{AliyunSmsTransformer, LarkTransformer, ProviderAccount, SignedWebhookTransformer, SmsMessage, TextMessage};

fn webhook_account(name: &str, url: String) -> ProviderAccount {
    ProviderAccount::new(name, url, "")
}

fn webhook_shell(accounts: Vec<ProviderAccount>) -> HttpProviderShell<ProviderAccount, SignedWebhookTransformer> {
    let config = Arc::new(ProviderConfig::new(accounts, StrategyType::RoundRobin));
    HttpProviderShell::new(config, SignedWebhookTransformer, Default::default())
}

// Scenario 1: Aliyun SMS happy path — the transform output is the signed,
// form-encoded `SendSms` request the real service expects.
#[tokio::test]
async fn aliyun_transform_builds_a_signed_form_request() {
    let account = ProviderAccount::new("primary", "LTAI", "s").with_extra("region", "cn-hangzhou");
    let message = SmsMessage::new(vec!["13800138000".to_string()], "SMS_x", serde_json::json!({"code": "1234"}));
    let ctx = DispatchContext::new();

    let (spec, evaluator) = AliyunSmsTransformer.transform(&ctx, &message, &account).await.unwrap();

    assert_eq!(spec.method, http::Method::POST);
    assert!(spec.url.starts_with("https://dysmsapi.aliyuncs.com/"));
    assert_eq!(spec.body_type, dispatch_core::BodyType::Form);
    let body = String::from_utf8(spec.body).unwrap();
    assert!(body.contains("AccessKeyId=LTAI"));
    assert!(body.contains("Signature="));
    assert!(evaluator.is_some());
}

// Scenario 2: Lark webhook signed send — query carries `timestamp`/`sign`
// built from the documented `HMAC-SHA256("{timestamp}\n{secret}", "")`.
#[tokio::test]
async fn lark_transform_signs_the_query_string() {
    let account = ProviderAccount::new("primary", "hook123", "secret");
    let message = TextMessage::new(ChannelType::Lark, "ping");
    let ctx = DispatchContext::new();

    let (spec, _) = LarkTransformer.transform(&ctx, &message, &account).await.unwrap();

    assert!(spec.url.contains("/bot/v2/hook/hook123"));
    assert!(spec.query_params.contains_key("timestamp"));
    assert!(spec.query_params.contains_key("sign"));
}

// Scenario 3: retry on transient 5xx — 503 twice, then 200; exactly three
// HTTP calls, final send succeeds.
#[tokio::test]
async fn retries_transient_5xx_then_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let shell = webhook_shell(vec![webhook_account("primary", format!("{}/hook", server.uri()))]);
    let decorator = ProviderDecorator::new("webhook", shell, SenderMiddleware::default());

    let message: Arc<dyn dispatch_core::Message> = Arc::new(TextMessage::new(ChannelType::Webhook, "ping"));
    let options = SendOptions {
        retry_policy: Some(RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            filter: None,
        }),
        ..Default::default()
    };

    let result = decorator.send(&DispatchContext::new(), message, options).await;
    assert!(result.is_ok());
}

// Scenario 4: rate-limit refusal bypasses the circuit breaker and never
// reaches HTTP.
#[tokio::test]
async fn rate_limit_refusal_skips_http_entirely() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).and(path("/hook")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

    let limiter = RateLimiter::per_minute(1);
    assert!(limiter.allow()); // consume the only token up front

    let shell = webhook_shell(vec![webhook_account("primary", format!("{}/hook", server.uri()))]);
    let middleware = SenderMiddleware { rate_limiter: Some(Arc::new(limiter)), ..Default::default() };
    let decorator = ProviderDecorator::new("webhook", shell, middleware);

    let message: Arc<dyn dispatch_core::Message> = Arc::new(TextMessage::new(ChannelType::Webhook, "ping"));
    let result = decorator.send(&DispatchContext::new(), message, SendOptions::default()).await;

    assert!(matches!(result, Err(dispatch_pipeline::DispatchError::RateLimitExceeded { .. })));
}

// Scenario 5: async dispatch with a scheduled delay fires the callback
// once the delay elapses, without blocking the caller.
#[tokio::test]
async fn async_send_with_delay_fires_callback_after_it_elapses() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).and(path("/hook")).respond_with(ResponseTemplate::new(200)).expect(1).mount(&server).await;

    let shell = webhook_shell(vec![webhook_account("primary", format!("{}/hook", server.uri()))]);
    let decorator = ProviderDecorator::new("webhook", shell, SenderMiddleware::default());

    let fired = Arc::new(AtomicBool::new(false));
    let fired_in_callback = Arc::clone(&fired);
    let callback: dispatch_core::Callback = Arc::new(move |_id, result| {
        assert!(result.is_ok());
        fired_in_callback.store(true, Ordering::SeqCst);
    });

    let message: Arc<dyn dispatch_core::Message> = Arc::new(TextMessage::new(ChannelType::Webhook, "ping"));
    let options = SendOptions {
        delay_until: Some(chrono::Utc::now() + chrono::Duration::milliseconds(100)),
        callback: Some(callback),
        ..Default::default()
    };

    decorator.send_async(DispatchContext::new(), message, options).await.unwrap();
    assert!(!fired.load(Ordering::SeqCst));

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(fired.load(Ordering::SeqCst));
}

// Scenario 6: an account-name override in the context wins over the
// round-robin counter's state.
#[tokio::test]
async fn account_override_in_context_wins_over_round_robin() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).and(path("/b")).respond_with(ResponseTemplate::new(200)).expect(1).mount(&server).await;
    Mock::given(method("POST")).and(path("/a")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;
    Mock::given(method("POST")).and(path("/c")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

    let accounts = vec![
        webhook_account("a", format!("{}/a", server.uri())),
        webhook_account("b", format!("{}/b", server.uri())),
        webhook_account("c", format!("{}/c", server.uri())),
    ];
    let shell = webhook_shell(accounts);
    let decorator = ProviderDecorator::new("webhook", shell, SenderMiddleware::default());

    let ctx = DispatchContext::new().with_route(RouteInfo { account_name: Some("b".to_string()), strategy_type: None });
    let message: Arc<dyn dispatch_core::Message> = Arc::new(TextMessage::new(ChannelType::Webhook, "ping"));

    let result = decorator.send(&ctx, message, SendOptions::default()).await;
    assert!(result.is_ok());
}
