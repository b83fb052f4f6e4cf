//! Generic signed-webhook transformer: posts a JSON envelope with an
//! HMAC-SHA256 signature over `timestamp + body`, carried in headers. Used
//! for any downstream that expects a bring-your-own-secret webhook contract
//! rather than a vendor-specific signing scheme.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use dispatch_core::{DispatchContext, HttpRequestSpec, Message};
use dispatch_pipeline::evaluator::ResponseEvaluatorConfig;
use dispatch_pipeline::transformer::Transformer;
use dispatch_pipeline::DispatchError;

use crate::account::ProviderAccount;
use crate::message::TextMessage;

pub const SIGNATURE_HEADER: &str = "X-Dispatchkit-Signature";
pub const TIMESTAMP_HEADER: &str = "X-Dispatchkit-Timestamp";

type HmacSha256 = Hmac<Sha256>;

/// `hex(HMAC-SHA256(key = signing_secret, data = timestamp + body))`.
fn sign_webhook(timestamp: &str, body: &str, signing_secret: &str) -> String {
    let payload = format!("{timestamp}{body}");
    let mut mac = HmacSha256::new_from_slice(signing_secret.as_bytes()).expect("HMAC accepts a key of any length");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Transforms [`TextMessage`]s into a signed webhook POST. The account's
/// `api_key` holds the target URL, `api_secret` the signing secret. A
/// missing/empty secret skips signing (some targets have none configured).
pub struct SignedWebhookTransformer;

#[async_trait]
impl Transformer<ProviderAccount> for SignedWebhookTransformer {
    fn can_transform(&self, message: &dyn Message) -> bool {
        message.as_any().downcast_ref::<TextMessage>().is_some()
    }

    async fn transform(
        &self,
        _ctx: &DispatchContext,
        message: &dyn Message,
        account: &ProviderAccount,
    ) -> Result<(HttpRequestSpec, Option<ResponseEvaluatorConfig>), DispatchError> {
        let text = message
            .as_any()
            .downcast_ref::<TextMessage>()
            .ok_or_else(|| DispatchError::internal("SignedWebhookTransformer received a non-text message"))?;

        let body = serde_json::json!({
            "title": text.title,
            "content": text.content,
        });
        let body_json = serde_json::to_string(&body).map_err(|e| DispatchError::internal(e.to_string()))?;

        let mut spec = HttpRequestSpec::new(http::Method::POST, account.api_key.clone())
            .with_json_body(&body)
            .map_err(|e| DispatchError::internal(e.to_string()))?;

        if !account.api_secret.is_empty() {
            let timestamp = chrono::Utc::now().timestamp_millis().to_string();
            let signature = sign_webhook(&timestamp, &body_json, &account.api_secret);
            spec = spec.with_header(SIGNATURE_HEADER, signature).with_header(TIMESTAMP_HEADER, timestamp);
        }

        Ok((spec, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_changes_when_body_changes() {
        let a = sign_webhook("1000", "{}", "s");
        let b = sign_webhook("1000", "{\"x\":1}", "s");
        assert_ne!(a, b);
    }
}
