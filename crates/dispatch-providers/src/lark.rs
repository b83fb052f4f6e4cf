//! Lark (Feishu) custom bot webhook transformer: timestamp+secret signing,
//! `{"code":0,"msg":"ok"}` success shape.

use async_trait::async_trait;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use dispatch_core::{DispatchContext, HttpRequestSpec, Message};
use dispatch_pipeline::evaluator::{Mode, ResponseEvaluatorConfig};
use dispatch_pipeline::transformer::Transformer;
use dispatch_pipeline::DispatchError;

use crate::account::ProviderAccount;
use crate::message::TextMessage;

const ENDPOINT: &str = "https://open.feishu.cn/open-apis/bot/v2/hook";

type HmacSha256 = Hmac<Sha256>;

/// Lark's signing scheme: `base64(HMAC-SHA256(key = "{timestamp}\n{secret}", data = ""))`.
fn sign(timestamp: &str, secret: &str) -> String {
    let key = format!("{timestamp}\n{secret}");
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC accepts a key of any length");
    mac.update(b"");
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

pub struct LarkTransformer;

impl LarkTransformer {
    pub fn default_evaluator() -> ResponseEvaluatorConfig {
        ResponseEvaluatorConfig {
            check_body: true,
            path: "code".to_string(),
            expect: "0".to_string(),
            mode: Mode::Eq,
            code_path: "code".to_string(),
            msg_path: "msg".to_string(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Transformer<ProviderAccount> for LarkTransformer {
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
            .ok_or_else(|| DispatchError::internal("LarkTransformer received a non-text message"))?;

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign(&timestamp, &account.api_secret);

        let url = format!("{ENDPOINT}/{}", account.api_key);
        let spec = HttpRequestSpec::new(http::Method::POST, url)
            .with_query("timestamp", &timestamp)
            .with_query("sign", &signature)
            .with_json_body(&serde_json::json!({
                "msg_type": "text",
                "content": { "text": text.content },
            }))
            .map_err(|e| DispatchError::internal(e.to_string()))?;

        Ok((spec, Some(Self::default_evaluator())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_matches_the_documented_construction() {
        let a = sign("1700000000", "secret");
        let b = sign("1700000000", "secret");
        assert_eq!(a, b);
        assert_ne!(a, sign("1700000001", "secret"));
    }
}
