//! Telegram Bot API transformer: `sendMessage` over the bot token, success
//! keyed on the `{"ok":true}` envelope Telegram always returns.

use async_trait::async_trait;

use dispatch_core::{DispatchContext, HttpRequestSpec, Message};
use dispatch_pipeline::evaluator::{Mode, ResponseEvaluatorConfig};
use dispatch_pipeline::transformer::Transformer;
use dispatch_pipeline::DispatchError;

use crate::account::ProviderAccount;
use crate::message::TextMessage;

const ENDPOINT: &str = "https://api.telegram.org/bot";

/// Transforms [`TextMessage`]s into `sendMessage` calls. `api_key` holds
/// the bot token; `extras["chat_id"]` the target chat.
pub struct TelegramTransformer;

impl TelegramTransformer {
    pub fn default_evaluator() -> ResponseEvaluatorConfig {
        ResponseEvaluatorConfig {
            check_body: true,
            path: "ok".to_string(),
            expect: "true".to_string(),
            mode: Mode::Eq,
            code_path: "error_code".to_string(),
            msg_path: "description".to_string(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Transformer<ProviderAccount> for TelegramTransformer {
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
            .ok_or_else(|| DispatchError::internal("TelegramTransformer received a non-text message"))?;

        let chat_id = account
            .extra("chat_id")
            .ok_or_else(|| DispatchError::internal("telegram account is missing a chat_id extra"))?;

        let url = format!("{ENDPOINT}{}/sendMessage", account.api_key);
        let spec = HttpRequestSpec::new(http::Method::POST, url)
            .with_json_body(&serde_json::json!({
                "chat_id": chat_id,
                "text": text.content,
            }))
            .map_err(|e| DispatchError::internal(e.to_string()))?;

        Ok((spec, Some(Self::default_evaluator())))
    }
}
