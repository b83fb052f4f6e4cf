//! ServerChan (Server酱) transformer: `GET /{sendkey}.send?title=&desp=`,
//! success keyed on `{"code":0}`.

use async_trait::async_trait;

use dispatch_core::{DispatchContext, HttpRequestSpec, Message};
use dispatch_pipeline::evaluator::{Mode, ResponseEvaluatorConfig};
use dispatch_pipeline::transformer::Transformer;
use dispatch_pipeline::DispatchError;

use crate::account::ProviderAccount;
use crate::message::TextMessage;

const ENDPOINT: &str = "https://sctapi.ftqq.com";

/// `api_key` holds the ServerChan `sendkey`.
pub struct ServerChanTransformer;

impl ServerChanTransformer {
    pub fn default_evaluator() -> ResponseEvaluatorConfig {
        ResponseEvaluatorConfig {
            check_body: true,
            path: "code".to_string(),
            expect: "0".to_string(),
            mode: Mode::Eq,
            code_path: "code".to_string(),
            msg_path: "message".to_string(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Transformer<ProviderAccount> for ServerChanTransformer {
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
            .ok_or_else(|| DispatchError::internal("ServerChanTransformer received a non-text message"))?;

        let title = text.title.clone().unwrap_or_else(|| "dispatchkit notification".to_string());
        let url = format!("{ENDPOINT}/{}.send", account.api_key);
        let spec = HttpRequestSpec::new(http::Method::GET, url)
            .with_query("title", &title)
            .with_query("desp", &text.content);

        Ok((spec, Some(Self::default_evaluator())))
    }
}
