//! Aliyun SMS (`dysmsapi`) transformer: builds the signed form-encoded
//! `SendSms` request and its Code/Message/BizId response evaluator.

use async_trait::async_trait;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use dispatch_core::{DispatchContext, HttpRequestSpec, Message};
use dispatch_pipeline::evaluator::{Mode, ResponseEvaluatorConfig};
use dispatch_pipeline::transformer::Transformer;
use dispatch_pipeline::DispatchError;

use crate::account::ProviderAccount;
use crate::message::SmsMessage;

const ENDPOINT: &str = "https://dysmsapi.aliyuncs.com/";

type HmacSha1 = Hmac<Sha1>;

/// Aliyun's `RPC` signing scheme: percent-encode every query param per
/// RFC 3986, sort lexically, join with `&`, then
/// `HMAC-SHA1(AccessKeySecret + "&", "POST&%2F&" + percentEncode(query))`,
/// base64-encoded.
fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn sign(params: &[(String, String)], access_key_secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    let canonical = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    let string_to_sign = format!("POST&{}&{}", percent_encode("/"), percent_encode(&canonical));
    let key = format!("{access_key_secret}&");
    let mut mac = HmacSha1::new_from_slice(key.as_bytes()).expect("HMAC accepts a key of any length");
    mac.update(string_to_sign.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

pub struct AliyunSmsTransformer;

impl AliyunSmsTransformer {
    /// The shared response shape: `{"Code":"OK","Message":"OK","BizId":"..."}`.
    pub fn default_evaluator() -> ResponseEvaluatorConfig {
        ResponseEvaluatorConfig {
            check_body: true,
            path: "Code".to_string(),
            expect: "OK".to_string(),
            mode: Mode::Eq,
            code_path: "Code".to_string(),
            msg_path: "Message".to_string(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Transformer<ProviderAccount> for AliyunSmsTransformer {
    fn can_transform(&self, message: &dyn Message) -> bool {
        message.as_any().downcast_ref::<SmsMessage>().is_some()
    }

    async fn transform(
        &self,
        _ctx: &DispatchContext,
        message: &dyn Message,
        account: &ProviderAccount,
    ) -> Result<(HttpRequestSpec, Option<ResponseEvaluatorConfig>), DispatchError> {
        let sms = message
            .as_any()
            .downcast_ref::<SmsMessage>()
            .ok_or_else(|| DispatchError::internal("AliyunSmsTransformer received a non-SMS message"))?;

        let region = account.extra("region").unwrap_or("cn-hangzhou");
        let sign_name = account.extra("sign_name").unwrap_or("dispatchkit");
        let nonce = uuid::Uuid::new_v4().to_string();
        let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();

        let mut params = vec![
            ("AccessKeyId".to_string(), account.api_key.clone()),
            ("Action".to_string(), "SendSms".to_string()),
            ("Format".to_string(), "JSON".to_string()),
            ("PhoneNumbers".to_string(), sms.to.join(",")),
            ("RegionId".to_string(), region.to_string()),
            ("SignName".to_string(), sign_name.to_string()),
            ("SignatureMethod".to_string(), "HMAC-SHA1".to_string()),
            ("SignatureNonce".to_string(), nonce),
            ("SignatureVersion".to_string(), "1.0".to_string()),
            ("TemplateCode".to_string(), sms.template_code.clone()),
            ("TemplateParam".to_string(), sms.template_param.to_string()),
            ("Timestamp".to_string(), timestamp),
            ("Version".to_string(), "2017-05-25".to_string()),
        ];
        let signature = sign(&params, &account.api_secret);
        params.push(("Signature".to_string(), signature));

        let form: Vec<(&str, &str)> = params.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        let spec = HttpRequestSpec::new(http::Method::POST, ENDPOINT).with_form_body(&form);

        Ok((spec, Some(Self::default_evaluator())))
    }
}
