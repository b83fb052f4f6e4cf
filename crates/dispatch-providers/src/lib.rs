//! Concrete provider plug-ins built on `dispatch-core`/`dispatch-pipeline`:
//! Aliyun SMS, Lark and generic signed webhooks, Telegram, ServerChan, and
//! an SMTP email provider that bypasses the HTTP shell entirely.

pub mod account;
pub mod aliyun;
pub mod lark;
pub mod message;
pub mod serverchan;
pub mod smtp;
pub mod telegram;
pub mod webhook;

pub use account::ProviderAccount;
pub use aliyun::AliyunSmsTransformer;
pub use lark::LarkTransformer;
pub use message::{EmailMessage, SmsMessage, TextMessage};
pub use serverchan::ServerChanTransformer;
pub use smtp::SmtpProvider;
pub use telegram::TelegramTransformer;
pub use webhook::SignedWebhookTransformer;
