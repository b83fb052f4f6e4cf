//! SMTP email provider. Per the non-HTTP bypass: this implements
//! [`Provider`] directly instead of going through [`HttpProviderShell`],
//! performing account selection itself and returning a synthetic
//! [`SendResult`] so it still fits the same after-hook/evaluation surface.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};

use dispatch_core::{DispatchContext, HttpRequestSpec, Message, ProviderConfig, SendResult};
use dispatch_pipeline::provider::{Provider, ProviderSendOptions};
use dispatch_pipeline::selection;
use dispatch_pipeline::DispatchError;

use crate::account::ProviderAccount;
use crate::message::EmailMessage;

/// Wraps an `AsyncSmtpTransport` per configured account, built lazily the
/// first time that account is selected and cached for the provider's
/// lifetime since building a transport validates host/credentials.
pub struct SmtpProvider {
    config: Arc<ProviderConfig<ProviderAccount>>,
    transports: dashmap::DashMap<String, AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpProvider {
    pub fn new(config: Arc<ProviderConfig<ProviderAccount>>) -> Self {
        Self { config, transports: dashmap::DashMap::new() }
    }

    fn transport_for(&self, account: &ProviderAccount) -> Result<AsyncSmtpTransport<Tokio1Executor>, DispatchError> {
        if let Some(existing) = self.transports.get(&account.name) {
            return Ok(existing.clone());
        }

        let host = account
            .extra("host")
            .ok_or_else(|| DispatchError::internal(format!("smtp account '{}' is missing a host extra", account.name)))?;
        let port: u16 = account
            .extra("port")
            .map(|p| p.parse().map_err(|_| DispatchError::internal("smtp port extra must be a u16")))
            .transpose()?
            .unwrap_or(587);

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| DispatchError::internal(e.to_string()))?
            .port(port)
            .credentials(Credentials::new(account.api_key.clone(), account.api_secret.clone()))
            .build();

        self.transports.insert(account.name.clone(), transport.clone());
        Ok(transport)
    }

    fn from_address(account: &ProviderAccount) -> &str {
        account.extra("from").unwrap_or(&account.api_key)
    }

    /// A `SendResult` carrying no real HTTP exchange, just enough shape for
    /// the decorator's retry/evaluation path to treat success uniformly.
    fn synthetic_result(account: &ProviderAccount, status_code: u16, message: impl Into<Vec<u8>>) -> SendResult {
        SendResult {
            config: HttpRequestSpec::new(http::Method::POST, format!("smtp://{}", account.name)),
            status_code,
            headers: Default::default(),
            body: message.into(),
        }
    }
}

#[async_trait]
impl Provider for SmtpProvider {
    async fn send(
        &self,
        ctx: &DispatchContext,
        message: &dyn Message,
        options: &ProviderSendOptions,
    ) -> Result<SendResult, DispatchError> {
        let email = message
            .as_any()
            .downcast_ref::<EmailMessage>()
            .ok_or_else(|| DispatchError::internal("SmtpProvider received a non-email message"))?;

        // Steps 1-3 still apply to a non-HTTP provider: before-hooks may
        // adjust the context and abort ahead of account selection.
        let mut ctx = ctx.clone();
        for hook in &options.before_hooks {
            hook(&mut ctx)?;
        }

        let account = selection::select(&self.config, &ctx, None)?;
        let transport = self.transport_for(&account)?;

        let content_type = if email.html { lettre::message::header::ContentType::TEXT_HTML } else { lettre::message::header::ContentType::TEXT_PLAIN };

        let mut builder = lettre::Message::builder()
            .from(Self::from_address(&account).parse().map_err(|e: lettre::address::AddressError| DispatchError::internal(e.to_string()))?)
            .subject(email.subject.clone());
        for to in &email.to {
            builder = builder.to(to.parse().map_err(|e: lettre::address::AddressError| DispatchError::internal(e.to_string()))?);
        }
        let built = builder
            .header(content_type)
            .body(email.body.clone())
            .map_err(|e| DispatchError::internal(e.to_string()))?;

        let result = match transport.send(built).await {
            Ok(_) => Ok(Self::synthetic_result(&account, 200, "ok")),
            Err(e) => Err(DispatchError::internal(e.to_string())),
        };

        // Step 7: after-hooks run unconditionally with the final outcome,
        // same as the HTTP shell's.
        for hook in &options.after_hooks {
            match &result {
                Ok(send_result) => hook(Ok(send_result)),
                Err(err) => hook(Err(&err.to_string())),
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_core::StrategyType;

    fn account() -> ProviderAccount {
        ProviderAccount::new("primary", "user@example.com", "secret")
            .with_extra("host", "smtp.example.com")
            .with_extra("port", "587")
    }

    #[test]
    fn from_address_falls_back_to_api_key_when_no_extra_set() {
        let acct = account();
        assert_eq!(SmtpProvider::from_address(&acct), "user@example.com");
    }

    #[test]
    fn from_address_prefers_the_from_extra() {
        let acct = account().with_extra("from", "notify@example.com");
        assert_eq!(SmtpProvider::from_address(&acct), "notify@example.com");
    }

    #[tokio::test]
    async fn rejects_non_email_messages() {
        use crate::message::TextMessage;
        use dispatch_core::ChannelType;

        let config = Arc::new(ProviderConfig::new(vec![account()], StrategyType::RoundRobin));
        let provider = SmtpProvider::new(config);
        let ctx = DispatchContext::new();
        let msg = TextMessage::new(ChannelType::Lark, "hi");
        let options = ProviderSendOptions::default();

        let result = provider.send(&ctx, &msg, &options).await;
        assert!(result.is_err());
    }
}
