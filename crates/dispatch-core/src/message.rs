//! The polymorphic message hierarchy.
//!
//! Concrete message bodies (SMS templates, card payloads, bot webhook
//! shapes) are plug-ins living in `dispatch-providers`; this module only
//! fixes the shared contract every variant must satisfy.

use std::fmt::Debug;
use std::sync::OnceLock;

use crate::error::{CoreError, Result};

/// The external messaging family a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Sms,
    Email,
    WeComBot,
    DingTalk,
    Lark,
    Telegram,
    ServerChan,
    Webhook,
    EmailApi,
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChannelType::Sms => "sms",
            ChannelType::Email => "email",
            ChannelType::WeComBot => "wecombot",
            ChannelType::DingTalk => "dingtalk",
            ChannelType::Lark => "lark",
            ChannelType::Telegram => "telegram",
            ChannelType::ServerChan => "serverchan",
            ChannelType::Webhook => "webhook",
            ChannelType::EmailApi => "emailapi",
        };
        f.write_str(s)
    }
}

/// Shared header embedded in every concrete message variant.
///
/// `MessageID` is generated lazily on first observation and then pinned —
/// repeated calls to `id()` always return the same value, matching the
/// "immutable after first observation" invariant in the data model.
#[derive(Debug, Default)]
pub struct MessageHeader {
    id: OnceLock<String>,
    pub channel_type: ChannelType,
    pub sub_provider: Option<String>,
}

impl MessageHeader {
    pub fn new(channel_type: ChannelType) -> Self {
        Self { id: OnceLock::new(), channel_type, sub_provider: None }
    }

    pub fn with_sub_provider(mut self, sub_provider: impl Into<String>) -> Self {
        self.sub_provider = Some(sub_provider.into());
        self
    }

    /// Return this message's stable ID, generating one on first call.
    pub fn id(&self) -> &str {
        self.id.get_or_init(|| uuid::Uuid::new_v4().to_string())
    }

    /// Pin an externally supplied ID (e.g. one deserialized off the wire).
    /// A no-op if the ID was already observed.
    pub fn set_id(&self, id: impl Into<String>) {
        let _ = self.id.set(id.into());
    }
}

impl Default for ChannelType {
    fn default() -> Self {
        ChannelType::Webhook
    }
}

/// Contract every concrete message variant implements.
pub trait Message: Debug + Send + Sync {
    /// The channel family this message routes through.
    fn channel_type(&self) -> ChannelType;

    /// Stable identifier, immutable after first observation.
    fn message_id(&self) -> &str;

    /// Vendor inside the channel family (e.g. "aliyun" under "sms").
    fn sub_provider(&self) -> Option<&str> {
        None
    }

    /// Variant-specific structural validation; called before routing.
    fn validate(&self) -> Result<()>;

    /// Downcast hook so a `Transformer` can recover the concrete payload
    /// type it was built for from a `&dyn Message`.
    fn as_any(&self) -> &dyn std::any::Any;
}

/// A minimal message variant usable directly, or as a base for richer
/// provider-specific payloads that embed a [`MessageHeader`] and a body.
#[derive(Debug)]
pub struct GenericMessage {
    pub header: MessageHeader,
    pub body: serde_json::Value,
}

impl GenericMessage {
    pub fn new(channel_type: ChannelType, body: serde_json::Value) -> Self {
        Self { header: MessageHeader::new(channel_type), body }
    }
}

impl Message for GenericMessage {
    fn channel_type(&self) -> ChannelType {
        self.header.channel_type
    }

    fn message_id(&self) -> &str {
        self.header.id()
    }

    fn sub_provider(&self) -> Option<&str> {
        self.header.sub_provider.as_deref()
    }

    fn validate(&self) -> Result<()> {
        if self.body.is_null() {
            return Err(CoreError::validation_failed("message body must not be empty"));
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_id_is_stable_across_calls() {
        let header = MessageHeader::new(ChannelType::Sms);
        let first = header.id().to_string();
        let second = header.id().to_string();
        assert_eq!(first, second);
    }

    #[test]
    fn set_id_pins_external_id_before_first_observation() {
        let header = MessageHeader::new(ChannelType::Webhook);
        header.set_id("external-123");
        assert_eq!(header.id(), "external-123");
    }

    #[test]
    fn set_id_after_observation_is_a_no_op() {
        let header = MessageHeader::new(ChannelType::Webhook);
        let observed = header.id().to_string();
        header.set_id("ignored");
        assert_eq!(header.id(), observed);
    }

    #[test]
    fn generic_message_rejects_null_body() {
        let msg = GenericMessage::new(ChannelType::Webhook, serde_json::Value::Null);
        assert!(msg.validate().is_err());
    }
}
