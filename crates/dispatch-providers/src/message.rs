//! Concrete message payloads for the provider plug-ins in this crate.

use dispatch_core::{ChannelType, CoreError, Message, MessageHeader, Result};

/// A templated SMS send (e.g. Aliyun's `SendSms`): recipients plus a
/// provider-side template code and its substitution parameters.
#[derive(Debug)]
pub struct SmsMessage {
    pub header: MessageHeader,
    pub to: Vec<String>,
    pub template_code: String,
    pub template_param: serde_json::Value,
}

impl SmsMessage {
    pub fn new(to: Vec<String>, template_code: impl Into<String>, template_param: serde_json::Value) -> Self {
        Self {
            header: MessageHeader::new(ChannelType::Sms).with_sub_provider("aliyun"),
            to,
            template_code: template_code.into(),
            template_param,
        }
    }
}

impl Message for SmsMessage {
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
        if self.to.is_empty() {
            return Err(CoreError::validation_failed("sms message must have at least one recipient"));
        }
        if self.template_code.is_empty() {
            return Err(CoreError::validation_failed("sms message must set a template code"));
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// A plain-text chat message, shared by the Lark, Telegram, ServerChan, and
/// generic webhook transformers.
#[derive(Debug)]
pub struct TextMessage {
    pub header: MessageHeader,
    pub title: Option<String>,
    pub content: String,
}

impl TextMessage {
    pub fn new(channel_type: ChannelType, content: impl Into<String>) -> Self {
        Self { header: MessageHeader::new(channel_type), title: None, content: content.into() }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

impl Message for TextMessage {
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
        if self.content.is_empty() {
            return Err(CoreError::validation_failed("text message must not be empty"));
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// An email send handled either via an HTTP email-API provider or directly
/// by the SMTP provider (which bypasses the HTTP shell entirely).
#[derive(Debug)]
pub struct EmailMessage {
    pub header: MessageHeader,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    pub html: bool,
}

impl EmailMessage {
    pub fn new(to: Vec<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self { header: MessageHeader::new(ChannelType::Email), to, subject: subject.into(), body: body.into(), html: false }
    }

    pub fn html(mut self) -> Self {
        self.html = true;
        self
    }
}

impl Message for EmailMessage {
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
        if self.to.is_empty() {
            return Err(CoreError::validation_failed("email message must have at least one recipient"));
        }
        if self.subject.is_empty() {
            return Err(CoreError::validation_failed("email message must have a subject"));
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
