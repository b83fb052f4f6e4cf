//! The HTTP request/response shapes that cross the transformer boundary.

use std::collections::HashMap;
use std::time::Duration;

/// How `HTTPRequestSpec::body` should be encoded and what `Content-Type`
/// it implies when the transformer didn't set one explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyType {
    #[default]
    None,
    Json,
    Form,
    Text,
    Xml,
    Raw,
}

impl BodyType {
    /// The fixed Content-Type mapping from spec §6. `None` omits the header.
    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            BodyType::None => None,
            BodyType::Json => Some("application/json; charset=utf-8"),
            BodyType::Form => Some("application/x-www-form-urlencoded; charset=utf-8"),
            BodyType::Text => Some("text/plain; charset=utf-8"),
            BodyType::Xml => Some("application/xml; charset=utf-8"),
            BodyType::Raw => Some("application/octet-stream"),
        }
    }
}

/// A transformer-built, provider-agnostic HTTP request description.
#[derive(Debug, Clone)]
pub struct HttpRequestSpec {
    pub method: http::Method,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub query_params: HashMap<String, String>,
    pub body: Vec<u8>,
    pub body_type: BodyType,
    pub timeout: Option<Duration>,
}

impl HttpRequestSpec {
    pub fn new(method: http::Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            query_params: HashMap::new(),
            body: Vec::new(),
            body_type: BodyType::None,
            timeout: None,
        }
    }

    pub fn with_json_body(mut self, body: &impl serde::Serialize) -> serde_json::Result<Self> {
        self.body = serde_json::to_vec(body)?;
        self.body_type = BodyType::Json;
        Ok(self)
    }

    pub fn with_form_body(mut self, form: &[(&str, &str)]) -> Self {
        self.body = serde_urlencoded::to_string(form).unwrap_or_default().into_bytes();
        self.body_type = BodyType::Form;
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.insert(key.into(), value.into());
        self
    }

    /// Apply the default `Content-Type` from `body_type` if the transformer
    /// didn't already set one explicitly.
    pub fn apply_default_content_type(&mut self) {
        if self.headers.keys().any(|k| k.eq_ignore_ascii_case("content-type")) {
            return;
        }
        if let Some(ct) = self.body_type.content_type() {
            self.headers.insert("Content-Type".to_string(), ct.to_string());
        }
    }
}

/// The raw HTTP outcome plus the config used to produce it.
#[derive(Debug, Clone)]
pub struct SendResult {
    pub config: HttpRequestSpec,
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl SendResult {
    pub fn body_as_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}
