//! The generic credential account shared by every provider in this crate:
//! a `(name, app_id, api_key, api_secret)` tuple plus a free-form extras map
//! for whatever a given vendor needs beyond that (region, webhook URL, SMTP
//! host/port, sender address).

use std::collections::HashMap;

use dispatch_core::{normalize_weight, Account};

#[derive(Debug, Clone)]
pub struct ProviderAccount {
    pub name: String,
    pub app_id: Option<String>,
    pub api_key: String,
    pub api_secret: String,
    pub weight: i64,
    pub enabled: bool,
    pub sub_type: Option<String>,
    pub extras: HashMap<String, String>,
}

impl ProviderAccount {
    pub fn new(name: impl Into<String>, api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            app_id: None,
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            weight: 1,
            enabled: true,
            sub_type: None,
            extras: HashMap::new(),
        }
    }

    pub fn with_sub_type(mut self, sub_type: impl Into<String>) -> Self {
        self.sub_type = Some(sub_type.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn extra(&self, key: &str) -> Option<&str> {
        self.extras.get(key).map(String::as_str)
    }
}

impl Account for ProviderAccount {
    fn name(&self) -> &str {
        &self.name
    }

    fn weight(&self) -> u32 {
        normalize_weight(self.weight)
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn sub_type(&self) -> Option<&str> {
        self.sub_type.as_deref()
    }
}
