//! Account model and the provider-scoped, thread-safe account collection.

use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{CoreError, Result};

/// Selection strategy identifiers. Resolution of a `StrategyType` to a
/// concrete algorithm happens in `dispatch-pipeline`'s strategy registry;
/// this enum only names the choice so it can live on [`ProviderConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    #[default]
    RoundRobin,
    Random,
    Weighted,
    HealthBased,
}

/// One credential set / endpoint within a provider's item list.
pub trait Account: Debug + Send + Sync {
    /// Unique name within the owning [`ProviderConfig`].
    fn name(&self) -> &str;

    /// Selection weight. Implementations should normalize `<= 0` to `1`
    /// (see [`normalize_weight`]).
    fn weight(&self) -> u32;

    /// Negation of the account's `Disabled` flag.
    fn is_enabled(&self) -> bool;

    /// Filter tag (e.g. only "aliyun" accounts within the "sms" provider).
    fn sub_type(&self) -> Option<&str> {
        None
    }

    /// Health probe result: `None` means "no probe configured", which the
    /// health-based strategy treats as healthy.
    fn is_healthy(&self) -> Option<bool> {
        None
    }

    /// Per-item structural validation, run by `ProviderConfig::validate`
    /// and by `add`/`update`.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Normalize a raw configured weight: `<= 0` becomes `1`.
pub fn normalize_weight(raw: i64) -> u32 {
    if raw <= 0 {
        1
    } else {
        raw.min(u32::MAX as i64) as u32
    }
}

/// A provider-scoped collection of accounts with CRUD and validation.
///
/// Reads (listing, selection snapshots) take a read lock and clone the
/// `Arc` handles so the lock is not held across strategy execution; writes
/// (add/update/delete) take the exclusive lock.
pub struct ProviderConfig<T: Account> {
    disabled: bool,
    strategy: StrategyType,
    items: RwLock<Vec<Arc<T>>>,
}

impl<T: Account> ProviderConfig<T> {
    pub fn new(items: Vec<T>, strategy: StrategyType) -> Self {
        Self {
            disabled: false,
            strategy,
            items: RwLock::new(items.into_iter().map(Arc::new).collect()),
        }
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    pub fn strategy(&self) -> StrategyType {
        self.strategy
    }

    pub fn set_strategy(&mut self, strategy: StrategyType) {
        self.strategy = strategy;
    }

    /// Snapshot of all items under a read lock.
    pub fn items(&self) -> Vec<Arc<T>> {
        self.items.read().clone()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Validate provider-level and per-item invariants.
    pub fn validate(&self) -> Result<()> {
        if self.disabled {
            return Err(CoreError::invalid_config("provider is disabled"));
        }

        let items = self.items.read();
        if items.is_empty() {
            return Err(CoreError::invalid_config("provider has no accounts configured"));
        }

        let mut seen = HashSet::with_capacity(items.len());
        let mut any_enabled = false;
        for item in items.iter() {
            if item.name().is_empty() {
                return Err(CoreError::invalid_config("account name must not be empty"));
            }
            if !seen.insert(item.name().to_string()) {
                return Err(CoreError::invalid_config(format!("duplicate account name: {}", item.name())));
            }
            if item.is_enabled() {
                any_enabled = true;
            }
            item.validate()?;
        }

        if !any_enabled {
            return Err(CoreError::invalid_config("all accounts are disabled"));
        }

        Ok(())
    }

    /// Add a new account; re-validates it before insertion.
    pub fn add(&self, item: T) -> Result<()> {
        item.validate()?;
        self.items.write().push(Arc::new(item));
        Ok(())
    }

    /// Replace the account with matching name; re-validates it.
    /// Fails with "item not found" if no account has that name.
    pub fn update(&self, name: &str, item: T) -> Result<()> {
        item.validate()?;
        let mut items = self.items.write();
        match items.iter().position(|i| i.name() == name) {
            Some(idx) => {
                items[idx] = Arc::new(item);
                Ok(())
            }
            None => Err(CoreError::item_not_found(format!("item not found: {name}"))),
        }
    }

    /// Remove the account with matching name. A no-op when the name is
    /// unknown (never errors).
    pub fn delete(&self, name: &str) {
        self.items.write().retain(|i| i.name() != name);
    }
}
