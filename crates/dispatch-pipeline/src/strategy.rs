//! Account selection strategies and the process-global strategy registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, RwLock};

use rand::Rng;

use dispatch_core::{Account, StrategyType};

/// The shape a [`Strategy`] selects over — just enough of an `Account` to
/// pick a winner, independent of the account's payload type.
pub trait Selectable: Send + Sync {
    fn name(&self) -> &str;
    fn weight(&self) -> u32;
    fn is_enabled(&self) -> bool;
    fn is_healthy(&self) -> Option<bool>;
}

impl<T: Account> Selectable for T {
    fn name(&self) -> &str {
        Account::name(self)
    }
    fn weight(&self) -> u32 {
        Account::weight(self)
    }
    fn is_enabled(&self) -> bool {
        Account::is_enabled(self)
    }
    fn is_healthy(&self) -> Option<bool> {
        Account::is_healthy(self)
    }
}

fn enabled<'a>(candidates: &'a [&'a dyn Selectable]) -> Vec<&'a dyn Selectable> {
    candidates.iter().copied().filter(|c| c.is_enabled()).collect()
}

/// A pure function from a list of enabled accounts to exactly one of them
/// (by name), or `None` on empty input. Implementations must be safe for
/// concurrent `select` calls.
pub trait Strategy: Send + Sync {
    fn select(&self, candidates: &[&dyn Selectable]) -> Option<String>;
}

/// Atomic monotonic counter mod the enabled count.
#[derive(Default)]
pub struct RoundRobinStrategy {
    counter: AtomicUsize,
}

impl Strategy for RoundRobinStrategy {
    fn select(&self, candidates: &[&dyn Selectable]) -> Option<String> {
        let pool = enabled(candidates);
        if pool.is_empty() {
            return None;
        }
        let idx = self.counter.fetch_add(1, Ordering::Relaxed) % pool.len();
        Some(pool[idx].name().to_string())
    }
}

/// Uniform random pick over the enabled list.
#[derive(Default)]
pub struct RandomStrategy;

impl Strategy for RandomStrategy {
    fn select(&self, candidates: &[&dyn Selectable]) -> Option<String> {
        let pool = enabled(candidates);
        if pool.is_empty() {
            return None;
        }
        let idx = rand::rng().random_range(0..pool.len());
        Some(pool[idx].name().to_string())
    }
}

/// Cumulative-weight walk; falls back to the first enabled item when total
/// weight is zero.
#[derive(Default)]
pub struct WeightedStrategy;

impl Strategy for WeightedStrategy {
    fn select(&self, candidates: &[&dyn Selectable]) -> Option<String> {
        let pool = enabled(candidates);
        if pool.is_empty() {
            return None;
        }
        let total: u64 = pool.iter().map(|c| c.weight() as u64).sum();
        if total == 0 {
            return Some(pool[0].name().to_string());
        }
        let mut pick = rand::rng().random_range(0..total);
        for item in &pool {
            let w = item.weight() as u64;
            if pick < w {
                return Some(item.name().to_string());
            }
            pick -= w;
        }
        Some(pool.last().unwrap().name().to_string())
    }
}

/// Filters to healthy-or-unknown enabled items; degrades open to the first
/// enabled item if none are healthy, otherwise picks uniformly at random.
#[derive(Default)]
pub struct HealthBasedStrategy;

impl Strategy for HealthBasedStrategy {
    fn select(&self, candidates: &[&dyn Selectable]) -> Option<String> {
        let pool = enabled(candidates);
        if pool.is_empty() {
            return None;
        }
        let healthy: Vec<&&dyn Selectable> =
            pool.iter().filter(|c| c.is_healthy() != Some(false)).collect();
        if healthy.is_empty() {
            return Some(pool[0].name().to_string());
        }
        let idx = rand::rng().random_range(0..healthy.len());
        Some(healthy[idx].name().to_string())
    }
}

type Registry = RwLock<HashMap<String, Arc<dyn Strategy>>>;

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut map: HashMap<String, Arc<dyn Strategy>> = HashMap::new();
        map.insert("round_robin".to_string(), Arc::new(RoundRobinStrategy::default()));
        map.insert("random".to_string(), Arc::new(RandomStrategy));
        map.insert("weighted".to_string(), Arc::new(WeightedStrategy));
        map.insert("health_based".to_string(), Arc::new(HealthBasedStrategy));
        RwLock::new(map)
    })
}

/// Look up a strategy by its `StrategyType`. The four built-ins are always
/// present; additional strategies may be registered by name with
/// [`register_strategy`].
pub fn lookup_strategy(strategy_type: StrategyType) -> Option<Arc<dyn Strategy>> {
    lookup_strategy_by_name(strategy_name(strategy_type))
}

pub fn lookup_strategy_by_name(name: &str) -> Option<Arc<dyn Strategy>> {
    registry().read().unwrap().get(name).cloned()
}

pub fn register_strategy(name: impl Into<String>, strategy: Arc<dyn Strategy>) {
    registry().write().unwrap().insert(name.into(), strategy);
}

pub fn strategy_name(strategy_type: StrategyType) -> &'static str {
    match strategy_type {
        StrategyType::RoundRobin => "round_robin",
        StrategyType::Random => "random",
        StrategyType::Weighted => "weighted",
        StrategyType::HealthBased => "health_based",
    }
}

pub fn strategy_type_by_name(name: &str) -> Option<StrategyType> {
    match name {
        "round_robin" => Some(StrategyType::RoundRobin),
        "random" => Some(StrategyType::Random),
        "weighted" => Some(StrategyType::Weighted),
        "health_based" => Some(StrategyType::HealthBased),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        name: &'static str,
        weight: u32,
        enabled: bool,
        healthy: Option<bool>,
    }

    impl Selectable for Fixed {
        fn name(&self) -> &str {
            self.name
        }
        fn weight(&self) -> u32 {
            self.weight
        }
        fn is_enabled(&self) -> bool {
            self.enabled
        }
        fn is_healthy(&self) -> Option<bool> {
            self.healthy
        }
    }

    fn item(name: &'static str, weight: u32, enabled: bool) -> Fixed {
        Fixed { name, weight, enabled, healthy: None }
    }

    #[test]
    fn round_robin_cycles_through_each_enabled_account_once_per_round() {
        let strategy = RoundRobinStrategy::default();
        let a = item("a", 1, true);
        let b = item("b", 1, true);
        let c = item("c", 1, true);
        let candidates: Vec<&dyn Selectable> = vec![&a, &b, &c];

        let mut seen = std::collections::HashSet::new();
        for _ in 0..3 {
            seen.insert(strategy.select(&candidates).unwrap());
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn round_robin_skips_disabled_accounts() {
        let strategy = RoundRobinStrategy::default();
        let a = item("a", 1, false);
        let b = item("b", 1, true);
        let candidates: Vec<&dyn Selectable> = vec![&a, &b];
        for _ in 0..4 {
            assert_eq!(strategy.select(&candidates).unwrap(), "b");
        }
    }

    #[test]
    fn empty_input_returns_none() {
        let strategy = RoundRobinStrategy::default();
        let candidates: Vec<&dyn Selectable> = vec![];
        assert_eq!(strategy.select(&candidates), None);
    }

    #[test]
    fn weighted_falls_back_to_first_when_total_weight_zero() {
        let strategy = WeightedStrategy;
        let a = item("a", 0, true);
        let b = item("b", 0, true);
        let candidates: Vec<&dyn Selectable> = vec![&a, &b];
        assert_eq!(strategy.select(&candidates).unwrap(), "a");
    }

    #[test]
    fn health_based_degrades_open_when_nothing_is_healthy() {
        let strategy = HealthBasedStrategy;
        let mut a = item("a", 1, true);
        a.healthy = Some(false);
        let mut b = item("b", 1, true);
        b.healthy = Some(false);
        let candidates: Vec<&dyn Selectable> = vec![&a, &b];
        assert_eq!(strategy.select(&candidates).unwrap(), "a");
    }

    #[test]
    fn health_based_prefers_healthy_accounts() {
        let strategy = HealthBasedStrategy;
        let mut a = item("a", 1, true);
        a.healthy = Some(false);
        let mut b = item("b", 1, true);
        b.healthy = Some(true);
        let candidates: Vec<&dyn Selectable> = vec![&a, &b];
        for _ in 0..10 {
            assert_eq!(strategy.select(&candidates).unwrap(), "b");
        }
    }

    #[test]
    fn registry_resolves_all_built_ins() {
        assert!(lookup_strategy(StrategyType::RoundRobin).is_some());
        assert!(lookup_strategy(StrategyType::Random).is_some());
        assert!(lookup_strategy(StrategyType::Weighted).is_some());
        assert!(lookup_strategy(StrategyType::HealthBased).is_some());
        assert!(lookup_strategy_by_name("nonexistent").is_none());
    }
}
