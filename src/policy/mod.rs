//! 策略模块：治理策略的数据模型、加载与热更新。
//!
//! # Governance Policies
//!
//! Policies arrive already resolved per service. They are plain serde types
//! that load from YAML or JSON, validate with field paths in their errors, and
//! are published through a lock-free [`PolicyStore`].
//!
//! ```yaml
//! load_balance:
//!   strategy: least_active
//!   warmup_ms: 600000
//!   default_weight: 100
//! route:
//!   stages:
//!     - label: unit
//!       safety: { min_percent: 60 }
//!     - label: cell
//!   max_candidates: 16
//! rate_limit:
//!   mode: leaky_bucket
//!   capacity: 32
//!   max_wait_ms: 200
//!   windows:
//!     - { permits: 100, window_ms: 1000 }
//! ```

mod loader;
mod rate_limit;
mod route;
mod store;

pub use loader::PolicySet;
pub use rate_limit::{LimiterMode, RateLimitPolicy, SlidingWindow};
pub use route::{AffinityStage, RoutePolicy};
pub use store::PolicyStore;

use crate::loadbalance::{LoadBalancingStrategy, WarmupWeigher, DEFAULT_WEIGHT};
use crate::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoadBalancePolicy {
    pub strategy: LoadBalancingStrategy,
    #[serde(flatten)]
    pub weigher: WarmupWeigher,
}

impl LoadBalancePolicy {
    pub fn new(strategy: LoadBalancingStrategy) -> Self {
        Self {
            strategy,
            weigher: WarmupWeigher::default(),
        }
    }

    pub fn with_weigher(mut self, weigher: WarmupWeigher) -> Self {
        self.weigher = weigher;
        self
    }
}

/// Everything governance needs to route one service's calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GovernancePolicy {
    pub load_balance: LoadBalancePolicy,
    pub route: RoutePolicy,
    pub rate_limit: Option<RateLimitPolicy>,
}

impl GovernancePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_load_balance(mut self, load_balance: LoadBalancePolicy) -> Self {
        self.load_balance = load_balance;
        self
    }

    pub fn with_route(mut self, route: RoutePolicy) -> Self {
        self.route = route;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitPolicy) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    /// Replaces out-of-range soft settings with safe values, logging each change.
    pub fn normalize(&mut self) {
        if self.load_balance.weigher.default_weight == 0 {
            warn!(
                fallback = DEFAULT_WEIGHT,
                "default_weight of zero is not usable, falling back"
            );
            self.load_balance.weigher.default_weight = DEFAULT_WEIGHT;
        }
        self.route.normalize();
    }

    pub fn validate(&self) -> Result<()> {
        self.route.validate()?;
        if let Some(rate_limit) = &self.rate_limit {
            rate_limit.validate()?;
        }
        Ok(())
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        loader::parse_yaml(content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        loader::parse_json(content)
    }

    /// Loads a policy file; `.json` is parsed as JSON, anything else as YAML.
    pub fn from_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        loader::load_path(path.as_ref())
    }
}
