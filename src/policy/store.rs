use super::{GovernancePolicy, PolicySet};
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;

/// One published generation of policies.
#[derive(Clone, Default)]
struct Snapshot {
    default: Arc<GovernancePolicy>,
    services: HashMap<String, Arc<GovernancePolicy>>,
}

impl Snapshot {
    fn resolve(&self, service: &str) -> Arc<GovernancePolicy> {
        Arc::clone(self.services.get(service).unwrap_or(&self.default))
    }
}

/// Hot-reloadable per-service policies.
///
/// Reads are lock-free and always see a single generation: the default and
/// the per-service entries are published together. A resolved
/// `Arc<GovernancePolicy>` stays valid and unchanged for as long as the
/// caller holds it, even across a reload.
pub struct PolicyStore {
    current: ArcSwap<Snapshot>,
}

impl PolicyStore {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(Snapshot::default()),
        }
    }

    pub fn from_set(set: PolicySet) -> Self {
        let store = Self::new();
        store.replace_all(set);
        store
    }

    pub fn resolve(&self, service: &str) -> Arc<GovernancePolicy> {
        self.current.load().resolve(service)
    }

    /// Publishes a new policy for one service.
    pub fn insert(&self, service: impl Into<String>, policy: GovernancePolicy) {
        let service = service.into();
        let policy = Arc::new(policy);
        self.current.rcu(|current| {
            let mut updated = Snapshot::clone(current);
            updated.services.insert(service.clone(), Arc::clone(&policy));
            updated
        });
    }

    pub fn remove(&self, service: &str) {
        self.current.rcu(|current| {
            let mut updated = Snapshot::clone(current);
            updated.services.remove(service);
            updated
        });
    }

    pub fn set_default(&self, policy: GovernancePolicy) {
        let policy = Arc::new(policy);
        self.current.rcu(|current| Snapshot {
            default: Arc::clone(&policy),
            services: current.services.clone(),
        });
    }

    /// Swaps in a whole policy document as one generation.
    pub fn replace_all(&self, set: PolicySet) {
        let services = set
            .services
            .into_iter()
            .map(|(name, policy)| (name, Arc::new(policy)))
            .collect();
        self.current.store(Arc::new(Snapshot {
            default: Arc::new(set.default),
            services,
        }));
    }

    pub fn services(&self) -> Vec<String> {
        self.current.load().services.keys().cloned().collect()
    }
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self::new()
    }
}
