use super::{Candidate, LoadBalancer};
use crate::endpoint::{Endpoint, OutboundRequest};
use rand::RngCore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// Rotates through the candidate list, one sequence per service.
#[derive(Default)]
pub struct RoundRobin {
    sequences: RwLock<HashMap<String, Arc<AtomicUsize>>>,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    fn sequence(&self, service: &str) -> Arc<AtomicUsize> {
        if let Ok(map) = self.sequences.read() {
            if let Some(seq) = map.get(service) {
                return Arc::clone(seq);
            }
        }
        let mut map = self
            .sequences
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(map.entry(service.to_string()).or_default())
    }
}

impl<E: Endpoint> LoadBalancer<E> for RoundRobin {
    fn name(&self) -> &'static str {
        "round_robin"
    }

    fn choose<'a>(
        &self,
        endpoints: &'a [E],
        request: &OutboundRequest,
        _rng: &mut dyn RngCore,
    ) -> Candidate<'a, E> {
        let seq = self.sequence(&request.service).fetch_add(1, Ordering::Relaxed);
        let index = seq % endpoints.len();
        Candidate {
            endpoint: &endpoints[index],
            index,
            active: 0,
            weight: endpoints[index].declared_weight(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::ServiceEndpoint;

    #[test]
    fn test_rotates_in_order() {
        let eps: Vec<ServiceEndpoint> = (0..3).map(|i| ServiceEndpoint::new("h", i)).collect();
        let lb = RoundRobin::new();
        let request = OutboundRequest::new("svc");
        let picks: Vec<usize> = (0..6)
            .map(|_| lb.elect(&eps, &request).unwrap().index)
            .collect();
        assert_eq!(picks, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn test_services_have_independent_sequences() {
        let eps: Vec<ServiceEndpoint> = (0..2).map(|i| ServiceEndpoint::new("h", i)).collect();
        let lb = RoundRobin::new();
        assert_eq!(lb.elect(&eps, &OutboundRequest::new("a")).unwrap().index, 0);
        assert_eq!(lb.elect(&eps, &OutboundRequest::new("b")).unwrap().index, 0);
        assert_eq!(lb.elect(&eps, &OutboundRequest::new("a")).unwrap().index, 1);
    }
}
