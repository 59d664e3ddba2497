use super::{Candidate, LoadBalancer, WarmupWeigher, WeightedSet};
use crate::counter::CounterProvider;
use crate::endpoint::{Endpoint, OutboundRequest};
use rand::RngCore;
use std::sync::Arc;
use tracing::trace;

/// Elects among the endpoints with the fewest active calls.
///
/// One pass reads every candidate's active count and effective weight. A
/// single minimum wins outright; ties go to a weighted random pick, or a
/// uniform one when the tied weights are all equal. Counts are read one
/// endpoint at a time, so concurrent calls may see slightly different
/// snapshots; "least active" is a best effort against a moving target.
pub struct LeastActive {
    counters: Arc<dyn CounterProvider>,
    weigher: WarmupWeigher,
}

impl LeastActive {
    pub fn new(counters: Arc<dyn CounterProvider>, weigher: WarmupWeigher) -> Self {
        Self { counters, weigher }
    }
}

impl<E: Endpoint> LoadBalancer<E> for LeastActive {
    fn name(&self) -> &'static str {
        "least_active"
    }

    fn choose<'a>(
        &self,
        endpoints: &'a [E],
        request: &OutboundRequest,
        rng: &mut dyn RngCore,
    ) -> Candidate<'a, E> {
        let mut actives = Vec::with_capacity(endpoints.len());
        let mut weights = Vec::with_capacity(endpoints.len());
        let mut least = WeightedSet::with_capacity(endpoints.len());
        let mut least_active = u32::MAX;

        for (i, endpoint) in endpoints.iter().enumerate() {
            let active = self.counters.active(&request.service, endpoint.id());
            let weight = self.weigher.weight(endpoint, request.issued_at);
            actives.push(active);
            weights.push(weight);

            if active < least_active {
                least_active = active;
                least.reset();
                least.push(i, weight);
            } else if active == least_active {
                least.push(i, weight);
            }
        }

        let index = least.pick(&weights, rng);
        trace!(
            service = %request.service,
            index,
            active = actives[index],
            weight = weights[index],
            ties = least.indexes.len(),
            "least active election"
        );
        Candidate {
            endpoint: &endpoints[index],
            index,
            active: actives[index],
            weight: weights[index],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::InMemoryCounters;
    use crate::endpoint::ServiceEndpoint;
    use crate::Error;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn endpoints(weights: &[u32]) -> Vec<ServiceEndpoint> {
        weights
            .iter()
            .enumerate()
            .map(|(i, w)| ServiceEndpoint::new(format!("10.0.0.{}", i), 8080).with_weight(*w))
            .collect()
    }

    fn set_active(counters: &InMemoryCounters, ep: &ServiceEndpoint, n: u32) {
        let c = counters.counter("svc", ep.id());
        for _ in 0..n {
            c.begin();
        }
    }

    #[test]
    fn test_empty_list_is_no_candidates() {
        let lb = LeastActive::new(Arc::new(InMemoryCounters::new()), WarmupWeigher::disabled());
        let eps: Vec<ServiceEndpoint> = Vec::new();
        let err = lb.elect(&eps, &OutboundRequest::new("svc")).unwrap_err();
        assert!(matches!(err, Error::NoCandidates { ref service } if service == "svc"));
    }

    #[test]
    fn test_single_minimum_wins_deterministically() {
        let counters = Arc::new(InMemoryCounters::new());
        let eps = endpoints(&[100, 100, 100]);
        set_active(&counters, &eps[0], 3);
        set_active(&counters, &eps[1], 1);
        set_active(&counters, &eps[2], 2);

        let lb = LeastActive::new(counters, WarmupWeigher::disabled());
        let request = OutboundRequest::new("svc");
        for _ in 0..50 {
            let c = lb.elect(&eps, &request).unwrap();
            assert_eq!(c.index, 1);
            assert_eq!(c.active, 1);
        }
    }

    #[test]
    fn test_elected_is_never_more_loaded_than_others() {
        let counters = Arc::new(InMemoryCounters::new());
        let eps = endpoints(&[10, 20, 30, 40, 50]);
        let loads = [4, 2, 7, 2, 9];
        for (ep, n) in eps.iter().zip(loads) {
            set_active(&counters, ep, n);
        }
        let lb = LeastActive::new(counters, WarmupWeigher::disabled());
        let request = OutboundRequest::new("svc");
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..500 {
            let c = lb.elect_with_rng(&eps, &request, &mut rng).unwrap();
            assert!(loads.iter().all(|&l| c.active <= l));
            assert!(c.index == 1 || c.index == 3);
        }
    }

    #[test]
    fn test_zero_weight_ties_fall_back_to_default_weight() {
        let eps = endpoints(&[0, 0]);
        let lb = LeastActive::new(
            Arc::new(InMemoryCounters::new()),
            WarmupWeigher::disabled().with_default_weight(5),
        );
        let c = lb.elect(&eps, &OutboundRequest::new("svc")).unwrap();
        assert_eq!(c.weight, 5);
    }

    #[test]
    fn test_weighted_tie_break_distribution() {
        let eps = endpoints(&[70, 30]);
        let lb = LeastActive::new(Arc::new(InMemoryCounters::new()), WarmupWeigher::disabled());
        let request = OutboundRequest::new("svc");
        let mut rng = StdRng::seed_from_u64(2024);

        let rounds = 10_000;
        let mut first = 0;
        for _ in 0..rounds {
            if lb.elect_with_rng(&eps, &request, &mut rng).unwrap().index == 0 {
                first += 1;
            }
        }
        let ratio = first as f64 / rounds as f64;
        assert!((ratio - 0.7).abs() < 0.02, "ratio was {}", ratio);
    }
}
