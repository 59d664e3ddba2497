use super::{Candidate, LoadBalancer, WarmupWeigher, WeightedSet};
use crate::endpoint::{Endpoint, OutboundRequest};
use rand::RngCore;

/// Weighted random over every candidate, ignoring load.
pub struct RandomWeight {
    weigher: WarmupWeigher,
}

impl RandomWeight {
    pub fn new(weigher: WarmupWeigher) -> Self {
        Self { weigher }
    }
}

impl<E: Endpoint> LoadBalancer<E> for RandomWeight {
    fn name(&self) -> &'static str {
        "random_weight"
    }

    fn choose<'a>(
        &self,
        endpoints: &'a [E],
        request: &OutboundRequest,
        rng: &mut dyn RngCore,
    ) -> Candidate<'a, E> {
        let mut weights = Vec::with_capacity(endpoints.len());
        let mut all = WeightedSet::with_capacity(endpoints.len());
        for (i, endpoint) in endpoints.iter().enumerate() {
            let weight = self.weigher.weight(endpoint, request.issued_at);
            weights.push(weight);
            all.push(i, weight);
        }
        let index = all.pick(&weights, rng);
        Candidate {
            endpoint: &endpoints[index],
            index,
            active: 0,
            weight: weights[index],
        }
    }
}
