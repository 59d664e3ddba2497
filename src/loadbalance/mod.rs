//! 负载均衡模块：基于在途请求数与权重的实例选举。
//!
//! # Endpoint Election
//!
//! A [`LoadBalancer`] turns a non-empty candidate list into exactly one
//! [`Candidate`]. The default strategy, [`LeastActive`], prefers the endpoints
//! with the fewest in-flight calls and breaks ties by weighted random choice,
//! using warm-up adjusted weights from [`WarmupWeigher`].
//!
//! | Strategy | Description |
//! |----------|-------------|
//! | [`LeastActive`] | Fewest active calls, weighted random among ties |
//! | [`RandomWeight`] | Weighted random over all candidates |
//! | [`RoundRobin`] | Per-service rotating sequence |
//!
//! An empty list is a caller bug: every strategy reports it as
//! [`Error::NoCandidates`](crate::Error::NoCandidates) rather than electing nothing.

mod least_active;
mod random_weight;
mod round_robin;
mod weight;

pub use least_active::LeastActive;
pub use random_weight::RandomWeight;
pub use round_robin::RoundRobin;
pub use weight::{ramp, WarmupWeigher, DEFAULT_WARMUP, DEFAULT_WEIGHT};

use crate::counter::CounterProvider;
use crate::endpoint::{Endpoint, OutboundRequest};
use crate::{Error, Result};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Request-scoped pairing of an elected endpoint with the facts used to elect it.
#[derive(Debug)]
pub struct Candidate<'a, E> {
    pub endpoint: &'a E,
    /// Position in the list passed to `elect`.
    pub index: usize,
    /// Active-call count read during the election pass.
    pub active: u32,
    /// Effective weight for this request.
    pub weight: u32,
}

impl<'a, E> Clone for Candidate<'a, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, E> Copy for Candidate<'a, E> {}

pub trait LoadBalancer<E: Endpoint>: Send + Sync {
    fn name(&self) -> &'static str;

    /// Picks one endpoint. `endpoints` is never empty here.
    fn choose<'a>(
        &self,
        endpoints: &'a [E],
        request: &OutboundRequest,
        rng: &mut dyn RngCore,
    ) -> Candidate<'a, E>;

    fn elect_with_rng<'a>(
        &self,
        endpoints: &'a [E],
        request: &OutboundRequest,
        rng: &mut dyn RngCore,
    ) -> Result<Candidate<'a, E>> {
        if endpoints.is_empty() {
            return Err(Error::no_candidates(&request.service));
        }
        Ok(self.choose(endpoints, request, rng))
    }

    fn elect<'a>(&self, endpoints: &'a [E], request: &OutboundRequest) -> Result<Candidate<'a, E>> {
        self.elect_with_rng(endpoints, request, &mut rand::rng())
    }
}

/// Load balancing strategy selector used in policy files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancingStrategy {
    #[default]
    LeastActive,
    RandomWeight,
    RoundRobin,
}

impl LoadBalancingStrategy {
    pub fn build<E: Endpoint>(
        self,
        weigher: WarmupWeigher,
        counters: Arc<dyn CounterProvider>,
    ) -> Arc<dyn LoadBalancer<E>> {
        match self {
            LoadBalancingStrategy::LeastActive => Arc::new(LeastActive::new(counters, weigher)),
            LoadBalancingStrategy::RandomWeight => Arc::new(RandomWeight::new(weigher)),
            LoadBalancingStrategy::RoundRobin => Arc::new(RoundRobin::new()),
        }
    }
}

/// Running state of a weighted pick over a subset of candidates.
#[derive(Debug, Default)]
pub(crate) struct WeightedSet {
    pub indexes: Vec<usize>,
    pub total: u64,
    first: Option<u32>,
    pub same_weight: bool,
}

impl WeightedSet {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            indexes: Vec::with_capacity(n),
            total: 0,
            first: None,
            same_weight: true,
        }
    }

    pub fn reset(&mut self) {
        self.indexes.clear();
        self.total = 0;
        self.first = None;
        self.same_weight = true;
    }

    pub fn push(&mut self, index: usize, weight: u32) {
        self.indexes.push(index);
        self.total += weight as u64;
        match self.first {
            None => self.first = Some(weight),
            Some(first) if first != weight => self.same_weight = false,
            Some(_) => {}
        }
    }

    /// Weighted random when weights differ and sum positive, uniform otherwise.
    /// `weights` is indexed by candidate position.
    pub fn pick(&self, weights: &[u32], rng: &mut dyn RngCore) -> usize {
        debug_assert!(!self.indexes.is_empty());
        if self.indexes.len() == 1 {
            return self.indexes[0];
        }
        if !self.same_weight && self.total > 0 {
            let mut offset = rng.random_range(0..self.total) as i64;
            for &i in &self.indexes {
                offset -= weights[i] as i64;
                if offset < 0 {
                    return i;
                }
            }
        }
        self.indexes[rng.random_range(0..self.indexes.len())]
    }
}
