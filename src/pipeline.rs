//! Outbound call pipeline: filter, elect, admit.
//!
//! One [`OutboundPipeline`] is built per service from its resolved
//! [`GovernancePolicy`] and shared by every call to that service. Each call
//! walks the same stages:
//!
//! 1. drop endpoints that are not HEALTHY (when `accessible_only`),
//! 2. apply the affinity stages in order, each guarded by its safety net,
//! 3. cap the list to `max_candidates`,
//! 4. elect one endpoint,
//! 5. acquire a permit from the rate limiter, if one is configured.
//!
//! The three ways this can fail stay distinct: [`Error::NoCandidates`] when
//! the input list is empty, [`Error::FilteredToEmpty`] when a stage that was
//! allowed to empty the list did so, and [`Error::RateLimited`] when admission
//! is refused.

use crate::clock::Clock;
use crate::counter::CounterProvider;
use crate::endpoint::{Endpoint, OutboundRequest};
use crate::loadbalance::LoadBalancer;
use crate::policy::{GovernancePolicy, RoutePolicy};
use crate::resilience::rate_limiter::{Admission, RateLimiter, RejectReason};
use crate::routing::{affinity, RouteTarget};
use crate::{Error, Result};
use rand::RngCore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

const ACCESSIBLE_STAGE: &str = "accessible";

/// Result of the filter-and-elect part of a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection<E> {
    pub endpoint: E,
    /// Candidates left after filtering, i.e. what election chose from.
    pub candidates: usize,
    pub active: u32,
    pub weight: u32,
}

/// A fully routed call: the elected endpoint and how it was admitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routed<E> {
    pub selection: Selection<E>,
    pub admission: Admission,
}

impl<E> Routed<E> {
    pub fn endpoint(&self) -> &E {
        &self.selection.endpoint
    }
}

pub struct OutboundPipeline<E: Endpoint> {
    route: RoutePolicy,
    balancer: Arc<dyn LoadBalancer<E>>,
    limiter: Option<Arc<dyn RateLimiter>>,
    max_wait: Duration,
}

impl<E> OutboundPipeline<E>
where
    E: Endpoint + Clone + 'static,
{
    /// Builds the balancer and limiter the policy asks for.
    pub fn from_policy(
        policy: &GovernancePolicy,
        counters: Arc<dyn CounterProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let balancer = policy
            .load_balance
            .strategy
            .build(policy.load_balance.weigher, counters);
        let (limiter, max_wait) = match &policy.rate_limit {
            Some(rl) => (Some(rl.build(clock)), rl.max_wait),
            None => (None, Duration::ZERO),
        };
        Self {
            route: policy.route.clone(),
            balancer,
            limiter,
            max_wait,
        }
    }

    pub fn new(route: RoutePolicy, balancer: Arc<dyn LoadBalancer<E>>) -> Self {
        Self {
            route,
            balancer,
            limiter: None,
            max_wait: Duration::ZERO,
        }
    }

    pub fn with_limiter(mut self, limiter: Arc<dyn RateLimiter>, max_wait: Duration) -> Self {
        self.limiter = Some(limiter);
        self.max_wait = max_wait;
        self
    }

    pub fn limiter(&self) -> Option<&Arc<dyn RateLimiter>> {
        self.limiter.as_ref()
    }

    pub fn balancer_name(&self) -> &'static str {
        self.balancer.name()
    }

    /// Runs the routing stages only. The returned target may still be empty
    /// if `accessible_only` or an allow-empty stage removed everything.
    pub fn filter(&self, endpoints: Vec<E>, request: &OutboundRequest) -> Result<RouteTarget<E>> {
        if endpoints.is_empty() {
            return Err(Error::no_candidates(&request.service));
        }
        let mut target = RouteTarget::new(endpoints);

        if self.route.accessible_only && target.filter(affinity::accessible::<E>()) == 0 {
            return Err(filtered_to_empty(request, ACCESSIBLE_STAGE));
        }

        for stage in &self.route.stages {
            // A caller without the label has no preference for this stage.
            let Some(wanted) = request.label(&stage.label) else {
                trace!(label = %stage.label, "request has no value for affinity label, skipping");
                continue;
            };
            let matched = target.filter_with(
                affinity::label_equals::<E>(stage.label.as_str(), wanted),
                0,
                stage.safety,
            );
            trace!(label = %stage.label, matched, remaining = target.len(), "affinity stage applied");
            if target.is_empty() {
                return Err(filtered_to_empty(request, &stage.label));
            }
        }

        target.limit(self.route.max_candidates);
        Ok(target)
    }

    /// Filters then elects with the supplied random source.
    pub fn select_with_rng(
        &self,
        endpoints: Vec<E>,
        request: &OutboundRequest,
        rng: &mut dyn RngCore,
    ) -> Result<Selection<E>> {
        let target = self.filter(endpoints, request)?;
        let candidate = self
            .balancer
            .elect_with_rng(target.endpoints(), request, rng)?;
        debug!(
            service = %request.service,
            endpoint = %candidate.endpoint.id(),
            active = candidate.active,
            weight = candidate.weight,
            candidates = target.len(),
            balancer = self.balancer.name(),
            "endpoint elected"
        );
        Ok(Selection {
            endpoint: candidate.endpoint.clone(),
            candidates: target.len(),
            active: candidate.active,
            weight: candidate.weight,
        })
    }

    pub fn select(&self, endpoints: Vec<E>, request: &OutboundRequest) -> Result<Selection<E>> {
        self.select_with_rng(endpoints, request, &mut rand::rng())
    }

    /// Acquires one permit for the call, waiting up to the policy's `max_wait`.
    pub async fn admit(&self, request: &OutboundRequest) -> Result<Admission> {
        let Some(limiter) = &self.limiter else {
            return Ok(Admission::Admitted);
        };
        if limiter.is_full() {
            return Err(rate_limited(request, RejectReason::OverCapacity));
        }
        match limiter.acquire(1, self.max_wait).await {
            Admission::Rejected(reason) => Err(rate_limited(request, reason)),
            admission => Ok(admission),
        }
    }

    /// Filters, elects and admits one call.
    pub async fn route(&self, endpoints: Vec<E>, request: &OutboundRequest) -> Result<Routed<E>> {
        let selection = self.select(endpoints, request)?;
        let admission = self.admit(request).await?;
        Ok(Routed {
            selection,
            admission,
        })
    }
}

fn filtered_to_empty(request: &OutboundRequest, stage: &str) -> Error {
    debug!(service = %request.service, stage, "all candidates filtered out");
    Error::FilteredToEmpty {
        service: request.service.clone(),
        stage: stage.to_string(),
    }
}

fn rate_limited(request: &OutboundRequest, reason: RejectReason) -> Error {
    debug!(service = %request.service, %reason, "call rejected by rate limiter");
    Error::RateLimited {
        service: request.service.clone(),
        reason,
    }
}
