//! # traffic-governance
//!
//! 多活服务治理的流量内核：弹性路由过滤、带预热的加权最少活跃选举，以及令牌桶/漏桶限流。
//!
//! Traffic core for multi-active service governance. Given the candidate
//! endpoints of a downstream service, it narrows them by affinity without
//! ever stranding a call, elects one endpoint by active-call count and
//! warm-up adjusted weight, and admits the call through a rate limiter.
//!
//! ## Core Philosophy
//!
//! - **Availability over affinity**: a narrowing that leaves too few instances is discarded
//! - **Policy-driven**: strategies and limits come from resolved, hot-reloadable policies
//! - **Deterministic when asked**: randomness and time are injectable for tests
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use traffic_governance::clock::SystemClock;
//! use traffic_governance::counter::NoopCounters;
//! use traffic_governance::{
//!     Endpoint, GovernancePolicy, OutboundPipeline, OutboundRequest, ServiceEndpoint,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> traffic_governance::Result<()> {
//! let policy = GovernancePolicy::from_yaml_str(
//!     "route:\n  stages:\n    - label: unit\n      safety: { min_percent: 50 }\n",
//! )?;
//! let pipeline = OutboundPipeline::from_policy(
//!     &policy,
//!     Arc::new(NoopCounters),
//!     Arc::new(SystemClock::new()),
//! );
//!
//! let endpoints = vec![
//!     ServiceEndpoint::new("10.0.0.1", 8080).with_unit("unit-a"),
//!     ServiceEndpoint::new("10.0.0.2", 8080).with_unit("unit-b"),
//! ];
//! let request = OutboundRequest::new("order-service").with_label("unit", "unit-a");
//! let routed = pipeline.route(endpoints, &request).await?;
//! assert_eq!(routed.endpoint().host(), "10.0.0.1");
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`routing`] | Resilient candidate filtering with safety nets |
//! | [`loadbalance`] | Least-active, weighted random and round-robin election |
//! | [`resilience`] | Token-bucket and leaky-bucket rate limiting |
//! | [`policy`] | Policy model, YAML/JSON loading and the hot-reload store |
//! | [`pipeline`] | Filter, elect and admit one outbound call |
//! | [`endpoint`] | Endpoint abstraction and outbound request metadata |
//! | [`counter`] | Active-call counter seam |
//! | [`clock`] | Injectable microsecond clock |

pub mod clock;
pub mod counter;
pub mod endpoint;
pub mod loadbalance;
pub mod pipeline;
pub mod policy;
pub mod resilience;
pub mod routing;

mod utils;

// Re-export main types for convenience
pub use endpoint::{Endpoint, EndpointState, OutboundRequest, ServiceEndpoint};
pub use loadbalance::{Candidate, LoadBalancer, LoadBalancingStrategy, WarmupWeigher};
pub use pipeline::{OutboundPipeline, Routed, Selection};
pub use policy::{GovernancePolicy, PolicySet, PolicyStore, RateLimitPolicy, RoutePolicy};
pub use resilience::{Admission, RateLimiter, RejectReason};
pub use routing::{RouteTarget, Safety};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
