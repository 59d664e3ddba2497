//! 路由模块：在亲和性与可用性之间做取舍的候选实例过滤。
//!
//! # Resilient Candidate Filtering
//!
//! Affinity rules (unit, cell, lane) narrow the candidate list for an outbound
//! call. A narrowing that would leave too few instances is discarded by its
//! safety net and the original list is kept, trading strict affinity for
//! availability.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`RouteTarget`] | Owned, order-preserving candidate list with in-place filters |
//! | [`Safety`] | Built-in safety nets: reject-if-empty, allow-empty, min-percent |
//! | [`FilterSafety`] | Seam for custom safety closures `(matched, total) -> discard?` |
//! | [`affinity`] | Label predicate builders |
//!
//! ```rust
//! use traffic_governance::routing::{affinity, RouteTarget, Safety};
//! use traffic_governance::ServiceEndpoint;
//!
//! let mut target = RouteTarget::new(vec![
//!     ServiceEndpoint::new("10.0.0.1", 8080).with_unit("unit-a"),
//!     ServiceEndpoint::new("10.0.0.2", 8080).with_unit("unit-b"),
//! ]);
//!
//! // Half matched, 60% required: the original two candidates are kept.
//! let matched = target.filter_with(affinity::in_unit::<ServiceEndpoint>("unit-a"), 0, Safety::MinPercent(60));
//! assert_eq!(matched, 1);
//! assert_eq!(target.len(), 2);
//! ```

pub mod affinity;
mod safety;
mod target;

pub use safety::{FilterSafety, Safety};
pub use target::RouteTarget;
