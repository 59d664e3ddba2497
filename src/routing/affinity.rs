//! Predicate builders for label affinity.
//!
//! An endpoint without the label never matches; whether that empties the
//! candidate set is for the caller's safety net to decide.

use crate::endpoint::{labels, Endpoint};

pub fn label_equals<E: Endpoint>(
    key: impl Into<String>,
    value: impl Into<String>,
) -> impl Fn(&E) -> bool {
    let key = key.into();
    let value = value.into();
    move |e: &E| e.label(&key) == Some(value.as_str())
}

pub fn in_unit<E: Endpoint>(unit: impl Into<String>) -> impl Fn(&E) -> bool {
    label_equals(labels::UNIT, unit)
}

pub fn in_cell<E: Endpoint>(cell: impl Into<String>) -> impl Fn(&E) -> bool {
    label_equals(labels::CELL, cell)
}

pub fn in_lane<E: Endpoint>(lane: impl Into<String>) -> impl Fn(&E) -> bool {
    label_equals(labels::LANE, lane)
}

/// Matches HEALTHY endpoints only.
pub fn accessible<E: Endpoint>() -> impl Fn(&E) -> bool {
    |e: &E| e.is_accessible()
}
