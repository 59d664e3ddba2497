//! Small serde helpers shared by the policy types.

pub(crate) mod duration_ms;
