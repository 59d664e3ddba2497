use crate::routing::Safety;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One affinity narrowing step: keep endpoints whose `label` equals the
/// caller's value for the same label, subject to `safety`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffinityStage {
    pub label: String,
    #[serde(default)]
    pub safety: Safety,
}

impl AffinityStage {
    pub fn new(label: impl Into<String>, safety: Safety) -> Self {
        Self {
            label: label.into(),
            safety,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutePolicy {
    /// Drop endpoints that are not HEALTHY before any affinity stage.
    pub accessible_only: bool,
    /// Applied in order; each stage decides on its own whether to commit.
    pub stages: Vec<AffinityStage>,
    /// Cap on candidates handed to election; zero means unlimited.
    pub max_candidates: usize,
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self {
            accessible_only: true,
            stages: Vec::new(),
            max_candidates: 0,
        }
    }
}

impl RoutePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stage(mut self, label: impl Into<String>, safety: Safety) -> Self {
        self.stages.push(AffinityStage::new(label, safety));
        self
    }

    pub fn with_max_candidates(mut self, max: usize) -> Self {
        self.max_candidates = max;
        self
    }

    pub fn with_accessible_only(mut self, accessible_only: bool) -> Self {
        self.accessible_only = accessible_only;
        self
    }

    /// Clamps percentages above 100.
    pub fn normalize(&mut self) {
        for stage in &mut self.stages {
            if let Safety::MinPercent(p) = stage.safety {
                if p > 100 {
                    warn!(label = %stage.label, threshold = p, "min_percent above 100, clamping");
                    stage.safety = Safety::MinPercent(100);
                }
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (i, stage) in self.stages.iter().enumerate() {
            if stage.label.trim().is_empty() {
                return Err(Error::validation_with_context(
                    "affinity stage label must not be empty",
                    ErrorContext::new()
                        .with_field_path(format!("route.stages[{}].label", i))
                        .with_source("policy_validator"),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_yaml_forms() {
        let yaml = r#"
stages:
  - label: unit
    safety:
      min_percent: 60
  - label: cell
  - label: lane
    safety: allow_empty
max_candidates: 8
"#;
        let policy: RoutePolicy = serde_yaml::from_str(yaml).unwrap();
        assert!(policy.accessible_only);
        assert_eq!(policy.max_candidates, 8);
        assert_eq!(policy.stages[0].safety, Safety::MinPercent(60));
        assert_eq!(policy.stages[1].safety, Safety::RejectEmpty);
        assert_eq!(policy.stages[2].safety, Safety::AllowEmpty);
    }

    #[test]
    fn test_normalize_clamps_percent() {
        let mut policy = RoutePolicy::new().with_stage("unit", Safety::MinPercent(140));
        policy.normalize();
        assert_eq!(policy.stages[0].safety, Safety::MinPercent(100));
    }

    #[test]
    fn test_blank_label_is_invalid() {
        let policy = RoutePolicy::new().with_stage("  ", Safety::RejectEmpty);
        assert!(policy.validate().is_err());
    }
}
