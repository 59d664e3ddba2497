//! Policy file parsing.

use super::GovernancePolicy;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// A policy document covering several services.
///
/// Services without an entry resolve to `default`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PolicySet {
    pub default: GovernancePolicy,
    pub services: HashMap<String, GovernancePolicy>,
}

impl PolicySet {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let set: PolicySet = serde_yaml::from_str(content)?;
        set.prepared()
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let set: PolicySet = serde_json::from_str(content)?;
        set.prepared()
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = read(path)?;
        if is_json(path) {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    pub fn resolve(&self, service: &str) -> &GovernancePolicy {
        self.services.get(service).unwrap_or(&self.default)
    }

    fn prepared(mut self) -> Result<Self> {
        self.default = prepare(self.default, "default")?;
        let mut services = HashMap::with_capacity(self.services.len());
        for (name, policy) in self.services {
            let policy = prepare(policy, &format!("services.{}", name))?;
            services.insert(name, policy);
        }
        self.services = services;
        Ok(self)
    }
}

pub(super) fn parse_yaml(content: &str) -> Result<GovernancePolicy> {
    let policy: GovernancePolicy = serde_yaml::from_str(content)?;
    prepare(policy, "policy")
}

pub(super) fn parse_json(content: &str) -> Result<GovernancePolicy> {
    let policy: GovernancePolicy = serde_json::from_str(content)?;
    prepare(policy, "policy")
}

pub(super) fn load_path(path: &Path) -> Result<GovernancePolicy> {
    let content = read(path)?;
    if is_json(path) {
        parse_json(&content)
    } else {
        parse_yaml(&content)
    }
}

fn read(path: &Path) -> Result<String> {
    debug!(path = %path.display(), "loading governance policy");
    let content = std::fs::read_to_string(path).map_err(|e| {
        warn!(path = %path.display(), error = %e, "failed to read policy file");
        e
    })?;
    Ok(content)
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Normalizes, then validates, prefixing field paths with `scope`.
fn prepare(mut policy: GovernancePolicy, scope: &str) -> Result<GovernancePolicy> {
    policy.normalize();
    policy.validate().map_err(|err| match err {
        Error::Validation { message, context } => {
            let field_path = context
                .field_path
                .map(|p| format!("{}.{}", scope, p))
                .unwrap_or_else(|| scope.to_string());
            Error::Validation {
                message,
                context: ErrorContext {
                    field_path: Some(field_path),
                    ..context
                },
            }
        }
        other => other,
    })?;
    Ok(policy)
}
