//! Endpoint model consumed by routing and election.
//!
//! Endpoints are owned by the registry collaborator; this crate only reads them.
//! The effective (warm-up adjusted) weight is computed per request by
//! [`crate::loadbalance::WarmupWeigher`] and never written back.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, SystemTime};

/// Well-known label keys used by affinity predicates.
pub mod labels {
    pub const UNIT: &str = "unit";
    pub const CELL: &str = "cell";
    pub const LANE: &str = "lane";
    pub const ZONE: &str = "zone";
    pub const REGION: &str = "region";
}

/// Health state as reported by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EndpointState {
    #[default]
    Healthy,
    Suspend,
    Disable,
}

impl EndpointState {
    pub fn is_accessible(self) -> bool {
        self == EndpointState::Healthy
    }
}

/// Read-only view of a service instance.
pub trait Endpoint {
    fn id(&self) -> &str;

    fn host(&self) -> &str;

    fn port(&self) -> u16;

    /// Looks up a label; missing labels are `None`, never an empty string.
    fn label(&self, key: &str) -> Option<&str>;

    fn state(&self) -> EndpointState;

    /// Static weight declared at registration. Zero means "use the policy default".
    fn declared_weight(&self) -> u32;

    fn start_time(&self) -> Option<SystemTime>;

    fn is_accessible(&self) -> bool {
        self.state().is_accessible()
    }

    fn address(&self) -> String {
        format!("{}:{}", self.host(), self.port())
    }
}

/// Concrete endpoint used by tests, benches and simple registries.
///
/// The address is fixed at construction; counters are keyed by the
/// `host:port` id derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "EndpointDef")]
pub struct ServiceEndpoint {
    host: String,
    port: u16,
    pub state: EndpointState,
    pub weight: u32,
    pub labels: HashMap<String, String>,
    /// Start time in milliseconds since the Unix epoch.
    pub start_time_ms: Option<u64>,
    #[serde(skip_serializing)]
    id: String,
}

#[derive(Deserialize)]
struct EndpointDef {
    host: String,
    port: u16,
    #[serde(default)]
    state: EndpointState,
    #[serde(default)]
    weight: u32,
    #[serde(default)]
    labels: HashMap<String, String>,
    #[serde(default)]
    start_time_ms: Option<u64>,
}

impl From<EndpointDef> for ServiceEndpoint {
    fn from(def: EndpointDef) -> Self {
        let mut endpoint = ServiceEndpoint::new(def.host, def.port).with_weight(def.weight);
        endpoint.state = def.state;
        endpoint.labels = def.labels;
        endpoint.start_time_ms = def.start_time_ms;
        endpoint
    }
}

impl ServiceEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        let id = format!("{}:{}", host, port);
        Self {
            host,
            port,
            state: EndpointState::Healthy,
            weight: 100,
            labels: HashMap::new(),
            start_time_ms: None,
            id,
        }
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_state(mut self, state: EndpointState) -> Self {
        self.state = state;
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_unit(self, unit: impl Into<String>) -> Self {
        self.with_label(labels::UNIT, unit)
    }

    pub fn with_cell(self, cell: impl Into<String>) -> Self {
        self.with_label(labels::CELL, cell)
    }

    pub fn with_lane(self, lane: impl Into<String>) -> Self {
        self.with_label(labels::LANE, lane)
    }

    pub fn with_start_time(mut self, started: SystemTime) -> Self {
        self.start_time_ms = started
            .duration_since(SystemTime::UNIX_EPOCH)
            .ok()
            .map(|d| d.as_millis() as u64);
        self
    }
}

impl Endpoint for ServiceEndpoint {
    fn id(&self) -> &str {
        &self.id
    }

    fn host(&self) -> &str {
        &self.host
    }

    fn port(&self) -> u16 {
        self.port
    }

    fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    fn state(&self) -> EndpointState {
        self.state
    }

    fn declared_weight(&self) -> u32 {
        self.weight
    }

    fn start_time(&self) -> Option<SystemTime> {
        self.start_time_ms
            .map(|ms| SystemTime::UNIX_EPOCH + Duration::from_millis(ms))
    }
}

impl<E: Endpoint + ?Sized> Endpoint for &E {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn host(&self) -> &str {
        (**self).host()
    }

    fn port(&self) -> u16 {
        (**self).port()
    }

    fn label(&self, key: &str) -> Option<&str> {
        (**self).label(key)
    }

    fn state(&self) -> EndpointState {
        (**self).state()
    }

    fn declared_weight(&self) -> u32 {
        (**self).declared_weight()
    }

    fn start_time(&self) -> Option<SystemTime> {
        (**self).start_time()
    }
}

/// Per-call context handed to routing, election and admission.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub service: String,
    pub method: Option<String>,
    /// Labels of the calling side (its unit, cell, lane), matched against endpoint labels.
    pub labels: HashMap<String, String>,
    /// Moment used for warm-up uptime; defaults to construction time.
    pub issued_at: SystemTime,
}

impl OutboundRequest {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            method: None,
            labels: HashMap::new(),
            issued_at: SystemTime::now(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_issued_at(mut self, at: SystemTime) -> Self {
        self.issued_at = at;
        self
    }
}
