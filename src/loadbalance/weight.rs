use crate::endpoint::Endpoint;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

pub const DEFAULT_WEIGHT: u32 = 100;
pub const DEFAULT_WARMUP: Duration = Duration::from_secs(10 * 60);

/// Computes the request-time weight of an endpoint.
///
/// A declared weight of zero falls back to `default_weight`. During the warm-up
/// window after an endpoint's start time the weight ramps linearly from 1 to the
/// declared value; a start time in the future (clock skew) yields 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarmupWeigher {
    /// Ramp length; zero disables warm-up.
    #[serde(rename = "warmup_ms", with = "crate::utils::duration_ms")]
    pub warmup: Duration,
    pub default_weight: u32,
}

impl Default for WarmupWeigher {
    fn default() -> Self {
        Self {
            warmup: DEFAULT_WARMUP,
            default_weight: DEFAULT_WEIGHT,
        }
    }
}

impl WarmupWeigher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_warmup(mut self, warmup: Duration) -> Self {
        self.warmup = warmup;
        self
    }

    pub fn with_default_weight(mut self, weight: u32) -> Self {
        self.default_weight = weight;
        self
    }

    /// Full weight, no ramp.
    pub fn disabled() -> Self {
        Self::default().with_warmup(Duration::ZERO)
    }

    pub fn declared<E: Endpoint + ?Sized>(&self, endpoint: &E) -> u32 {
        match endpoint.declared_weight() {
            0 => self.default_weight.max(1),
            w => w,
        }
    }

    pub fn weight<E: Endpoint + ?Sized>(&self, endpoint: &E, now: SystemTime) -> u32 {
        let declared = self.declared(endpoint);
        if self.warmup.is_zero() {
            return declared;
        }
        let Some(started) = endpoint.start_time() else {
            return declared;
        };
        match now.duration_since(started) {
            Ok(uptime) => ramp(declared, uptime, self.warmup),
            Err(_) => 1,
        }
    }
}

/// `max(1, min(declared, uptime * declared / warmup))` inside the window, `declared` after it.
pub fn ramp(declared: u32, uptime: Duration, warmup: Duration) -> u32 {
    if warmup.is_zero() || uptime >= warmup {
        return declared;
    }
    let scaled = uptime.as_millis() * declared as u128 / warmup.as_millis().max(1);
    (scaled.min(declared as u128) as u32).max(1)
}
