//! Probe results and the per-backend hysteresis state machine.

use super::config::HealthCheckConfig;
use super::error::HealthCheckError;
use crate::registry::HealthState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome classification of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Backend answered with a 2xx status
    Healthy,
    /// Transport error, timeout, or non-2xx status
    Unhealthy,
    /// Not probed yet
    Unknown,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
            HealthStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Result of a health check
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResult {
    /// Identity of the probed backend
    pub backend: String,
    pub status: HealthStatus,
    /// Time until the response (or failure) was observed
    #[serde(rename = "latency_ms", serialize_with = "serialize_millis")]
    pub latency: Duration,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<HealthCheckError>,
    pub checked_at: DateTime<Utc>,
}

impl HealthCheckResult {
    pub fn healthy(backend: &str, latency: Duration) -> Self {
        Self {
            backend: backend.to_string(),
            status: HealthStatus::Healthy,
            latency,
            error: None,
            checked_at: Utc::now(),
        }
    }

    pub fn unhealthy(backend: &str, latency: Duration, error: HealthCheckError) -> Self {
        Self {
            backend: backend.to_string(),
            status: HealthStatus::Unhealthy,
            latency,
            error: Some(error),
            checked_at: Utc::now(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

fn serialize_error<S: serde::Serializer>(
    e: &Option<HealthCheckError>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match e {
        Some(err) => s.serialize_some(&err.to_string()),
        None => s.serialize_none(),
    }
}

/// An alive/dead flip caused by a probe outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Dead backend reached the success threshold
    Recovered { consecutive_successes: u32 },
    /// Alive backend reached the failure threshold
    Failed { consecutive_failures: u32 },
}

/// Apply one probe outcome to a backend's health state.
///
/// Returns `Some` only on the edge where `alive` actually changes.
pub fn apply_outcome(
    state: &mut HealthState,
    status: HealthStatus,
    config: &HealthCheckConfig,
) -> Option<Transition> {
    match status {
        HealthStatus::Healthy => {
            state.consecutive_failures = 0;
            state.consecutive_successes = state.consecutive_successes.saturating_add(1);

            if !state.alive && state.consecutive_successes >= config.success_threshold {
                state.alive = true;
                Some(Transition::Recovered {
                    consecutive_successes: state.consecutive_successes,
                })
            } else {
                None
            }
        }
        HealthStatus::Unhealthy => {
            state.consecutive_successes = 0;
            state.consecutive_failures = state.consecutive_failures.saturating_add(1);

            if state.alive && state.consecutive_failures >= config.failure_threshold {
                state.alive = false;
                Some(Transition::Failed {
                    consecutive_failures: state.consecutive_failures,
                })
            } else {
                None
            }
        }
        HealthStatus::Unknown => None,
    }
}
