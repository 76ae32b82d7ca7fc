use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use super::error::RegistryError;

/// Liveness and consecutive probe counters of a backend.
///
/// All three fields live behind the same lock so a health transition is
/// never observed half-applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthState {
    /// Whether the backend may be selected
    pub alive: bool,
    /// Count of consecutive passing probes
    pub consecutive_successes: u32,
    /// Count of consecutive failing probes
    pub consecutive_failures: u32,
}

impl Default for HealthState {
    fn default() -> Self {
        Self {
            alive: true,
            consecutive_successes: 0,
            consecutive_failures: 0,
        }
    }
}

/// An upstream server requests can be forwarded to.
///
/// Identity and URL are fixed at creation. Request, error and active
/// connection counters are atomics and may be touched from any number of
/// request tasks at once. Liveness and the consecutive probe counters are
/// guarded by a per-backend lock.
///
/// # Examples
///
/// ```
/// use fulcrum::registry::Backend;
///
/// let backend = Backend::parse("http://127.0.0.1:9001", 3).unwrap();
/// assert_eq!(backend.id(), "http://127.0.0.1:9001");
/// assert_eq!(backend.weight(), 3);
/// assert!(backend.is_alive());
/// ```
#[derive(Debug)]
pub struct Backend {
    id: String,
    url: Url,
    weight: AtomicU32,
    requests: AtomicU64,
    errors: AtomicU64,
    active_connections: AtomicU64,
    last_error_at: Mutex<Option<DateTime<Utc>>>,
    health: RwLock<HealthState>,
}

impl Backend {
    /// Create a backend from an already parsed URL.
    ///
    /// The backend starts alive with all counters at zero.
    pub fn new(url: Url, weight: u32) -> Self {
        let id = url.as_str().trim_end_matches('/').to_string();
        Self {
            id,
            url,
            weight: AtomicU32::new(weight),
            requests: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            last_error_at: Mutex::new(None),
            health: RwLock::new(HealthState::default()),
        }
    }

    /// Parse `raw` as a base URL and create a backend from it.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::InvalidUrl` if the string is not an absolute
    /// `http`/`https` URL with a host.
    pub fn parse(raw: &str, weight: u32) -> Result<Self, RegistryError> {
        let url = Url::parse(raw.trim()).map_err(|e| RegistryError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(RegistryError::InvalidUrl {
                url: raw.to_string(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        if url.host_str().is_none() {
            return Err(RegistryError::InvalidUrl {
                url: raw.to_string(),
                reason: "missing host".to_string(),
            });
        }

        Ok(Self::new(url, weight))
    }

    /// Identity of the backend: its base URL without a trailing slash.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Parsed base URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn weight(&self) -> u32 {
        self.weight.load(Ordering::SeqCst)
    }

    /// Replace the weight, returning the previous value.
    pub fn set_weight(&self, weight: u32) -> u32 {
        self.weight.swap(weight, Ordering::SeqCst)
    }

    pub fn increment_requests(&self) -> u64 {
        self.requests.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }

    /// Count an error and remember when it happened.
    pub fn increment_errors(&self) -> u64 {
        let count = self.errors.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_error_at.lock() = Some(Utc::now());
        count
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::SeqCst)
    }

    pub fn last_error_at(&self) -> Option<DateTime<Utc>> {
        *self.last_error_at.lock()
    }

    /// Atomically increment the in-flight connection counter.
    ///
    /// Returns the new value after increment.
    pub fn increment_active(&self) -> u64 {
        self.active_connections.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Atomically decrement the in-flight connection counter (saturating at 0).
    ///
    /// If already at 0, logs a warning and returns 0.
    pub fn decrement_active(&self) -> u64 {
        loop {
            let current = self.active_connections.load(Ordering::SeqCst);
            if current == 0 {
                tracing::warn!(
                    backend = %self.id,
                    "Attempted to decrement active connections when already at 0"
                );
                return 0;
            }

            match self.active_connections.compare_exchange(
                current,
                current - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return current - 1,
                Err(_) => continue,
            }
        }
    }

    pub fn active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::SeqCst)
    }

    pub fn is_alive(&self) -> bool {
        self.health.read().alive
    }

    pub fn set_alive(&self, alive: bool) {
        self.health.write().alive = alive;
    }

    pub fn consecutive_successes(&self) -> u32 {
        self.health.read().consecutive_successes
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.health.read().consecutive_failures
    }

    /// Copy of the current liveness and probe counters.
    pub fn health_state(&self) -> HealthState {
        *self.health.read()
    }

    /// Run `f` against the health state while holding the write lock.
    ///
    /// Used by the health checker to apply a probe outcome and any resulting
    /// alive/dead transition as one step.
    pub fn update_health<R>(&self, f: impl FnOnce(&mut HealthState) -> R) -> R {
        let mut state = self.health.write();
        f(&mut state)
    }
}

/// Serializable view of a Backend (atomic fields converted to plain values).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendView {
    pub url: String,
    pub weight: u32,
    pub alive: bool,
    pub requests: u64,
    pub errors: u64,
    pub active_connections: u64,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
    pub last_error_at: Option<DateTime<Utc>>,
}

impl From<&Backend> for BackendView {
    fn from(backend: &Backend) -> Self {
        let health = backend.health_state();
        Self {
            url: backend.id.clone(),
            weight: backend.weight(),
            alive: health.alive,
            requests: backend.requests(),
            errors: backend.errors(),
            active_connections: backend.active_connections(),
            consecutive_successes: health.consecutive_successes,
            consecutive_failures: health.consecutive_failures,
            last_error_at: backend.last_error_at(),
        }
    }
}
