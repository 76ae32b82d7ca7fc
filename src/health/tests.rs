//! Unit tests for health module.

use super::*;
use crate::registry::HealthState;
use std::time::Duration;

fn thresholds(success: u32, failure: u32) -> HealthCheckConfig {
    HealthCheckConfig {
        success_threshold: success,
        failure_threshold: failure,
        ..Default::default()
    }
}

fn dead() -> HealthState {
    HealthState {
        alive: false,
        ..Default::default()
    }
}

// ============================================================================
// HealthCheckConfig
// ============================================================================

#[test]
fn test_config_default_values() {
    let config = HealthCheckConfig::default();
    assert!(config.enabled);
    assert_eq!(config.interval_seconds, 10);
    assert_eq!(config.timeout_seconds, 5);
    assert_eq!(config.path, "/health");
    assert_eq!(config.method, "GET");
    assert_eq!(config.success_threshold, 3);
    assert_eq!(config.failure_threshold, 3);
}

#[test]
fn test_config_toml_parsing() {
    let toml = r#"
        enabled = true
        interval_seconds = 30
        timeout_seconds = 2
        path = "/ping"
        method = "HEAD"
        success_threshold = 2
        failure_threshold = 5
    "#;
    let config: HealthCheckConfig = toml::from_str(toml).unwrap();
    assert_eq!(config.interval(), Duration::from_secs(30));
    assert_eq!(config.timeout(), Duration::from_secs(2));
    assert_eq!(config.path, "/ping");
    assert_eq!(config.method, "HEAD");
    assert_eq!(config.success_threshold, 2);
    assert_eq!(config.failure_threshold, 5);
}

#[test]
fn test_config_partial_toml() {
    let toml = r#"
        enabled = false
    "#;
    let config: HealthCheckConfig = toml::from_str(toml).unwrap();
    assert!(!config.enabled);
    assert_eq!(config.interval_seconds, 10); // default
    assert_eq!(config.path, "/health"); // default
}

#[test]
fn test_config_apply_defaults_replaces_zero_values() {
    let mut config = HealthCheckConfig {
        enabled: true,
        interval_seconds: 0,
        timeout_seconds: 0,
        path: String::new(),
        method: String::new(),
        success_threshold: 0,
        failure_threshold: 0,
    };
    config.apply_defaults();
    assert_eq!(config, HealthCheckConfig::default());
}

#[test]
fn test_config_apply_defaults_prefixes_path() {
    let mut config = HealthCheckConfig {
        path: "status".to_string(),
        ..Default::default()
    };
    config.apply_defaults();
    assert_eq!(config.path, "/status");
}

// ============================================================================
// HealthCheckError
// ============================================================================

#[test]
fn test_error_display() {
    assert_eq!(
        HealthCheckError::Timeout(5).to_string(),
        "request timeout after 5s"
    );
    assert_eq!(
        HealthCheckError::ConnectionFailed("refused".to_string()).to_string(),
        "connection failed: refused"
    );
    assert_eq!(
        HealthCheckError::HttpError(503).to_string(),
        "unexpected HTTP status from backend: 503"
    );
}

#[test]
fn test_result_serializes_latency_and_error() {
    let result = HealthCheckResult::unhealthy(
        "http://localhost:9001",
        Duration::from_millis(42),
        HealthCheckError::HttpError(500),
    );
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["status"], "unhealthy");
    assert_eq!(json["latency_ms"], 42);
    assert_eq!(json["error"], "unexpected HTTP status from backend: 500");
    assert!(!result.is_healthy());
}

// ============================================================================
// Hysteresis
// ============================================================================

#[test]
fn test_alive_backend_fails_only_on_third_consecutive_failure() {
    let config = thresholds(3, 3);
    let mut state = HealthState::default();

    assert_eq!(apply_outcome(&mut state, HealthStatus::Unhealthy, &config), None);
    assert!(state.alive);
    assert_eq!(apply_outcome(&mut state, HealthStatus::Unhealthy, &config), None);
    assert!(state.alive);

    let transition = apply_outcome(&mut state, HealthStatus::Unhealthy, &config);
    assert_eq!(
        transition,
        Some(Transition::Failed {
            consecutive_failures: 3
        })
    );
    assert!(!state.alive);
}

#[test]
fn test_interleaved_success_resets_failure_count() {
    let config = thresholds(3, 3);
    let mut state = HealthState::default();

    apply_outcome(&mut state, HealthStatus::Unhealthy, &config);
    apply_outcome(&mut state, HealthStatus::Unhealthy, &config);
    apply_outcome(&mut state, HealthStatus::Healthy, &config);
    assert_eq!(state.consecutive_failures, 0);
    assert_eq!(state.consecutive_successes, 1);

    apply_outcome(&mut state, HealthStatus::Unhealthy, &config);
    apply_outcome(&mut state, HealthStatus::Unhealthy, &config);
    assert!(state.alive);

    apply_outcome(&mut state, HealthStatus::Unhealthy, &config);
    assert!(!state.alive);
}

#[test]
fn test_dead_backend_recovers_on_third_consecutive_success() {
    let config = thresholds(3, 3);
    let mut state = dead();

    assert_eq!(apply_outcome(&mut state, HealthStatus::Healthy, &config), None);
    assert_eq!(apply_outcome(&mut state, HealthStatus::Healthy, &config), None);
    assert!(!state.alive);

    let transition = apply_outcome(&mut state, HealthStatus::Healthy, &config);
    assert_eq!(
        transition,
        Some(Transition::Recovered {
            consecutive_successes: 3
        })
    );
    assert!(state.alive);
}

#[test]
fn test_interleaved_failure_resets_success_count() {
    let config = thresholds(3, 3);
    let mut state = dead();

    apply_outcome(&mut state, HealthStatus::Healthy, &config);
    apply_outcome(&mut state, HealthStatus::Healthy, &config);
    apply_outcome(&mut state, HealthStatus::Unhealthy, &config);
    apply_outcome(&mut state, HealthStatus::Healthy, &config);
    apply_outcome(&mut state, HealthStatus::Healthy, &config);
    assert!(!state.alive);
}

#[test]
fn test_transitions_are_edge_triggered() {
    let config = thresholds(1, 1);
    let mut state = HealthState::default();

    assert!(apply_outcome(&mut state, HealthStatus::Unhealthy, &config).is_some());
    // Already dead: further failures are not transitions
    assert!(apply_outcome(&mut state, HealthStatus::Unhealthy, &config).is_none());
    assert!(apply_outcome(&mut state, HealthStatus::Unhealthy, &config).is_none());
    assert_eq!(state.consecutive_failures, 3);

    assert!(apply_outcome(&mut state, HealthStatus::Healthy, &config).is_some());
    assert!(apply_outcome(&mut state, HealthStatus::Healthy, &config).is_none());
}

#[test]
fn test_success_on_alive_backend_is_not_a_transition() {
    let config = thresholds(3, 3);
    let mut state = HealthState::default();
    for _ in 0..5 {
        assert!(apply_outcome(&mut state, HealthStatus::Healthy, &config).is_none());
    }
    assert!(state.alive);
    assert_eq!(state.consecutive_successes, 5);
}

#[test]
fn test_unknown_status_leaves_state_untouched() {
    let config = thresholds(3, 3);
    let mut state = HealthState {
        alive: true,
        consecutive_successes: 2,
        consecutive_failures: 0,
    };
    assert!(apply_outcome(&mut state, HealthStatus::Unknown, &config).is_none());
    assert_eq!(state.consecutive_successes, 2);
}

// ============================================================================
// HealthChecker
// ============================================================================

#[test]
fn test_checker_rejects_invalid_method() {
    let config = HealthCheckConfig {
        method: "NOT A METHOD".to_string(),
        ..Default::default()
    };
    let result = HealthChecker::with_client(config, reqwest::Client::new());
    assert!(matches!(result, Err(HealthCheckError::InvalidRequest(_))));
}

#[test]
fn test_checker_normalizes_config() {
    let config = HealthCheckConfig {
        interval_seconds: 0,
        method: "head".to_string(),
        ..Default::default()
    };
    let checker = HealthChecker::with_client(config, reqwest::Client::new()).unwrap();
    assert_eq!(checker.config().interval_seconds, 10);
}

#[test]
fn test_apply_result_updates_backend_and_keeps_latest() {
    let checker =
        HealthChecker::with_client(thresholds(3, 2), reqwest::Client::new()).unwrap();
    let backend =
        std::sync::Arc::new(crate::registry::Backend::parse("http://localhost:9001", 1).unwrap());
    checker.register_backend(backend.clone());

    let failure = || {
        HealthCheckResult::unhealthy(
            backend.id(),
            Duration::from_millis(1),
            HealthCheckError::HttpError(500),
        )
    };

    assert!(checker.apply_result(&backend, failure()).is_none());
    assert!(checker.apply_result(&backend, failure()).is_some());
    assert!(!backend.is_alive());

    let latest = checker.result_for(backend.id()).unwrap();
    assert_eq!(latest.status, HealthStatus::Unhealthy);
    assert_eq!(checker.results().len(), 1);
}

#[test]
fn test_register_backend_is_idempotent() {
    let checker =
        HealthChecker::with_client(HealthCheckConfig::default(), reqwest::Client::new()).unwrap();
    let backend =
        std::sync::Arc::new(crate::registry::Backend::parse("http://localhost:9001", 1).unwrap());

    checker.register_backend(backend.clone());
    checker.register_backend(backend.clone());
    assert_eq!(checker.backend_count(), 1);

    checker.deregister_backend(backend.id());
    assert_eq!(checker.backend_count(), 0);
}

#[test]
fn test_result_for_deregistered_backend_is_discarded() {
    let checker =
        HealthChecker::with_client(thresholds(1, 1), reqwest::Client::new()).unwrap();
    let backend =
        std::sync::Arc::new(crate::registry::Backend::parse("http://localhost:9001", 1).unwrap());
    checker.register_backend(backend.clone());
    checker.deregister_backend(backend.id());

    // A probe that was in flight when the backend went away
    let late = HealthCheckResult::unhealthy(
        backend.id(),
        Duration::from_millis(1),
        HealthCheckError::HttpError(503),
    );
    assert!(checker.apply_result(&backend, late).is_none());

    assert!(checker.result_for(backend.id()).is_none());
    assert!(checker.results().is_empty());
    assert!(backend.is_alive());
    assert_eq!(backend.consecutive_failures(), 0);
}
