//! Health check state and handler
//!
//! The health flag starts healthy and flips to unhealthy exactly once, when
//! graceful shutdown begins. Orchestrators polling the health endpoint then
//! stop routing new traffic to the instance while in-flight requests drain.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Health check response
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    /// `ok` or `unhealthy`
    pub status: String,
}

impl HealthResponse {
    fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }

    fn unhealthy() -> Self {
        Self {
            status: "unhealthy".to_string(),
        }
    }
}

/// Shared, lock-free health flag
///
/// Clones share the same flag. The transition is one-way: once
/// [`HealthState::set_unhealthy`] has been called the state never reports
/// healthy again.
#[derive(Debug, Clone, Default)]
pub struct HealthState {
    unhealthy: Arc<AtomicBool>,
}

impl HealthState {
    /// Create a new health state (initially healthy)
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether the service is healthy
    pub fn is_healthy(&self) -> bool {
        !self.unhealthy.load(Ordering::Acquire)
    }

    /// Mark the service as unhealthy
    ///
    /// Idempotent. Returns `true` only for the call that performed the
    /// transition.
    pub fn set_unhealthy(&self) -> bool {
        !self.unhealthy.swap(true, Ordering::AcqRel)
    }
}

/// Health check handler
///
/// Returns `200 {"status":"ok"}` while healthy and
/// `500 {"status":"unhealthy"}` once shutdown has started.
pub async fn health_check(State(state): State<HealthState>) -> impl IntoResponse {
    if state.is_healthy() {
        (StatusCode::OK, Json(HealthResponse::ok()))
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(HealthResponse::unhealthy()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::get, Router};
    use tower::ServiceExt;

    fn router(state: HealthState) -> Router {
        Router::new().route("/health", get(health_check).with_state(state))
    }

    async fn probe(state: &HealthState) -> (StatusCode, String) {
        let response = router(state.clone())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn test_new_state_is_healthy() {
        let state = HealthState::new();
        assert!(state.is_healthy());
        assert!(HealthState::default().is_healthy());
    }

    #[test]
    fn test_set_unhealthy_is_monotonic_and_idempotent() {
        let state = HealthState::new();
        assert!(state.set_unhealthy());
        assert!(!state.is_healthy());

        for _ in 0..10 {
            assert!(!state.set_unhealthy());
            assert!(!state.is_healthy());
        }
    }

    #[test]
    fn test_clones_share_the_flag() {
        let state = HealthState::new();
        let reader = state.clone();

        state.set_unhealthy();
        assert!(!reader.is_healthy());
    }

    #[test]
    fn test_concurrent_set_unhealthy_transitions_once() {
        let state = HealthState::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let state = state.clone();
                std::thread::spawn(move || state.set_unhealthy())
            })
            .collect();

        let transitions = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|transitioned| *transitioned)
            .count();

        assert_eq!(transitions, 1);
        assert!(!state.is_healthy());
    }

    #[tokio::test]
    async fn test_health_check_ok_when_healthy() {
        let state = HealthState::new();
        let (status, body) = probe(&state).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn test_health_check_500_when_unhealthy() {
        let state = HealthState::new();
        state.set_unhealthy();

        let (status, body) = probe(&state).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, r#"{"status":"unhealthy"}"#);
    }
}
