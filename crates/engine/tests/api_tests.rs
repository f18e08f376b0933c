//! Integration tests for the engine's health and metrics endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use billing_engine::api::{create_router, AppState};
use billing_lib::{
    health::components, BillingMetrics, Degradation, HealthRegistry, RefreshSummary,
};
use std::sync::Arc;
use tower::ServiceExt;

async fn setup_test_app() -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    health_registry.register(components::TARIFF_STORE).await;
    health_registry.register(components::REFRESH_WORKER).await;

    let state = Arc::new(AppState::new(health_registry, BillingMetrics::new()));
    let router = create_router(state.clone());

    (router, state)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app().await;

    let (status, body) = get(app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);

    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "healthy");
    assert!(health["components"]["tariff_store"].is_object());
    assert!(health["components"]["refresh_worker"].is_object());
}

#[tokio::test]
async fn test_healthz_ok_when_tariff_store_degraded() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .observe_degradations(&[Degradation::TariffUnavailable("timed out".into())])
        .await;

    let (status, body) = get(app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);

    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "degraded");
    assert_eq!(health["components"]["tariff_store"]["status"], "degraded");
}

#[tokio::test]
async fn test_healthz_returns_503_when_every_refresh_failed() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .observe_refresh(&RefreshSummary {
            refreshed: 0,
            degraded: 0,
            failed: 4,
            ..Default::default()
        })
        .await;

    let (status, body) = get(app, "/healthz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_returns_503_until_ready() {
    let (app, state) = setup_test_app().await;

    let (status, body) = get(app.clone(), "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], false);

    state.health_registry.set_ready(true).await;

    let (status, body) = get(app, "/readyz").await;
    assert_eq!(status, StatusCode::OK);
    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_readyz_returns_503_when_ready_but_unhealthy() {
    let (app, state) = setup_test_app().await;

    state.health_registry.set_ready(true).await;
    state
        .health_registry
        .set_unhealthy(components::WORKLOAD_STORE, "connection refused")
        .await;

    let (status, body) = get(app, "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(readiness["reason"]
        .as_str()
        .unwrap()
        .contains(components::WORKLOAD_STORE));
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let (app, state) = setup_test_app().await;

    state.metrics.observe_computation_latency(0.0004);
    state.metrics.inc_computations("complete");
    state.metrics.inc_tariff_fallbacks("store_unavailable");
    state.metrics.inc_cache_hits();
    state.metrics.set_cached_entries(3);

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    assert!(metrics_text.contains("billing_engine_computation_latency_seconds_bucket"));
    assert!(metrics_text.contains("billing_engine_computations_total"));
    assert!(metrics_text.contains("billing_engine_tariff_fallbacks_total"));
    assert!(metrics_text.contains("billing_engine_cache_hits_total"));
    assert!(metrics_text.contains("billing_engine_cached_entries"));
}
