//! Prometheus scrape endpoint

use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use prometheus::{Registry, TextEncoder};
use serde_json::{json, Value};
use tracing::error;

#[derive(Clone)]
pub struct MetricsState {
    registry: Registry,
}

pub fn router(registry: Registry) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(MetricsState { registry })
}

pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "cronpilot-server",
    }))
}

pub async fn metrics_handler(State(state): State<MetricsState>) -> Result<String, StatusCode> {
    TextEncoder::new()
        .encode_to_string(&state.registry.gather())
        .map_err(|e| {
            error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::IntCounter;

    #[tokio::test]
    async fn test_metrics_handler_renders_registry() {
        let registry = Registry::new();
        let counter = IntCounter::new("cronpilot_test_total", "test counter").unwrap();
        registry.register(Box::new(counter.clone())).unwrap();
        counter.inc();

        let body = metrics_handler(State(MetricsState { registry }))
            .await
            .unwrap();
        assert!(body.contains("cronpilot_test_total 1"));
    }

    #[tokio::test]
    async fn test_health_handler() {
        let Json(body) = health_handler().await;
        assert_eq!(body["status"], "healthy");
    }
}
