use axum::Json;
use chrono::Utc;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    service: String,
    time: String,
}

fn healthy(service: &str) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: service.to_string(),
        time: Utc::now().to_rfc3339(),
    })
}

/// Health check endpoint for the API gateway
pub async fn gateway_health() -> Json<HealthResponse> {
    healthy("api-gateway")
}

/// Health check endpoint for the broadcast service
pub async fn broadcast_health() -> Json<HealthResponse> {
    healthy("broadcast")
}
