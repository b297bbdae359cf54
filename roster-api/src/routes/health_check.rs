use actix_web::{HttpResponse, Responder, get};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthStatus {
    #[schema(example = "healthy")]
    pub status: String,
    #[schema(example = "2025-03-01T08:30:00.000Z")]
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthCheckResponse {
    #[schema(example = "Roster API is running.")]
    pub message: String,
    pub data: HealthStatus,
}

#[utoipa::path(
    summary = "Check service health",
    description = "Returns a healthy status while the HTTP server is accepting requests.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthCheckResponse)
    ),
    tag = "Health"
)]
#[get("/")]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(HealthCheckResponse {
        message: "Roster API is running.".to_string(),
        data: HealthStatus {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        },
    })
}
