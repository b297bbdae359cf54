use actix_web::http::header::ContentType;
use actix_web::web::ThinData;
use actix_web::{HttpResponse, Responder, get};
use metrics_exporter_prometheus::PrometheusHandle;

#[utoipa::path(
    summary = "Prometheus metrics",
    description = "Renders every recorded metric in the Prometheus text format.",
    responses(
        (status = 200, description = "Metrics rendered", body = String, content_type = "text/plain")
    ),
    tag = "Health"
)]
#[get("/metrics")]
pub async fn metrics(ThinData(handle): ThinData<PrometheusHandle>) -> impl Responder {
    HttpResponse::Ok()
        .insert_header(ContentType::plaintext())
        .body(handle.render())
}
