use actix_web::error::{InternalError, JsonPayloadError, QueryPayloadError};
use actix_web::{HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod auth;
pub mod health_check;
pub mod metrics;
pub mod notifications;
pub mod staff;

/// Body of every error response not caused by request validation.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorMessage {
    #[schema(example = "internal server error")]
    pub error: String,
}

/// Body of a 400 response. `message` joins every validation failure.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ValidationErrorResponse {
    #[schema(example = "name must not be empty, salary must be a positive number")]
    pub message: String,
    #[schema(value_type = Option<Object>)]
    pub data: Option<serde_json::Value>,
}

impl ValidationErrorResponse {
    pub fn new(messages: &[String]) -> Self {
        Self {
            message: messages.join(", "),
            data: None,
        }
    }
}

/// Paging metadata of a listing response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Pagination {
    #[schema(example = 10)]
    pub limit: u64,
    #[schema(example = 1)]
    pub page: u64,
    #[schema(example = 3)]
    pub total_page: u64,
    #[schema(example = 25)]
    pub total_data: u64,
}

impl Pagination {
    pub fn new(page: u64, limit: u64, total_data: u64) -> Self {
        Self {
            limit,
            page,
            total_page: total_data.div_ceil(limit.max(1)),
            total_data,
        }
    }
}

/// Renders malformed JSON bodies with the validation error envelope.
pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let response = HttpResponse::BadRequest().json(ValidationErrorResponse::new(&[err.to_string()]));
    InternalError::from_response(err, response).into()
}

/// Renders unparsable query strings with the validation error envelope.
pub fn query_error_handler(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let response = HttpResponse::BadRequest().json(ValidationErrorResponse::new(&[err.to_string()]));
    InternalError::from_response(err, response).into()
}
