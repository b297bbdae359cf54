use actix_web::http::StatusCode;
use actix_web::web::{Bytes, Data, Json, Query};
use actix_web::{HttpResponse, Responder, ResponseError, get, patch};
use roster::error::RosterError;
use roster::notification::NotificationService;
use roster::types::{NotificationId, NotificationPayload};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::{IntoParams, ToSchema};

use crate::routes::{ErrorMessage, ValidationErrorResponse};
use crate::validation::Violations;

const DEFAULT_LIMIT: u32 = 50;

const MAX_LIMIT: u32 = 500;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("{}", .0.join(", "))]
    Validation(Vec<String>),

    #[error(transparent)]
    Roster(#[from] RosterError),
}

impl ResponseError for NotificationError {
    fn status_code(&self) -> StatusCode {
        match self {
            NotificationError::Validation(_) => StatusCode::BAD_REQUEST,
            NotificationError::Roster(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            NotificationError::Validation(messages) => HttpResponse::build(self.status_code())
                .json(ValidationErrorResponse::new(messages)),
            NotificationError::Roster(_) => {
                HttpResponse::build(self.status_code()).json(ErrorMessage {
                    error: "internal server error".to_string(),
                })
            }
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NotificationListParams {
    /// Number of notifications to return, newest first.
    #[param(example = 50)]
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReadNotificationsResponse {
    #[schema(example = "Notifications fetched successfully.")]
    pub message: String,
    pub data: Vec<NotificationPayload>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MarkedNotifications {
    #[schema(example = 5)]
    pub modified: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MarkNotificationsReadResponse {
    #[schema(example = "Notifications marked as read.")]
    pub message: String,
    pub data: MarkedNotifications,
}

#[utoipa::path(
    summary = "List notifications",
    description = "Returns the most recent notifications, newest first.",
    params(NotificationListParams),
    responses(
        (status = 200, description = "Notifications listed", body = ReadNotificationsResponse),
        (status = 400, description = "Invalid limit", body = ValidationErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorMessage)
    ),
    tag = "Notifications"
)]
#[get("/notifications")]
pub async fn read_notifications(
    notifications: Data<NotificationService>,
    params: Query<NotificationListParams>,
) -> Result<impl Responder, NotificationError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    if limit == 0 || limit > MAX_LIMIT {
        return Err(NotificationError::Validation(vec![
            "limit must be between 1 and 500".to_string(),
        ]));
    }

    let data = notifications.list(limit).await?;

    Ok(Json(ReadNotificationsResponse {
        message: "Notifications fetched successfully.".to_string(),
        data,
    }))
}

#[utoipa::path(
    summary = "Mark notifications as read",
    description = "Marks the notifications with the given ids as read. Without a body, or with \
        an empty array, every notification is marked. Returns how many changed.",
    request_body(content = Vec<String>, content_type = "application/json"),
    responses(
        (status = 200, description = "Notifications marked", body = MarkNotificationsReadResponse),
        (status = 400, description = "Invalid ids", body = ValidationErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorMessage)
    ),
    tag = "Notifications"
)]
#[patch("/notifications/read")]
pub async fn mark_notifications_read(
    notifications: Data<NotificationService>,
    body: Bytes,
) -> Result<impl Responder, NotificationError> {
    let ids = parse_ids(&body).map_err(NotificationError::Validation)?;
    let modified = notifications.mark_read(ids.as_deref()).await?;

    Ok(Json(MarkNotificationsReadResponse {
        message: "Notifications marked as read.".to_string(),
        data: MarkedNotifications { modified },
    }))
}

/// Reads an optional JSON array of notification ids. An empty body means every notification.
fn parse_ids(body: &[u8]) -> Result<Option<Vec<NotificationId>>, Vec<String>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let raw: Option<Vec<String>> = serde_json::from_slice(body)
        .map_err(|_| vec!["Body must be a JSON array of notification ids".to_string()])?;
    let Some(raw) = raw else {
        return Ok(None);
    };

    let mut violations = Violations::new();
    let ids = raw
        .iter()
        .filter_map(|id| violations.require_uuid(id, "Notification ID must be a valid UUID"))
        .collect();
    violations.into_result()?;

    Ok(Some(ids))
}
