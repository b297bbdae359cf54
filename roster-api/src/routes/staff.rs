use actix_multipart::{Field, Multipart, MultipartError};
use actix_web::http::StatusCode;
use actix_web::web::{Data, Json, Query};
use actix_web::{HttpResponse, Responder, ResponseError, delete, get, patch, post};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use roster::error::{ErrorKind, RosterError};
use roster::ingestion::{CommandProducer, CsvIngestion};
use roster::notification::NotificationService;
use roster::roster_error;
use roster::store::staff::StaffStore;
use roster::types::{
    SortOrder, StaffFields, StaffFilter, StaffId, StaffQuery, StaffRecord, StaffSortField,
};
use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;
use tokio_util::io::StreamReader;
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

use crate::routes::{ErrorMessage, Pagination, ValidationErrorResponse};
use crate::validation::{Validate, Violations, validate_batch};

const DEFAULT_PAGE: u64 = 1;

const DEFAULT_LIMIT: u64 = 10;

const MAX_LIMIT: u64 = 100;

/// Upload chunks buffered between the request body and the CSV reader.
const UPLOAD_CHUNK_BUFFER: usize = 4;

/// Multipart field carrying the CSV file.
const CSV_FILE_FIELD: &str = "file";

#[derive(Debug, Error)]
pub enum StaffError {
    #[error("{}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("CSV parse error")]
    CsvParse(#[source] RosterError),

    #[error("Upload error")]
    Upload(#[source] RosterError),

    #[error("The command queue did not accept the request")]
    QueueUnavailable(#[source] RosterError),

    #[error(transparent)]
    Roster(RosterError),
}

impl From<RosterError> for StaffError {
    fn from(err: RosterError) -> Self {
        match err.kind() {
            ErrorKind::CsvParseFailed => StaffError::CsvParse(err),
            ErrorKind::UploadFailed => StaffError::Upload(err),
            ErrorKind::QueueAcceptFailed => StaffError::QueueUnavailable(err),
            _ => StaffError::Roster(err),
        }
    }
}

impl StaffError {
    pub fn to_message(&self) -> String {
        match self {
            // Do not expose store details in error messages
            StaffError::Roster(_) => "internal server error".to_string(),
            e => e.to_string(),
        }
    }
}

impl ResponseError for StaffError {
    fn status_code(&self) -> StatusCode {
        match self {
            StaffError::Validation(_) => StatusCode::BAD_REQUEST,
            StaffError::QueueUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            StaffError::CsvParse(_) | StaffError::Upload(_) | StaffError::Roster(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            StaffError::Validation(messages) => HttpResponse::build(self.status_code())
                .json(ValidationErrorResponse::new(messages)),
            e => HttpResponse::build(self.status_code()).json(ErrorMessage {
                error: e.to_message(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateStaffRequest {
    #[schema(example = "Ada Lovelace", required = true)]
    pub name: String,
    #[schema(example = "Engineer", required = true)]
    pub position: String,
    #[schema(example = 36, required = true)]
    pub age: i32,
    #[schema(example = 4000000.0, required = true)]
    pub salary: f64,
}

impl Validate for CreateStaffRequest {
    fn validate(&self, violations: &mut Violations) {
        violations.require_text(&self.name, "Name is required");
        violations.require_text(&self.position, "Position is required");
        violations.require_positive(f64::from(self.age), "Age must be a positive number");
        violations.require_positive(self.salary, "Salary must be a positive number");
    }
}

impl From<CreateStaffRequest> for StaffFields {
    fn from(request: CreateStaffRequest) -> Self {
        StaffFields {
            name: Some(request.name.trim().to_string()),
            age: Some(request.age),
            position: Some(request.position.trim().to_string()),
            salary: Some(request.salary),
        }
    }
}

/// A sparse patch. Absent fields keep their stored value.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateStaffRequest {
    #[schema(example = "0195a1c2-7b7e-7cc0-a3b0-1f5b1e0c9d11", required = true)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "Ada King")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = 5000000.0)]
    pub salary: Option<f64>,
}

impl UpdateStaffRequest {
    fn into_patch(self) -> Result<(StaffId, StaffFields), StaffError> {
        let id = StaffId::parse_str(self.id.trim()).map_err(|_| {
            StaffError::Validation(vec!["Staff ID must be a valid UUID".to_string()])
        })?;

        let fields = StaffFields {
            name: self.name.map(|name| name.trim().to_string()),
            age: self.age,
            position: self.position.map(|position| position.trim().to_string()),
            salary: self.salary,
        };

        Ok((id, fields))
    }
}

impl Validate for UpdateStaffRequest {
    fn validate(&self, violations: &mut Violations) {
        violations.require_uuid(&self.id, "Staff ID must be a valid UUID");

        if let Some(name) = &self.name {
            violations.require_text(name, "Name is required");
        }
        if let Some(position) = &self.position {
            violations.require_text(position, "Position is required");
        }
        if let Some(age) = self.age {
            violations.require_positive(f64::from(age), "Age must be a positive number");
        }
        if let Some(salary) = self.salary {
            violations.require_positive(salary, "Salary must be a positive number");
        }

        if self.name.is_none()
            && self.position.is_none()
            && self.age.is_none()
            && self.salary.is_none()
        {
            violations.push("At least one field to update is required");
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QueuedStaff {
    #[schema(example = 10)]
    pub total_queued: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QueuedStaffResponse {
    #[schema(example = "Staff added to queue for processing successfully.")]
    pub message: String,
    pub data: QueuedStaff,
}

impl QueuedStaffResponse {
    fn new(message: &str, total_queued: usize) -> Self {
        Self {
            message: message.to_string(),
            data: QueuedStaff { total_queued },
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReadStaffResponse {
    #[schema(example = "Successfully retrieved staff data.")]
    pub message: String,
    pub data: Vec<StaffRecord>,
    pub pagination: Pagination,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StaffListParams {
    /// Page to return, starting at 1.
    #[param(example = 1)]
    pub page: Option<u64>,
    /// Records per page, at most 100.
    #[param(example = 10)]
    pub limit: Option<u64>,
    /// One of `name`, `age`, `position`, `salary`, `created_at`, `updated_at`.
    #[param(example = "created_at")]
    pub sort: Option<String>,
    /// `asc` or `desc`.
    #[param(example = "desc")]
    pub sorttype: Option<String>,
    /// Case-insensitive substring of the name or the position.
    pub search: Option<String>,
}

impl StaffListParams {
    /// Resolves defaults and validates every parameter. Returns the query and the page number.
    fn into_query(self) -> Result<(StaffQuery, u64), Vec<String>> {
        let mut violations = Violations::new();

        let page = self.page.unwrap_or(DEFAULT_PAGE);
        if page == 0 {
            violations.push("page must be at least 1");
        }

        let limit = self.limit.unwrap_or(DEFAULT_LIMIT);
        if limit == 0 || limit > MAX_LIMIT {
            violations.push("limit must be between 1 and 100");
        }

        let sort = match self.sort.as_deref() {
            None => StaffSortField::default(),
            Some(sort) => sort.parse::<StaffSortField>().unwrap_or_else(|_| {
                violations.push(
                    "sort must be one of name, age, position, salary, created_at, updated_at",
                );
                StaffSortField::default()
            }),
        };

        let order = match self.sorttype.as_deref() {
            None => SortOrder::default(),
            Some(order) => order.parse::<SortOrder>().unwrap_or_else(|_| {
                violations.push("sorttype must be asc or desc");
                SortOrder::default()
            }),
        };

        violations.into_result()?;

        let search = self
            .search
            .map(|search| search.trim().to_string())
            .filter(|search| !search.is_empty());

        let query = StaffQuery {
            filter: StaffFilter { search },
            skip: (page - 1).saturating_mul(limit),
            limit,
            sort,
            order,
        };

        Ok((query, page))
    }
}

/// Creates a notification about accepted commands. The commands are queued already, so a
/// failure is logged rather than returned.
async fn announce(notifications: &NotificationService, title: &str, message: &str) {
    if let Err(err) = notifications.create(title, message).await {
        warn!(error = %err, title, "failed to create notification");
    }
}

#[utoipa::path(
    summary = "Queue new staff records",
    description = "Validates the batch and queues one insert command per element, in order.",
    request_body = [CreateStaffRequest],
    responses(
        (status = 200, description = "Staff records queued", body = QueuedStaffResponse),
        (status = 400, description = "Invalid request body", body = ValidationErrorResponse),
        (status = 503, description = "Command queue unavailable", body = ErrorMessage)
    ),
    tag = "Staff"
)]
#[post("/staff/add")]
pub async fn add_staff(
    producer: Data<CommandProducer>,
    notifications: Data<NotificationService>,
    staff: Json<Vec<CreateStaffRequest>>,
) -> Result<impl Responder, StaffError> {
    let staff = staff.into_inner();
    validate_batch(&staff, "At least one staff record is required")
        .map_err(StaffError::Validation)?;

    let queued = producer
        .enqueue_inserts(staff.into_iter().map(StaffFields::from).collect())
        .await?;

    announce(
        &notifications,
        "Staff queued",
        &format!("Queued {queued} staff records for insertion."),
    )
    .await;

    Ok(Json(QueuedStaffResponse::new(
        "Staff added to queue for processing successfully.",
        queued,
    )))
}

#[utoipa::path(
    summary = "Queue staff updates",
    description = "Queues one sparse update command per element. Only present fields change.",
    request_body = [UpdateStaffRequest],
    responses(
        (status = 200, description = "Updates queued", body = QueuedStaffResponse),
        (status = 400, description = "Invalid request body", body = ValidationErrorResponse),
        (status = 503, description = "Command queue unavailable", body = ErrorMessage)
    ),
    tag = "Staff"
)]
#[patch("/staff/update")]
pub async fn update_staff(
    producer: Data<CommandProducer>,
    notifications: Data<NotificationService>,
    updates: Json<Vec<UpdateStaffRequest>>,
) -> Result<impl Responder, StaffError> {
    let updates = updates.into_inner();
    validate_batch(&updates, "At least one staff record is required")
        .map_err(StaffError::Validation)?;

    let patches = updates
        .into_iter()
        .map(UpdateStaffRequest::into_patch)
        .collect::<Result<Vec<_>, _>>()?;
    let queued = producer.enqueue_updates(patches).await?;

    announce(
        &notifications,
        "Staff update",
        &format!("Queued updates for {queued} staff records."),
    )
    .await;

    Ok(Json(QueuedStaffResponse::new(
        "Staff update added to queue for processing successfully.",
        queued,
    )))
}

#[utoipa::path(
    summary = "Queue staff deletions",
    description = "Queues one delete command per id. Unknown ids are ignored by the workers.",
    request_body = [String],
    responses(
        (status = 200, description = "Deletions queued", body = QueuedStaffResponse),
        (status = 400, description = "Invalid request body", body = ValidationErrorResponse),
        (status = 503, description = "Command queue unavailable", body = ErrorMessage)
    ),
    tag = "Staff"
)]
#[delete("/staff/remove")]
pub async fn remove_staff(
    producer: Data<CommandProducer>,
    notifications: Data<NotificationService>,
    ids: Json<Vec<String>>,
) -> Result<impl Responder, StaffError> {
    let ids = ids.into_inner();

    let mut violations = Violations::new();
    if ids.is_empty() {
        violations.push("At least one staff ID is required");
    }
    let ids: Vec<StaffId> = ids
        .iter()
        .filter_map(|id| violations.require_uuid(id, "Staff ID must be a valid UUID"))
        .collect();
    violations.into_result().map_err(StaffError::Validation)?;

    let queued = producer.enqueue_deletes(ids).await?;

    announce(
        &notifications,
        "Staff delete",
        &format!("Queued deletion of {queued} staff records."),
    )
    .await;

    Ok(Json(QueuedStaffResponse::new(
        "Staff deletion added to queue for processing successfully.",
        queued,
    )))
}

#[utoipa::path(
    summary = "Import staff from CSV",
    description = "Streams the `file` part of a multipart upload, a CSV with the header \
        `name,position,salary,age`, into the command queue in batches. Rows flushed before a \
        parse error stay queued.",
    request_body(
        content = String,
        description = "Multipart form whose `file` part holds the CSV",
        content_type = "multipart/form-data"
    ),
    responses(
        (status = 200, description = "Rows queued", body = QueuedStaffResponse),
        (status = 400, description = "No CSV file in the upload", body = ValidationErrorResponse),
        (status = 500, description = "CSV parse error or upload error", body = ErrorMessage),
        (status = 503, description = "Command queue unavailable", body = ErrorMessage)
    ),
    tag = "Staff"
)]
#[post("/staff/add/csv")]
pub async fn add_staff_csv(
    ingestion: Data<CsvIngestion>,
    notifications: Data<NotificationService>,
    mut form: Multipart,
) -> Result<impl Responder, StaffError> {
    let mut file = csv_file_field(&mut form).await?;

    // Multipart fields are not `Send`, so the file chunks are forwarded through a channel to
    // the reader running on the blocking pool.
    let (mut chunks_tx, chunks_rx) =
        futures::channel::mpsc::channel::<Result<Bytes, io::Error>>(UPLOAD_CHUNK_BUFFER);

    let forward = async move {
        while let Some(chunk) = file.next().await {
            let chunk = chunk.map_err(|err| io::Error::other(err.to_string()));
            let failed = chunk.is_err();

            // The reader stops early on malformed rows.
            if chunks_tx.send(chunk).await.is_err() || failed {
                break;
            }
        }
    };

    let (report, ()) = futures::join!(ingestion.ingest(StreamReader::new(chunks_rx)), forward);
    let report = report?;

    info!(
        total_queued = report.total_queued,
        batches = report.batches.len(),
        "csv upload queued"
    );

    announce(
        &notifications,
        "CSV import",
        &format!("Importing {} CSV rows.", report.total_queued),
    )
    .await;

    Ok(Json(QueuedStaffResponse::new(
        "Staff added to queue for processing successfully.",
        report.total_queued,
    )))
}

/// Skips ahead to the part named [`CSV_FILE_FIELD`].
async fn csv_file_field(form: &mut Multipart) -> Result<Field, StaffError> {
    while let Some(field) = form.next().await {
        let field = field.map_err(upload_error)?;
        if field.name() == Some(CSV_FILE_FIELD) {
            return Ok(field);
        }
    }

    Err(StaffError::Validation(vec![format!(
        "A CSV file is required in the `{CSV_FILE_FIELD}` field"
    )]))
}

fn upload_error(err: MultipartError) -> StaffError {
    StaffError::Upload(roster_error!(
        ErrorKind::UploadFailed,
        "Reading the multipart upload failed",
        err
    ))
}

#[utoipa::path(
    summary = "List staff records",
    description = "Returns one page of staff records, filtered, sorted and paginated.",
    params(StaffListParams),
    responses(
        (status = 200, description = "Staff records listed", body = ReadStaffResponse),
        (status = 400, description = "Invalid query parameters", body = ValidationErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorMessage)
    ),
    tag = "Staff"
)]
#[get("/staff/data")]
pub async fn read_staff(
    store: Data<dyn StaffStore>,
    params: Query<StaffListParams>,
) -> Result<impl Responder, StaffError> {
    let (query, page) = params
        .into_inner()
        .into_query()
        .map_err(StaffError::Validation)?;

    let total_data = store.count(&query.filter).await?;
    let data = store.find(&query).await?;

    Ok(Json(ReadStaffResponse {
        message: "Successfully retrieved staff data.".to_string(),
        data,
        pagination: Pagination::new(page, query.limit, total_data),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_defaults_to_newest_first() {
        let (query, page) = StaffListParams::default().into_query().unwrap();

        assert_eq!(page, 1);
        assert_eq!(query.skip, 0);
        assert_eq!(query.limit, 10);
        assert_eq!(query.sort, StaffSortField::CreatedAt);
        assert_eq!(query.order, SortOrder::Desc);
        assert_eq!(query.filter.search, None);
    }

    #[test]
    fn listing_parameters_are_validated_together() {
        let params = StaffListParams {
            page: Some(0),
            limit: Some(500),
            sort: Some("department".to_string()),
            sorttype: Some("up".to_string()),
            search: None,
        };

        let messages = params.into_query().unwrap_err();

        assert_eq!(messages.len(), 4);
    }

    #[test]
    fn later_pages_skip_earlier_records() {
        let params = StaffListParams {
            page: Some(3),
            limit: Some(20),
            sort: Some("salary".to_string()),
            sorttype: Some("asc".to_string()),
            search: Some("  eng ".to_string()),
        };

        let (query, page) = params.into_query().unwrap();

        assert_eq!(page, 3);
        assert_eq!(query.skip, 40);
        assert_eq!(query.sort, StaffSortField::Salary);
        assert_eq!(query.order, SortOrder::Asc);
        assert_eq!(query.filter.search.as_deref(), Some("eng"));
    }

    #[test]
    fn updates_without_fields_are_rejected() {
        let request = UpdateStaffRequest {
            id: StaffId::now_v7().to_string(),
            name: None,
            position: None,
            age: None,
            salary: None,
        };

        let messages = validate_batch(&[request], "unused").unwrap_err();

        assert_eq!(messages, vec!["[0] At least one field to update is required"]);
    }

    #[test]
    fn queue_failures_are_distinguished_from_store_failures() {
        let queue = RosterError::from((ErrorKind::QueueAcceptFailed, "rejected"));
        let store = RosterError::from((ErrorKind::StoreQueryFailed, "broken"));

        assert_eq!(
            StaffError::from(queue).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        let store = StaffError::from(store);
        assert_eq!(store.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(store.to_message(), "internal server error");
    }
}
