use actix_web::http::StatusCode;
use actix_web::web::{Data, Json, ReqData};
use actix_web::{HttpResponse, Responder, ResponseError, get, post};
use roster::auth::{AdminAuthenticator, Claims};
use roster::error::{ErrorKind, RosterError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use utoipa::ToSchema;

use crate::routes::{ErrorMessage, ValidationErrorResponse};

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("email and password are required for authentication.")]
    MissingCredentials,

    #[error("Authentication failed: Admin not found")]
    AdminNotFound,

    #[error("Authentication failed: Invalid password")]
    InvalidPassword,

    #[error(transparent)]
    Roster(RosterError),
}

impl From<RosterError> for LoginError {
    fn from(err: RosterError) -> Self {
        match err.kind() {
            ErrorKind::AdminNotFound => LoginError::AdminNotFound,
            ErrorKind::InvalidCredentials => LoginError::InvalidPassword,
            _ => LoginError::Roster(err),
        }
    }
}

impl ResponseError for LoginError {
    fn status_code(&self) -> StatusCode {
        match self {
            LoginError::MissingCredentials => StatusCode::BAD_REQUEST,
            LoginError::AdminNotFound => StatusCode::NOT_FOUND,
            LoginError::InvalidPassword => StatusCode::UNAUTHORIZED,
            LoginError::Roster(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            LoginError::MissingCredentials => HttpResponse::build(self.status_code())
                .json(ValidationErrorResponse::new(&[self.to_string()])),
            // Do not expose store details in error messages
            LoginError::Roster(_) => HttpResponse::build(self.status_code()).json(ErrorMessage {
                error: "internal server error".to_string(),
            }),
            e => HttpResponse::build(self.status_code()).json(ErrorMessage {
                error: e.to_string(),
            }),
        }
    }
}

/// Admin credentials. Both fields are required; they are optional here so a missing one is
/// reported with the login error rather than a deserialization error.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "superadmin@example.com")]
    pub email: Option<String>,
    #[schema(example = "superadmin123!")]
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginToken {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    #[schema(example = "Authentication successfully.")]
    pub message: String,
    pub data: LoginToken,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Identity {
    #[schema(example = "admin")]
    pub username: String,
    #[schema(example = "admin")]
    pub role: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReadIdentityResponse {
    #[schema(example = "Authenticated user info retrieved successfully.")]
    pub message: String,
    pub data: Identity,
}

#[utoipa::path(
    summary = "Admin login",
    description = "Exchanges an admin email and password for a bearer token.",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 400, description = "Email or password missing", body = ValidationErrorResponse),
        (status = 401, description = "Wrong password", body = ErrorMessage),
        (status = 404, description = "No admin with that email", body = ErrorMessage),
        (status = 500, description = "Internal server error", body = ErrorMessage)
    ),
    tag = "Auth"
)]
#[post("/v1/auth/login")]
pub async fn login(
    authenticator: Data<AdminAuthenticator>,
    request: Json<LoginRequest>,
) -> Result<impl Responder, LoginError> {
    let LoginRequest { email, password } = request.into_inner();
    let (Some(email), Some(password)) = (
        email.filter(|email| !email.is_empty()),
        password.filter(|password| !password.is_empty()),
    ) else {
        return Err(LoginError::MissingCredentials);
    };

    let token = authenticator.login(&email, &password).await.inspect_err(|err| {
        info!(error = %err, "admin login rejected");
    })?;

    Ok(Json(LoginResponse {
        message: "Authentication successfully.".to_string(),
        data: LoginToken { token },
    }))
}

#[utoipa::path(
    summary = "Current user",
    description = "Returns the username and role carried by the bearer token.",
    responses(
        (status = 200, description = "Identity retrieved", body = ReadIdentityResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorMessage)
    ),
    tag = "Auth"
)]
#[get("/auth/me")]
pub async fn read_identity(claims: ReqData<Claims>) -> impl Responder {
    let claims = claims.into_inner();

    HttpResponse::Ok().json(ReadIdentityResponse {
        message: "Authenticated user info retrieved successfully.".to_string(),
        data: Identity {
            username: claims.username,
            role: claims.role,
        },
    })
}
