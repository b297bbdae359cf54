use actix_web::dev::ServiceRequest;
use actix_web::http::StatusCode;
use actix_web::web::Data;
use actix_web::{HttpMessage, HttpResponse, ResponseError};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use roster::auth::TokenVerifier;
use thiserror::Error;
use tracing::{debug, error};

use crate::routes::ErrorMessage;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid or expired token.")]
    InvalidToken,

    #[error("internal server error")]
    VerifierMissing,
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::VerifierMissing => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorMessage {
            error: self.to_string(),
        })
    }
}

/// Verifies the bearer token and stores its [`roster::auth::Claims`] in the request extensions.
pub async fn auth_validator(
    req: ServiceRequest,
    credentials: BearerAuth,
) -> Result<ServiceRequest, (actix_web::Error, ServiceRequest)> {
    let Some(verifier) = req.app_data::<Data<dyn TokenVerifier>>().cloned() else {
        error!("no token verifier registered on the application");
        return Err((AuthError::VerifierMissing.into(), req));
    };

    match verifier.verify(credentials.token()) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            Ok(req)
        }
        Err(err) => {
            debug!(error = %err, "rejected bearer token");
            Err((AuthError::InvalidToken.into(), req))
        }
    }
}
