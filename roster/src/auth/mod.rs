//! Bearer token verification shared by the HTTP API and the push server, and the admin login
//! that issues those tokens.

mod admin;
mod jwt;
mod password;

pub use admin::AdminAuthenticator;
pub use jwt::JwtTokenVerifier;
pub use password::{hash_password, verify_password};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::RosterResult;

/// Claims carried by a verified token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject the token was issued to.
    pub sub: String,
    pub username: String,
    pub role: String,
    /// Issue time, seconds since the epoch.
    pub iat: u64,
    /// Expiry time, seconds since the epoch.
    pub exp: u64,
}

/// Resolves a bearer token into its claims.
///
/// Fails with [`crate::error::ErrorKind::AuthenticationError`] when the token is malformed,
/// badly signed or expired.
pub trait TokenVerifier: fmt::Debug + Send + Sync {
    fn verify(&self, token: &str) -> RosterResult<Claims>;
}
