use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use roster_config::shared::AuthConfig;
use secrecy::ExposeSecret;
use std::fmt;

use crate::auth::{Claims, TokenVerifier};
use crate::error::RosterResult;

/// HS256 token signer and verifier.
#[derive(Clone)]
pub struct JwtTokenVerifier {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    token_ttl_secs: u64,
}

impl JwtTokenVerifier {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.expose_secret().as_bytes();

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
            token_ttl_secs: config.token_ttl_secs,
        }
    }

    /// Signs a token for `username` valid for the configured lifetime.
    pub fn issue(&self, sub: &str, username: &str, role: &str) -> RosterResult<String> {
        let iat = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
        let claims = Claims {
            sub: sub.to_string(),
            username: username.to_string(),
            role: role.to_string(),
            iat,
            exp: iat + self.token_ttl_secs,
        };

        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding_key,
        )?)
    }
}

impl TokenVerifier for JwtTokenVerifier {
    fn verify(&self, token: &str) -> RosterResult<Claims> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)?;

        Ok(data.claims)
    }
}

impl fmt::Debug for JwtTokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtTokenVerifier")
            .field("token_ttl_secs", &self.token_ttl_secs)
            .finish_non_exhaustive()
    }
}
