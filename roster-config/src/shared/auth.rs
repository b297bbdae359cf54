use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::shared::ValidationError;

/// Token signing and verification settings.
#[derive(Clone, Debug, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret used to sign and verify bearer tokens.
    pub jwt_secret: SecretString,
    /// Lifetime of issued tokens, in seconds.
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
    /// bcrypt cost factor for stored admin passwords.
    #[serde(default = "default_password_hash_cost")]
    pub password_hash_cost: u32,
    /// Administrator created at startup when no admin with its username exists.
    #[serde(default)]
    pub admin: Option<AdminSeedConfig>,
}

impl AuthConfig {
    pub const DEFAULT_TOKEN_TTL_SECS: u64 = 86_400;

    pub const DEFAULT_PASSWORD_HASH_COST: u32 = 10;

    /// Bounds accepted by bcrypt.
    pub const PASSWORD_HASH_COST_RANGE: std::ops::RangeInclusive<u32> = 4..=31;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.jwt_secret.expose_secret().is_empty() {
            return Err(ValidationError::EmptySecret("auth.jwt_secret"));
        }

        if self.token_ttl_secs == 0 {
            return Err(ValidationError::invalid(
                "auth.token_ttl_secs",
                "must be greater than 0",
            ));
        }

        if !Self::PASSWORD_HASH_COST_RANGE.contains(&self.password_hash_cost) {
            return Err(ValidationError::invalid(
                "auth.password_hash_cost",
                "must be between 4 and 31",
            ));
        }

        if let Some(admin) = &self.admin {
            admin.validate()?;
        }

        Ok(())
    }
}

/// Initial administrator account.
#[derive(Clone, Debug, Deserialize)]
pub struct AdminSeedConfig {
    pub username: String,
    pub email: String,
    pub password: SecretString,
    #[serde(default = "default_admin_role")]
    pub role: String,
}

impl AdminSeedConfig {
    pub const DEFAULT_ROLE: &'static str = "superadmin";

    /// Shortest accepted admin password.
    pub const MIN_PASSWORD_LEN: usize = 8;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.username.trim().is_empty() {
            return Err(ValidationError::invalid(
                "auth.admin.username",
                "must not be empty",
            ));
        }

        if !self.email.contains('@') {
            return Err(ValidationError::invalid(
                "auth.admin.email",
                "must be an email address",
            ));
        }

        if self.password.expose_secret().chars().count() < Self::MIN_PASSWORD_LEN {
            return Err(ValidationError::invalid(
                "auth.admin.password",
                "must be at least 8 characters long",
            ));
        }

        Ok(())
    }
}

fn default_token_ttl_secs() -> u64 {
    AuthConfig::DEFAULT_TOKEN_TTL_SECS
}

fn default_password_hash_cost() -> u32 {
    AuthConfig::DEFAULT_PASSWORD_HASH_COST
}

fn default_admin_role() -> String {
    AdminSeedConfig::DEFAULT_ROLE.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(admin: Option<AdminSeedConfig>) -> AuthConfig {
        AuthConfig {
            jwt_secret: SecretString::new("secret".to_string()),
            token_ttl_secs: 60,
            password_hash_cost: AuthConfig::DEFAULT_PASSWORD_HASH_COST,
            admin,
        }
    }

    #[test]
    fn empty_secret_is_rejected() {
        let config = AuthConfig {
            jwt_secret: SecretString::new(String::new()),
            ..config(None)
        };

        assert!(matches!(
            config.validate(),
            Err(ValidationError::EmptySecret("auth.jwt_secret"))
        ));
    }

    #[test]
    fn short_admin_passwords_are_rejected() {
        let config = config(Some(AdminSeedConfig {
            username: "superadmin".to_string(),
            email: "superadmin@example.com".to_string(),
            password: SecretString::new("short".to_string()),
            role: AdminSeedConfig::DEFAULT_ROLE.to_string(),
        }));

        let err = config.validate().unwrap_err();

        assert_eq!(
            err.to_string(),
            "invalid value for `auth.admin.password`: must be at least 8 characters long"
        );
    }

    #[test]
    fn admin_role_defaults_to_superadmin() {
        let seed: AdminSeedConfig = serde_json::from_str(
            r#"{ "username": "root", "email": "root@example.com", "password": "long-enough" }"#,
        )
        .unwrap();

        assert_eq!(seed.role, "superadmin");
        assert!(seed.validate().is_ok());
    }
}
