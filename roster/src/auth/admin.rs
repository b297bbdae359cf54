use roster_config::shared::AdminSeedConfig;
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::{debug, info};

use crate::auth::JwtTokenVerifier;
use crate::auth::password::{hash_password, verify_password};
use crate::bail;
use crate::error::{ErrorKind, RosterResult};
use crate::store::admin::AdminStore;
use crate::types::NewAdmin;

/// Exchanges admin credentials for bearer tokens.
#[derive(Debug, Clone)]
pub struct AdminAuthenticator {
    store: Arc<dyn AdminStore>,
    issuer: JwtTokenVerifier,
    hash_cost: u32,
}

impl AdminAuthenticator {
    pub fn new(store: Arc<dyn AdminStore>, issuer: JwtTokenVerifier, hash_cost: u32) -> Self {
        Self {
            store,
            issuer,
            hash_cost,
        }
    }

    /// Returns a signed token for the admin registered under `email`.
    ///
    /// Fails with [`ErrorKind::AdminNotFound`] for an unknown email and with
    /// [`ErrorKind::InvalidCredentials`] when the password does not match.
    pub async fn login(&self, email: &str, password: &str) -> RosterResult<String> {
        let Some(admin) = self.store.find_by_email(email).await? else {
            bail!(
                ErrorKind::AdminNotFound,
                "Authentication failed: Admin not found"
            );
        };

        if !verify_password(password, &admin.password_hash).await? {
            bail!(
                ErrorKind::InvalidCredentials,
                "Authentication failed: Invalid password"
            );
        }

        debug!(admin_id = %admin.id, username = %admin.username, "admin authenticated");

        self.issuer
            .issue(&admin.id.to_string(), &admin.username, &admin.role)
    }

    /// Creates the configured admin unless one with the same username exists.
    ///
    /// Returns whether an account was created.
    pub async fn seed(&self, seed: &AdminSeedConfig) -> RosterResult<bool> {
        if self.store.find_by_username(&seed.username).await?.is_some() {
            info!(username = %seed.username, "admin already exists, skipping seed");
            return Ok(false);
        }

        let password_hash = hash_password(seed.password.expose_secret(), self.hash_cost).await?;
        let admin = self
            .store
            .create(NewAdmin {
                username: seed.username.clone(),
                email: seed.email.clone(),
                password_hash,
                role: seed.role.clone(),
            })
            .await?;
        info!(admin_id = %admin.id, username = %admin.username, "admin seeded");

        Ok(true)
    }
}
