use roster_config::shared::{AdminSeedConfig, AuthConfig};
use secrecy::SecretString;

use crate::auth::JwtTokenVerifier;

/// Secret signing every token in tests.
pub const TEST_JWT_SECRET: &str = "roster-test-secret-do-not-use-in-production";

pub const TEST_ADMIN_USERNAME: &str = "superadmin";

pub const TEST_ADMIN_EMAIL: &str = "superadmin@example.com";

pub const TEST_ADMIN_PASSWORD: &str = "superadmin123!";

/// Test configuration seeding [`TEST_ADMIN_EMAIL`] with the cheapest bcrypt cost.
pub fn test_auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: SecretString::new(TEST_JWT_SECRET.to_string()),
        token_ttl_secs: AuthConfig::DEFAULT_TOKEN_TTL_SECS,
        password_hash_cost: *AuthConfig::PASSWORD_HASH_COST_RANGE.start(),
        admin: Some(test_admin_seed()),
    }
}

pub fn test_admin_seed() -> AdminSeedConfig {
    AdminSeedConfig {
        username: TEST_ADMIN_USERNAME.to_string(),
        email: TEST_ADMIN_EMAIL.to_string(),
        password: SecretString::new(TEST_ADMIN_PASSWORD.to_string()),
        role: AdminSeedConfig::DEFAULT_ROLE.to_string(),
    }
}

pub fn test_verifier() -> JwtTokenVerifier {
    JwtTokenVerifier::new(&test_auth_config())
}

/// Issues a token for an admin user signed with [`TEST_JWT_SECRET`].
pub fn admin_token() -> String {
    test_verifier()
        .issue("test-admin", "admin", "admin")
        .expect("failed to issue test token")
}
