use thiserror::Error;

/// Rejected configuration values.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A numeric setting is outside its allowed range.
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
    /// A required secret was configured as an empty string.
    #[error("`{0}` must not be empty")]
    EmptySecret(&'static str),
    /// TLS is enabled but no trusted root certificates are provided.
    #[error("invalid TLS config: `trusted_root_certs` must be set when `enabled` is true")]
    MissingTrustedRootCerts,
}

impl ValidationError {
    pub(crate) fn invalid(field: &str, constraint: &str) -> Self {
        ValidationError::InvalidFieldValue {
            field: field.to_string(),
            constraint: constraint.to_string(),
        }
    }
}
