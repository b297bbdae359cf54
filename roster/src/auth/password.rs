use crate::error::{ErrorKind, RosterResult};
use crate::roster_error;

/// Hashes `password` with bcrypt on the blocking pool.
pub async fn hash_password(password: &str, cost: u32) -> RosterResult<String> {
    let password = password.to_string();

    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|err| {
            roster_error!(
                ErrorKind::PasswordHashingFailed,
                "Password hashing task failed",
                err
            )
        })??;

    Ok(hash)
}

/// Checks `password` against a bcrypt `hash` on the blocking pool.
pub async fn verify_password(password: &str, hash: &str) -> RosterResult<bool> {
    let password = password.to_string();
    let hash = hash.to_string();

    let matches = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|err| {
            roster_error!(
                ErrorKind::PasswordHashingFailed,
                "Password verification task failed",
                err
            )
        })??;

    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn only_the_original_password_verifies() {
        let hash = hash_password("correct horse", 4).await.unwrap();

        assert_ne!(hash, "correct horse");
        assert!(verify_password("correct horse", &hash).await.unwrap());
        assert!(!verify_password("battery staple", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn malformed_hashes_are_errors() {
        let err = verify_password("anything", "not-a-bcrypt-hash")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::PasswordHashingFailed);
    }
}
