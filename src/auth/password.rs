//! Argon2id password hashing. Both directions run on the blocking pool so a
//! hash never stalls other requests.

use anyhow::anyhow;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::AppResult;

pub async fn hash(password: String) -> AppResult<String> {
    let phc = tokio::task::spawn_blocking(move || {
        let salt_bytes: [u8; 16] = rand::random();
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|err| anyhow!(err.to_string()))?;
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| anyhow!(err.to_string()))
    })
    .await??;

    Ok(phc)
}

/// A stored hash that does not parse never matches.
pub async fn verify(password: String, phc: String) -> AppResult<bool> {
    let matches = tokio::task::spawn_blocking(move || match PasswordHash::new(&phc) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    })
    .await?;

    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_then_verify() {
        let phc = hash("secret1".to_owned()).await.unwrap();
        assert!(phc.starts_with("$argon2id$"));
        assert!(!phc.contains("secret1"));
        assert!(verify("secret1".to_owned(), phc.clone()).await.unwrap());
        assert!(!verify("secret2".to_owned(), phc).await.unwrap());
    }

    #[tokio::test]
    async fn salts_differ() {
        let a = hash("same".to_owned()).await.unwrap();
        let b = hash("same".to_owned()).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn garbage_hash_never_matches() {
        assert!(!verify("anything".to_owned(), String::new()).await.unwrap());
        assert!(!verify("anything".to_owned(), "not-a-phc".to_owned()).await.unwrap());
    }
}
