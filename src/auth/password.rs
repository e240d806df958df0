use std::sync::Arc;

use anyhow::Context;
use argon2::{Algorithm, Argon2, Params, Version};
use base64::Engine as _;
use rand::{rngs::OsRng, RngCore};
use tracing::error;

/// Byte length of salts and session tokens before base64 encoding.
const RANDOM_BYTES: usize = 128;

/// Length of the derived password hash in bytes (hex doubles it).
const HASH_BYTES: usize = 32;

/// Fresh base64 string from the OS RNG. Used for both salts and session tokens.
///
/// Panics if the OS RNG fails; there is no safe fallback.
pub fn generate_random_token() -> String {
    let mut bytes = [0u8; RANDOM_BYTES];
    OsRng.fill_bytes(&mut bytes);
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Salted, secret-keyed password hashing.
///
/// The sync methods are CPU-bound; request paths use the `*_blocking` variants,
/// which run them on tokio's blocking pool.
#[derive(Clone)]
pub struct CredentialHasher {
    secret: Arc<[u8]>,
}

impl CredentialHasher {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: Arc::from(secret.as_ref()),
        }
    }

    /// Argon2id over `plain` with `salt`, keyed with the process secret.
    /// The same `(salt, plain)` always yields the same hex string.
    pub fn compute_hash(&self, salt: &str, plain: &str) -> anyhow::Result<String> {
        let argon2 = Argon2::new_with_secret(
            &self.secret,
            Algorithm::Argon2id,
            Version::V0x13,
            Params::default(),
        )
        .map_err(|e| {
            error!(error = %e, "argon2 init error");
            anyhow::anyhow!(e.to_string())
        })?;

        let mut out = [0u8; HASH_BYTES];
        argon2
            .hash_password_into(plain.as_bytes(), salt.as_bytes(), &mut out)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                anyhow::anyhow!(e.to_string())
            })?;
        Ok(hex::encode(out))
    }

    /// Recomputes the hash and compares it to `expected` in constant time.
    pub fn verify(&self, salt: &str, plain: &str, expected: &str) -> anyhow::Result<bool> {
        let actual = self.compute_hash(salt, plain)?;
        Ok(constant_time_eq(actual.as_bytes(), expected.as_bytes()))
    }

    /// New salt and matching hash for `plain`.
    pub fn derive(&self, plain: &str) -> anyhow::Result<(String, String)> {
        let salt = generate_random_token();
        let hash = self.compute_hash(&salt, plain)?;
        Ok((salt, hash))
    }

    /// [`Self::verify`] off the async worker threads.
    pub async fn verify_blocking(
        &self,
        salt: String,
        plain: String,
        expected: String,
    ) -> anyhow::Result<bool> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&salt, &plain, &expected))
            .await
            .context("password verify task failed")?
    }

    /// [`Self::derive`] off the async worker threads.
    pub async fn derive_blocking(&self, plain: String) -> anyhow::Result<(String, String)> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.derive(&plain))
            .await
            .context("password derive task failed")?
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> CredentialHasher {
        CredentialHasher::new("test-secret")
    }

    #[test]
    fn random_tokens_are_distinct_and_printable() {
        let a = generate_random_token();
        let b = generate_random_token();
        assert_ne!(a, b);
        // 128 bytes -> 172 base64 chars
        assert_eq!(a.len(), 172);
        assert!(a.chars().all(|c| c.is_ascii_graphic()));
    }

    #[test]
    fn hash_is_deterministic() {
        let h = hasher();
        let salt = generate_random_token();
        let first = h.compute_hash(&salt, "correct-horse").expect("hash");
        let second = h.compute_hash(&salt, "correct-horse").expect("hash");
        assert_eq!(first, second);
        assert_eq!(first.len(), HASH_BYTES * 2);
        assert!(!first.contains("correct-horse"));
    }

    #[test]
    fn hash_depends_on_salt_password_and_secret() {
        let h = hasher();
        let base = h.compute_hash("salt-one-salt", "pw").expect("hash");
        assert_ne!(base, h.compute_hash("salt-two-salt", "pw").expect("hash"));
        assert_ne!(base, h.compute_hash("salt-one-salt", "pw2").expect("hash"));

        let other = CredentialHasher::new("another-secret");
        assert_ne!(base, other.compute_hash("salt-one-salt", "pw").expect("hash"));
    }

    #[test]
    fn verify_accepts_right_and_rejects_wrong_password() {
        let h = hasher();
        let (salt, hash) = h.derive("Secur3P@ssw0rd!").expect("derive");
        assert!(h.verify(&salt, "Secur3P@ssw0rd!", &hash).expect("verify"));
        assert!(!h.verify(&salt, "wrong-password", &hash).expect("verify"));
    }

    #[test]
    fn short_salt_is_an_error() {
        let err = hasher().compute_hash("short", "pw").unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn blocking_variants_agree_with_sync_hashing() {
        let h = hasher();
        let (salt, hash) = h.derive_blocking("pw".into()).await.expect("derive");
        assert_eq!(hash, h.compute_hash(&salt, "pw").expect("hash"));
        assert!(h
            .verify_blocking(salt.clone(), "pw".into(), hash.clone())
            .await
            .expect("verify"));
        assert!(!h
            .verify_blocking(salt, "nope".into(), hash)
            .await
            .expect("verify"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn hashing_does_not_hold_the_runtime_thread() {
        let h = hasher();
        let salt = generate_random_token();
        let hashing = tokio::spawn(async move {
            h.verify_blocking(salt, "pw".into(), String::new()).await
        });
        // Lets the spawned task start. Inline hashing would finish it right here.
        tokio::task::yield_now().await;
        assert!(!hashing.is_finished());
        assert!(!hashing.await.unwrap().expect("verify"));
    }

    #[test]
    fn constant_time_eq_works() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"short", b"longer"));
    }
}
