use argon2::{
    Algorithm, Argon2, Params, ParamsBuilder, Version,
    password_hash::{
        self, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
};
use rand::{TryRngCore, rngs::OsRng};
use thiserror::Error;
use zeroize::Zeroizing;

/// Argon2id password hashing with a server-side pepper.
///
/// The pepper is appended to the password before hashing and never stored
/// alongside the hash, so a leaked credential table alone is not enough to
/// mount an offline guess.
#[derive(Debug)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    pepper: Zeroizing<Vec<u8>>,
}

/// Failures hashing or verifying a password.
#[derive(Debug, Error)]
pub enum PasswordHashError {
    #[error("password pepper must not be empty")]
    EmptyPepper,
    #[error("invalid Argon2 parameters: {0}")]
    InvalidParams(String),
    #[error("password hashing error: {0}")]
    Hash(String),
}

impl From<password_hash::Error> for PasswordHashError {
    fn from(err: password_hash::Error) -> Self {
        PasswordHashError::Hash(err.to_string())
    }
}

impl PasswordHasher {
    const DEFAULT_MEMORY_KIB: u32 = 64 * 1024; // 64 MiB
    const DEFAULT_ITERATIONS: u32 = 3;
    const DEFAULT_PARALLELISM: u32 = 1;
    const SALT_LENGTH: usize = password_hash::Salt::RECOMMENDED_LENGTH;

    pub fn new(pepper: impl AsRef<[u8]>) -> Result<Self, PasswordHashError> {
        Self::with_params(
            pepper,
            ParamsBuilder::new()
                .m_cost(Self::DEFAULT_MEMORY_KIB)
                .t_cost(Self::DEFAULT_ITERATIONS)
                .p_cost(Self::DEFAULT_PARALLELISM)
                .output_len(32)
                .build()
                .map_err(|err| PasswordHashError::InvalidParams(err.to_string()))?,
        )
    }

    pub fn with_params(
        pepper: impl AsRef<[u8]>,
        params: Params,
    ) -> Result<Self, PasswordHashError> {
        let pepper = pepper.as_ref();
        if pepper.is_empty() {
            return Err(PasswordHashError::EmptyPepper);
        }

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::default(), params),
            pepper: Zeroizing::new(pepper.to_vec()),
        })
    }

    /// Minimum-cost parameters. Only for tests and throwaway databases.
    pub fn low_cost(pepper: impl AsRef<[u8]>) -> Result<Self, PasswordHashError> {
        let params = ParamsBuilder::new()
            .m_cost(Params::MIN_M_COST)
            .t_cost(1)
            .p_cost(1)
            .build()
            .map_err(|err| PasswordHashError::InvalidParams(err.to_string()))?;
        Self::with_params(pepper, params)
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self::low_cost("test-pepper").unwrap()
    }

    fn peppered(&self, password: &str) -> Zeroizing<Vec<u8>> {
        let mut material = Zeroizing::new(Vec::with_capacity(
            password.len() + self.pepper.len(),
        ));
        material.extend_from_slice(password.as_bytes());
        material.extend_from_slice(&self.pepper);
        material
    }

    /// Hash `password` into a PHC string suitable for storage.
    pub fn hash(&self, password: &str) -> Result<String, PasswordHashError> {
        let mut salt_bytes = [0u8; Self::SALT_LENGTH];
        OsRng
            .try_fill_bytes(&mut salt_bytes)
            .map_err(|err| PasswordHashError::Hash(err.to_string()))?;
        let salt = SaltString::encode_b64(&salt_bytes)?;
        let material = self.peppered(password);
        Ok(self.argon2.hash_password(&material, &salt)?.to_string())
    }

    pub fn verify(
        &self,
        password: &str,
        stored_hash: &str,
    ) -> Result<bool, PasswordHashError> {
        let parsed = PasswordHash::new(stored_hash)?;
        let material = self.peppered(password);
        Ok(self.argon2.verify_password(&material, &parsed).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_round_trips_and_rejects_wrong_password() {
        let hasher = PasswordHasher::for_tests();
        let hash = hasher.hash("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("correct horse", &hash).unwrap());
        assert!(!hasher.verify("wrong horse", &hash).unwrap());
    }

    #[test]
    fn pepper_is_part_of_the_hash_input() {
        let hasher = PasswordHasher::for_tests();
        let hash = hasher.hash("correct horse").unwrap();

        let params = ParamsBuilder::new()
            .m_cost(Params::MIN_M_COST)
            .t_cost(1)
            .p_cost(1)
            .build()
            .unwrap();
        let other = PasswordHasher::with_params("other-pepper", params).unwrap();
        assert!(!other.verify("correct horse", &hash).unwrap());
    }

    #[test]
    fn empty_pepper_is_rejected() {
        assert!(matches!(
            PasswordHasher::new(""),
            Err(PasswordHashError::EmptyPepper)
        ));
    }

    #[test]
    fn salts_differ_between_hashes() {
        let hasher = PasswordHasher::for_tests();
        assert_ne!(hasher.hash("same").unwrap(), hasher.hash("same").unwrap());
    }
}
