/// Password hashing and verification using Argon2id
///
/// ## Security
///
/// - Algorithm: Argon2id, version 0x13
/// - Salt: random 16-byte salt from the OS RNG, generated per credential
/// - Work factor: memory, iterations and parallelism are configurable and are
///   stored next to the digest so old credentials keep verifying after the
///   defaults change
/// - Comparison: digests are compared in constant time
use argon2::{
    password_hash::{Output, PasswordHash, PasswordHasher, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Algorithm tag written into every credential produced by this module
pub const ARGON2ID: &str = "argon2id";

#[derive(Debug, Error)]
pub enum HashError {
    #[error("Invalid credential format: {0}")]
    InvalidCredentialFormat(String),

    #[error("Invalid hash parameters: {0}")]
    InvalidParams(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

/// Argon2 cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashParams {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes
    pub iterations: u32,
    /// Degree of parallelism (lanes)
    pub parallelism: u32,
}

impl Default for HashParams {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

impl HashParams {
    /// Check the parameters against the Argon2 bounds without hashing anything
    pub fn validate(&self) -> Result<(), HashError> {
        self.to_argon2(None).map(|_| ())
    }

    fn to_argon2(&self, output_len: Option<usize>) -> Result<Params, HashError> {
        Params::new(self.memory_kib, self.iterations, self.parallelism, output_len)
            .map_err(|e| HashError::InvalidParams(e.to_string()))
    }
}

/// Stored proof material for a principal
///
/// Salt and digest are kept in the unpadded B64 alphabet used by PHC strings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub algorithm: String,
    pub params: HashParams,
    pub salt: String,
    pub digest: String,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("algorithm", &self.algorithm)
            .field("params", &self.params)
            .field("digest", &"[redacted]")
            .finish()
    }
}

impl Credential {
    /// Render as a PHC string (`$argon2id$v=19$m=..,t=..,p=..$salt$digest`)
    pub fn to_phc(&self) -> String {
        format!(
            "${}$v=19$m={},t={},p={}${}${}",
            self.algorithm,
            self.params.memory_kib,
            self.params.iterations,
            self.params.parallelism,
            self.salt,
            self.digest
        )
    }

    /// Parse a PHC string produced by [`Credential::to_phc`] or any Argon2 hasher
    pub fn from_phc(phc: &str) -> Result<Self, HashError> {
        let parsed = PasswordHash::new(phc)
            .map_err(|e| HashError::InvalidCredentialFormat(e.to_string()))?;

        let param = |name: &str| {
            parsed.params.get_decimal(name).ok_or_else(|| {
                HashError::InvalidCredentialFormat(format!("missing parameter `{name}`"))
            })
        };

        let params = HashParams {
            memory_kib: param("m")?,
            iterations: param("t")?,
            parallelism: param("p")?,
        };
        let salt = parsed
            .salt
            .ok_or_else(|| HashError::InvalidCredentialFormat("missing salt".to_string()))?;
        let digest = parsed
            .hash
            .ok_or_else(|| HashError::InvalidCredentialFormat("missing digest".to_string()))?;

        Ok(Self {
            algorithm: parsed.algorithm.as_str().to_string(),
            params,
            salt: salt.as_str().to_string(),
            digest: digest.to_string(),
        })
    }
}

fn argon2id(params: Params) -> Argon2<'static> {
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
}

/// Hash a password with a fresh random salt
///
/// Password policy is not enforced here; callers check strength first.
pub fn hash_password(plaintext: &str, params: &HashParams) -> Result<Credential, HashError> {
    let salt = SaltString::generate(&mut OsRng);
    let hasher = argon2id(params.to_argon2(None)?);

    let hash = hasher
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|e| HashError::Hashing(e.to_string()))?;
    let digest = hash
        .hash
        .ok_or_else(|| HashError::Hashing("argon2 produced no output".to_string()))?;

    Ok(Credential {
        algorithm: ARGON2ID.to_string(),
        params: *params,
        salt: salt.as_str().to_string(),
        digest: digest.to_string(),
    })
}

/// Verify a password against a stored credential
///
/// Returns `Ok(false)` on mismatch. Fails with `InvalidCredentialFormat` when
/// the record carries an unknown algorithm tag or cannot be decoded.
pub fn verify_password(plaintext: &str, credential: &Credential) -> Result<bool, HashError> {
    if credential.algorithm != ARGON2ID {
        return Err(HashError::InvalidCredentialFormat(format!(
            "unsupported algorithm `{}`",
            credential.algorithm
        )));
    }

    let salt = SaltString::from_b64(&credential.salt)
        .map_err(|e| HashError::InvalidCredentialFormat(format!("salt: {e}")))?;
    let expected = Output::b64_decode(&credential.digest)
        .map_err(|e| HashError::InvalidCredentialFormat(format!("digest: {e}")))?;

    let params = credential
        .params
        .to_argon2(Some(expected.len()))
        .map_err(|e| HashError::InvalidCredentialFormat(e.to_string()))?;

    let computed = argon2id(params)
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|e| HashError::Hashing(e.to_string()))?
        .hash
        .ok_or_else(|| HashError::Hashing("argon2 produced no output".to_string()))?;

    Ok(computed.as_bytes().ct_eq(expected.as_bytes()).into())
}
