/// Versioned signing keys and the compact token codec
///
/// Tokens are compact JWS strings signed with HS256. The signing key version is
/// written to the `kid` header; a token whose version is not the ring's current
/// key is rejected, so rotating the key invalidates everything signed before.
///
/// ## Key lifecycle
///
/// - Loaded once at startup and held only in memory
/// - Secret bytes are zeroized when the last reference is dropped
/// - `Debug` never prints key material
/// - Rotation replaces the whole key behind the ring; readers take an `Arc`
///   snapshot and never observe a partially replaced key
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{
    decode, decode_header, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header,
    Validation,
};
use parking_lot::RwLock;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use zeroize::Zeroizing;

/// JWT algorithm used for every token issued by the service
pub const JWT_ALGORITHM: Algorithm = Algorithm::HS256;

/// 256 bits minimum for HMAC secrets
pub const MIN_SECRET_LENGTH: usize = 32;

const GENERATED_SECRET_LENGTH: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JwtError {
    #[error("Malformed token")]
    Malformed,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Unknown signing key version {0}")]
    UnknownKeyVersion(u32),

    #[error("Signing secret too short: {0} bytes, need at least {MIN_SECRET_LENGTH}")]
    WeakSecret(usize),

    #[error("Key rotation must increase the version (current {current}, proposed {proposed})")]
    StaleRotation { current: u32, proposed: u32 },

    #[error("Failed to sign token: {0}")]
    Signing(String),
}

/// Token claims
///
/// Timestamps are Unix milliseconds so expiry is exact to the millisecond.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (principal identifier)
    pub sub: String,
    /// Unique token identifier
    pub jti: String,
    /// Issued at, Unix milliseconds
    pub iat_ms: i64,
    /// Expiry, Unix milliseconds
    pub exp_ms: i64,
}

/// A single versioned HMAC secret
pub struct SigningKey {
    version: u32,
    secret: Zeroizing<Vec<u8>>,
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("version", &self.version)
            .field("secret", &"[redacted]")
            .finish()
    }
}

impl SigningKey {
    /// Wrap an existing secret
    ///
    /// Rejects secrets shorter than [`MIN_SECRET_LENGTH`] bytes.
    pub fn new(version: u32, secret: impl Into<Vec<u8>>) -> Result<Self, JwtError> {
        let secret = Zeroizing::new(secret.into());
        if secret.len() < MIN_SECRET_LENGTH {
            return Err(JwtError::WeakSecret(secret.len()));
        }
        Ok(Self { version, secret })
    }

    /// Generate a random secret from the OS RNG
    pub fn generate(version: u32) -> Self {
        let mut secret = Zeroizing::new(vec![0u8; GENERATED_SECRET_LENGTH]);
        OsRng.fill_bytes(secret.as_mut_slice());
        Self { version, secret }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(&self.secret)
    }

    fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(&self.secret)
    }
}

/// Process-wide holder of the current signing key
#[derive(Debug)]
pub struct KeyRing {
    current: RwLock<Arc<SigningKey>>,
}

impl KeyRing {
    pub fn new(key: SigningKey) -> Self {
        Self {
            current: RwLock::new(Arc::new(key)),
        }
    }

    /// Snapshot of the key new tokens are signed with
    pub fn current(&self) -> Arc<SigningKey> {
        self.current.read().clone()
    }

    pub fn current_version(&self) -> u32 {
        self.current.read().version
    }

    /// Look up the key for a token's embedded version
    ///
    /// Only the current version is accepted.
    pub fn key_for(&self, version: u32) -> Option<Arc<SigningKey>> {
        let key = self.current();
        (key.version == version).then_some(key)
    }

    /// Replace the signing key
    ///
    /// The new version must be strictly greater than the current one. Every
    /// token signed with the previous key fails verification afterwards.
    pub fn rotate(&self, next: SigningKey) -> Result<u32, JwtError> {
        let mut current = self.current.write();
        if next.version <= current.version {
            return Err(JwtError::StaleRotation {
                current: current.version,
                proposed: next.version,
            });
        }
        let version = next.version;
        *current = Arc::new(next);
        tracing::warn!(key_version = version, "Signing key rotated");
        Ok(version)
    }
}

/// Sign claims with the ring's current key
///
/// Returns the compact token and the key version it was signed with.
pub fn sign(claims: &Claims, keys: &KeyRing) -> Result<(String, u32), JwtError> {
    let key = keys.current();
    let mut header = Header::new(JWT_ALGORITHM);
    header.kid = Some(key.version.to_string());

    let token = encode(&header, claims, &key.encoding_key())
        .map_err(|e| JwtError::Signing(e.to_string()))?;
    Ok((token, key.version))
}

/// Decode a token and check its signature
///
/// Structure is checked before the signature so a garbled token is always
/// reported as `Malformed`. Expiry is not checked here; callers compare
/// `exp_ms` against their own clock.
pub fn decode_verified(token: &str, keys: &KeyRing) -> Result<(u32, Claims), JwtError> {
    let (header, _) = parse_unverified(token)?;

    if header.alg != JWT_ALGORITHM {
        return Err(JwtError::InvalidSignature);
    }
    let version: u32 = header
        .kid
        .as_deref()
        .and_then(|kid| kid.parse().ok())
        .ok_or(JwtError::Malformed)?;
    let key = keys
        .key_for(version)
        .ok_or(JwtError::UnknownKeyVersion(version))?;

    let mut validation = Validation::new(JWT_ALGORITHM);
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<Claims>(token, &key.decoding_key(), &validation).map_err(|e| {
        match e.kind() {
            ErrorKind::InvalidSignature => JwtError::InvalidSignature,
            _ => JwtError::Malformed,
        }
    })?;

    Ok((version, data.claims))
}

/// Parse header and claims without checking the signature
fn parse_unverified(token: &str) -> Result<(Header, Claims), JwtError> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(JwtError::Malformed);
    };
    if signature.is_empty() {
        return Err(JwtError::Malformed);
    }

    let header = decode_header(token).map_err(|_| JwtError::Malformed)?;
    let payload = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| JwtError::Malformed)?;
    let claims: Claims = serde_json::from_slice(&payload).map_err(|_| JwtError::Malformed)?;

    if claims.exp_ms <= claims.iat_ms || claims.sub.is_empty() || claims.jti.is_empty() {
        return Err(JwtError::Malformed);
    }
    Ok((header, claims))
}
