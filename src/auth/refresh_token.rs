/// Refresh Token Generation
///
/// Refresh tokens are:
/// - 32 random bytes (256 bits) from the OS CSPRNG, hex-encoded to 64 chars
/// - Hashed with SHA-256 before storage (the plaintext is never stored)
///
/// The tokens already carry full entropy, so a single fast hash is enough
/// for at-rest protection and keeps lookups by digest cheap.

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::AppError;

const REFRESH_TOKEN_BYTES: usize = 32;

/// Length of a generated plaintext token
pub const REFRESH_TOKEN_LENGTH: usize = REFRESH_TOKEN_BYTES * 2;

/// Generate a new refresh token plaintext.
///
/// # Errors
/// Returns `Internal` if the OS random source fails
pub fn generate_refresh_token() -> Result<String, AppError> {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| AppError::Internal(format!("Random source failure: {}", e)))?;
    Ok(hex::encode(bytes))
}

/// SHA-256 digest of a refresh token, hex-encoded
pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
