use base64::{engine::general_purpose::STANDARD as Base64, Engine as _};
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{AppError, AppResult};

const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;
const TOKEN_LEN: usize = 32;
const PBKDF2_ITERATIONS: u32 = 120_000;

/// Derived password material stored alongside the user record.
#[derive(Debug, Clone)]
pub struct PasswordHash {
    pub hash: String,
    pub salt: String,
}

pub fn hash_password(password: &str) -> PasswordHash {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let key = derive_key(password, &salt);
    PasswordHash {
        hash: Base64.encode(key),
        salt: Base64.encode(salt),
    }
}

pub fn verify_password(password: &str, hash: &str, salt: &str) -> AppResult<bool> {
    let salt = Base64
        .decode(salt.as_bytes())
        .map_err(|_| AppError::other("凭据数据损坏，无法解码"))?;
    let key = derive_key(password, &salt);
    Ok(Base64.encode(key) == hash)
}

/// Opaque bearer token handed to the client. Only its SHA-256 digest is
/// persisted.
pub fn generate_session_token() -> String {
    let mut raw = [0u8; TOKEN_LEN];
    OsRng.fill_bytes(&mut raw);
    Base64.encode(raw)
}

pub fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest.iter() {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex
}

fn derive_key(password: &str, salt: &[u8]) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);
    key
}
