//! Crypto & hashing kit (spec §4.1): AES-256-GCM seal/open, HMAC-SHA-256
//! signing with constant-time verification, bcrypt password hashing and
//! the truncated SHA-256 ID-card lookup hash.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{engine::general_purpose::STANDARD as B64, Engine};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

const NONCE_LEN: usize = 12;

/// Seals `plaintext` with AES-256-GCM under `key` (must be exactly 32
/// bytes). Output is `base64(nonce || ciphertext || tag)`.
pub fn aes_seal(plaintext: &[u8], key: &[u8]) -> Result<String, AppError> {
    if key.len() != 32 {
        return Err(AppError::Internal(anyhow::anyhow!(
            "encryption key must be exactly 32 bytes, got {}",
            key.len()
        )));
    }
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid AES key: {e}")))?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("aes seal failed: {e}")))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(B64.encode(out))
}

/// Opens a value produced by [`aes_seal`].
pub fn aes_open(sealed: &str, key: &[u8]) -> Result<Vec<u8>, AppError> {
    if key.len() != 32 {
        return Err(AppError::Internal(anyhow::anyhow!(
            "encryption key must be exactly 32 bytes, got {}",
            key.len()
        )));
    }
    let raw = B64
        .decode(sealed)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid sealed payload: {e}")))?;
    if raw.len() < NONCE_LEN {
        return Err(AppError::Internal(anyhow::anyhow!("sealed payload too short")));
    }
    let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid AES key: {e}")))?;
    let nonce = Nonce::from_slice(nonce_bytes);
    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("aes open failed: {e}")))
}

pub fn aes_seal_str(plaintext: &str, key: &[u8]) -> Result<String, AppError> {
    aes_seal(plaintext.as_bytes(), key)
}

pub fn aes_open_str(sealed: &str, key: &[u8]) -> Result<String, AppError> {
    let bytes = aes_open(sealed, key)?;
    String::from_utf8(bytes).map_err(|e| AppError::Internal(anyhow::anyhow!("non-utf8 plaintext: {e}")))
}

/// HMAC-SHA-256 over an arbitrary pre-built message, hex-encoded.
pub fn hmac_sign_hex(key: &str, message: &str) -> Result<String, AppError> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid hmac key: {e}")))?;
    mac.update(message.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// HMAC-SHA-256 over an arbitrary pre-built message, base64-encoded (used
/// for the gateway-trust and outbound service signatures, which the
/// upstream gateway and sibling services expect as base64).
pub fn hmac_sign_b64(key: &str, message: &str) -> Result<String, AppError> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid hmac key: {e}")))?;
    mac.update(message.as_bytes());
    Ok(B64.encode(mac.finalize().into_bytes()))
}

/// Constant-time string equality, used for every signature comparison.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

pub fn hmac_verify_hex(key: &str, message: &str, signature: &str) -> Result<bool, AppError> {
    let expected = hmac_sign_hex(key, message)?;
    Ok(constant_time_eq(&expected, signature))
}

pub fn hmac_verify_b64(key: &str, message: &str, signature: &str) -> Result<bool, AppError> {
    let expected = hmac_sign_b64(key, message)?;
    Ok(constant_time_eq(&expected, signature))
}

/// bcrypt hash of a plaintext password, at the platform default cost.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("bcrypt hash failed: {e}")))
}

/// Verifies a plaintext password against a bcrypt hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    bcrypt::verify(password, hash)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("bcrypt verify failed: {e}")))
}

/// SHA-256 of an API key secret, hex-encoded, used as the lookup value
/// stored alongside APIKey rows (never the plaintext secret).
pub fn sha256_hex(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

/// ID-card hash for indexing: SHA-256 truncated to the first 8 bytes,
/// hex-encoded. Used only as a non-reversible lookup key, never to
/// recover the original ID number.
pub fn idcard_index_hash(idcard: &str) -> String {
    let digest = Sha256::digest(idcard.as_bytes());
    hex::encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key32() -> Vec<u8> {
        vec![7u8; 32]
    }

    #[test]
    fn aes_round_trip() {
        let key = key32();
        let sealed = aes_seal_str("super secret id number", &key).unwrap();
        let opened = aes_open_str(&sealed, &key).unwrap();
        assert_eq!(opened, "super secret id number");
    }

    #[test]
    fn aes_rejects_short_key() {
        let short_key = vec![1u8; 16];
        assert!(aes_seal_str("x", &short_key).is_err());
    }

    #[test]
    fn aes_nonce_is_random_per_call() {
        let key = key32();
        let a = aes_seal_str("same plaintext", &key).unwrap();
        let b = aes_seal_str("same plaintext", &key).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn hmac_verify_round_trip_and_tamper_detection() {
        let sig = hmac_sign_hex("secret", "hello world").unwrap();
        assert!(hmac_verify_hex("secret", "hello world", &sig).unwrap());
        assert!(!hmac_verify_hex("secret", "hello world!", &sig).unwrap());
        assert!(!hmac_verify_hex("other-secret", "hello world", &sig).unwrap());
    }

    #[test]
    fn bcrypt_round_trip() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(verify_password("correct horse battery staple", &hash).unwrap());
        assert!(!verify_password("wrong password", &hash).unwrap());
    }

    #[test]
    fn idcard_hash_is_stable_and_truncated() {
        let h1 = idcard_index_hash("123456789012345678");
        let h2 = idcard_index_hash("123456789012345678");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 16); // 8 bytes hex-encoded
    }
}
