//! Credential-at-rest encryption: AES-256-GCM with a per-ciphertext random
//! nonce, keyed by the 32-byte `encryption_key` from `SecurityConfig`.
//! Decryption happens only in-memory, at KeyManager selection time — see
//! `crate::key_manager`.
//!
//! Version dependencies:
//! - aes-gcm = "0.10"
//! - rand = "0.8"

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;

pub const GCM_NONCE_LEN: usize = 12;
pub const AES_KEY_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("encryption key must be exactly {AES_KEY_LEN} bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("ciphertext is malformed: {0}")]
    MalformedCiphertext(String),
    #[error("encryption failed")]
    EncryptionFailed,
    #[error("decryption failed")]
    DecryptionFailed,
    #[error("decrypted plaintext was not valid UTF-8")]
    InvalidUtf8,
}

/// Opaque encrypted blob stored in `api_keys.encrypted_key`: nonce prefix
/// followed by the AES-GCM ciphertext (including its authentication tag).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedKey(pub Vec<u8>);

fn cipher_from_key(key: &[u8]) -> Result<Aes256Gcm, CryptoError> {
    if key.len() != AES_KEY_LEN {
        return Err(CryptoError::InvalidKeyLength(key.len()));
    }
    Ok(Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)))
}

/// Encrypts a plaintext API key for storage in `api_keys.encrypted_key`.
pub fn encrypt_credential(plaintext: &str, key: &[u8]) -> Result<EncryptedKey, CryptoError> {
    let cipher = cipher_from_key(key)?;

    let mut nonce_bytes = [0u8; GCM_NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut blob = Vec::with_capacity(GCM_NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&ciphertext);
    Ok(EncryptedKey(blob))
}

/// Decrypts a credential blob previously produced by [`encrypt_credential`].
pub fn decrypt_credential(blob: &EncryptedKey, key: &[u8]) -> Result<String, CryptoError> {
    let cipher = cipher_from_key(key)?;

    if blob.0.len() < GCM_NONCE_LEN {
        return Err(CryptoError::MalformedCiphertext(
            "ciphertext shorter than nonce prefix".to_string(),
        ));
    }
    let (nonce_bytes, ciphertext) = blob.0.split_at(GCM_NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)?;

    String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> [u8; AES_KEY_LEN] {
        [7u8; AES_KEY_LEN]
    }

    #[test]
    fn round_trips() {
        let key = test_key();
        let encrypted = encrypt_credential("super-secret-api-key", &key).unwrap();
        let decrypted = decrypt_credential(&encrypted, &key).unwrap();
        assert_eq!(decrypted, "super-secret-api-key");
    }

    #[test]
    fn distinct_ciphertexts_for_same_plaintext() {
        let key = test_key();
        let a = encrypt_credential("same-key", &key).unwrap();
        let b = encrypt_credential("same-key", &key).unwrap();
        assert_ne!(a.0, b.0, "nonce must be randomized per ciphertext");
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let encrypted = encrypt_credential("secret", &test_key()).unwrap();
        let wrong_key = [9u8; AES_KEY_LEN];
        assert!(decrypt_credential(&encrypted, &wrong_key).is_err());
    }

    #[test]
    fn rejects_bad_key_length() {
        assert!(matches!(
            encrypt_credential("x", &[0u8; 16]),
            Err(CryptoError::InvalidKeyLength(16))
        ));
    }
}
