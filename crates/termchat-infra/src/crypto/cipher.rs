//! AES-256-GCM sealing of message bodies.
//!
//! Sealed format: `base64(nonce (12 bytes) || ciphertext || tag)` using the
//! standard base64 alphabet, so blobs are safe to store in a TEXT column.
//!
//! SECURITY: Error types never contain plaintext or key material.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

/// Nonce size for AES-256-GCM (96 bits / 12 bytes).
const NONCE_SIZE: usize = 12;

/// Required key size (256 bits).
pub const KEY_SIZE: usize = 32;

/// Errors from message sealing.
///
/// IMPORTANT: These errors never include plaintext, key material, or ciphertext
/// in their Display/Debug output to prevent accidental logging of secrets.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("invalid key length: expected {KEY_SIZE} bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("invalid key encoding")]
    InvalidKeyEncoding,

    #[error("encryption failed")]
    EncryptionFailed,

    #[error("invalid sealed message encoding")]
    InvalidEncoding,

    #[error("invalid sealed message: too short")]
    CiphertextTooShort,

    #[error("message authentication failed")]
    AuthenticationFailed,

    #[error("decrypted message is not valid UTF-8")]
    InvalidUtf8,
}

/// AES-256-GCM cipher for message bodies.
///
/// Each seal draws a fresh random nonce, so sealing the same plaintext twice
/// produces different blobs.
#[derive(Clone)]
pub struct MessageCipher {
    cipher: Aes256Gcm,
}

impl MessageCipher {
    pub fn new(key: &[u8; KEY_SIZE]) -> Self {
        Self {
            cipher: Aes256Gcm::new(key.into()),
        }
    }

    /// Build from raw key bytes, rejecting anything but exactly 32 bytes.
    pub fn from_slice(key: &[u8]) -> Result<Self, CipherError> {
        let key: &[u8; KEY_SIZE] = key
            .try_into()
            .map_err(|_| CipherError::InvalidKeyLength(key.len()))?;
        Ok(Self::new(key))
    }

    /// Build from a base64-encoded key, the form used in configuration.
    pub fn from_base64(encoded: &str) -> Result<Self, CipherError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|_| CipherError::InvalidKeyEncoding)?;
        Self::from_slice(&bytes)
    }

    /// Generate a random key, base64-encoded.
    pub fn generate_key() -> String {
        STANDARD.encode(Aes256Gcm::generate_key(&mut OsRng))
    }

    /// Encrypt `plaintext` and return the transport-safe sealed blob.
    pub fn seal(&self, plaintext: &str) -> Result<String, CipherError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CipherError::EncryptionFailed)?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed))
    }

    /// Decrypt a blob produced by [`seal`](Self::seal).
    pub fn open(&self, sealed: &str) -> Result<String, CipherError> {
        let data = STANDARD
            .decode(sealed)
            .map_err(|_| CipherError::InvalidEncoding)?;
        if data.len() < NONCE_SIZE {
            return Err(CipherError::CiphertextTooShort);
        }

        let (nonce_bytes, ciphertext) = data.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| CipherError::AuthenticationFailed)?;

        String::from_utf8(plaintext).map_err(|_| CipherError::InvalidUtf8)
    }
}

impl std::fmt::Debug for MessageCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MessageCipher(..)")
    }
}
