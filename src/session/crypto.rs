//! Value sealing for the file-backed secure store.
//!
//! AES-256-GCM with a key derived once per store via PBKDF2-HMAC-SHA256.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::secure_store::StoreError;

const PBKDF2_ROUNDS: u32 = 100_000;
pub const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// A sealed value as written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedValue {
    /// Hex-encoded 96-bit nonce.
    pub nonce: String,
    /// Hex-encoded ciphertext with the GCM tag appended.
    pub ciphertext: String,
}

/// Symmetric sealer bound to one derived key.
pub struct Sealer {
    cipher: Aes256Gcm,
}

impl Sealer {
    /// Derive the key from key material and a store salt.
    pub fn derive(material: &[u8], salt: &[u8]) -> Self {
        Self::derive_with_rounds(material, salt, PBKDF2_ROUNDS)
    }

    pub(crate) fn derive_with_rounds(material: &[u8], salt: &[u8], rounds: u32) -> Self {
        let mut key = [0u8; KEY_LEN];
        pbkdf2::pbkdf2_hmac::<Sha256>(material, salt, rounds, &mut key);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
        Self { cipher }
    }

    pub fn seal(&self, plaintext: &str) -> Result<SealedValue, StoreError> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| StoreError::Crypto("encryption failed".to_string()))?;

        Ok(SealedValue {
            nonce: hex::encode(nonce),
            ciphertext: hex::encode(ciphertext),
        })
    }

    pub fn open(&self, sealed: &SealedValue) -> Result<String, StoreError> {
        let nonce = hex::decode(&sealed.nonce)
            .map_err(|e| StoreError::Crypto(format!("invalid nonce: {}", e)))?;
        if nonce.len() != NONCE_LEN {
            return Err(StoreError::Crypto("invalid nonce length".to_string()));
        }
        let ciphertext = hex::decode(&sealed.ciphertext)
            .map_err(|e| StoreError::Crypto(format!("invalid ciphertext: {}", e)))?;

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&nonce), ciphertext.as_ref())
            .map_err(|_| StoreError::Crypto("decryption failed (wrong key?)".to_string()))?;

        String::from_utf8(plaintext).map_err(|e| StoreError::Crypto(e.to_string()))
    }
}

/// Fresh random bytes for salts and device keys.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut buf = [0u8; N];
    rand::thread_rng().fill_bytes(&mut buf);
    buf
}
