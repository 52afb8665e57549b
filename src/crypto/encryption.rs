use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::Rng;

use crate::error::{AppError, AppResult};

const NONCE_SIZE: usize = 12;

/// AES-256-GCM sealing of node credentials before they reach the database.
/// Output is base64 of `nonce || ciphertext`.
pub struct CredentialCipher {
    cipher: Aes256Gcm,
}

impl CredentialCipher {
    pub fn new(key: &str) -> AppResult<Self> {
        if key.len() != 32 {
            return Err(AppError::EncryptionError(
                "Encryption key must be 32 bytes".to_string(),
            ));
        }

        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| AppError::EncryptionError(format!("Failed to create cipher: {}", e)))?;

        Ok(Self { cipher })
    }

    pub fn seal(&self, plaintext: &str) -> AppResult<String> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| AppError::EncryptionError(format!("Encryption failed: {}", e)))?;

        let mut sealed = nonce_bytes.to_vec();
        sealed.extend(ciphertext);

        Ok(STANDARD.encode(sealed))
    }

    pub fn open(&self, sealed: &str) -> AppResult<String> {
        let data = STANDARD
            .decode(sealed)
            .map_err(|e| AppError::EncryptionError(format!("Base64 decode failed: {}", e)))?;

        if data.len() < NONCE_SIZE {
            return Err(AppError::EncryptionError(
                "Invalid encrypted data: too short".to_string(),
            ));
        }

        let (nonce_bytes, ciphertext) = data.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| AppError::EncryptionError(format!("Decryption failed: {}", e)))?;

        String::from_utf8(plaintext)
            .map_err(|e| AppError::EncryptionError(format!("UTF-8 decode failed: {}", e)))
    }
}
