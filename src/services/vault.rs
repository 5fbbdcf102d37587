//! At-rest encryption for OAuth tokens.
//!
//! Format: `IV (16 bytes) || tag (16 bytes) || ciphertext`, hex encoded,
//! AES-256-GCM with a fresh random IV per call.

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Nonce, Tag};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{AppError, Result};

pub const IV_LEN: usize = 16;
pub const TAG_LEN: usize = 16;

type Aes256Gcm16 = AesGcm<Aes256, U16>;

#[derive(Clone)]
pub struct CredentialVault {
    cipher: Aes256Gcm16,
}

impl std::fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CredentialVault(..)")
    }
}

impl CredentialVault {
    /// Build from a 64-character hex key.
    pub fn from_hex(key_hex: &str) -> Result<Self> {
        let key = hex::decode(key_hex)
            .map_err(|e| AppError::Crypto(format!("encryption key is not hex: {e}")))?;
        if key.len() != 32 {
            return Err(AppError::Crypto(format!(
                "encryption key must be 32 bytes, got {}",
                key.len()
            )));
        }
        let cipher = Aes256Gcm16::new_from_slice(&key)
            .map_err(|e| AppError::Crypto(e.to_string()))?;
        Ok(Self { cipher })
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);

        let mut buffer = plaintext.as_bytes().to_vec();
        let tag = self
            .cipher
            .encrypt_in_place_detached(Nonce::<U16>::from_slice(&iv), b"", &mut buffer)
            .map_err(|_| AppError::Crypto("encryption failed".to_string()))?;

        let mut out = Vec::with_capacity(IV_LEN + TAG_LEN + buffer.len());
        out.extend_from_slice(&iv);
        out.extend_from_slice(&tag);
        out.extend_from_slice(&buffer);
        Ok(hex::encode(out))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String> {
        let data = hex::decode(encoded)
            .map_err(|e| AppError::Crypto(format!("ciphertext is not hex: {e}")))?;
        if data.len() < IV_LEN + TAG_LEN {
            return Err(AppError::Crypto("ciphertext too short".to_string()));
        }

        let (iv, rest) = data.split_at(IV_LEN);
        let (tag, ciphertext) = rest.split_at(TAG_LEN);

        let mut buffer = ciphertext.to_vec();
        self.cipher
            .decrypt_in_place_detached(
                Nonce::<U16>::from_slice(iv),
                b"",
                &mut buffer,
                Tag::from_slice(tag),
            )
            .map_err(|_| AppError::Crypto("decryption failed: ciphertext was tampered with or key is wrong".to_string()))?;

        String::from_utf8(buffer).map_err(|e| AppError::Crypto(e.to_string()))
    }
}
