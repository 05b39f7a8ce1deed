//! Field-level encryption and display masking
//!
//! Sensitive columns are encrypted at rest with AES-256-GCM. Each call
//! uses a fresh random 12-byte nonce; the stored blob layout is
//! `nonce || ciphertext || tag`.

use aes_gcm::{
    aead::{rand_core::RngCore, Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE, Engine};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};

/// Size of AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of AES-GCM nonce in bytes
pub const NONCE_SIZE: usize = 12;

/// A record-encryption key that is zeroed on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct FieldKey {
    bytes: [u8; KEY_SIZE],
}

impl FieldKey {
    /// Generate a new random key
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Decode a URL-safe base64 key; the decoded value must be exactly 32 bytes
    pub fn from_base64(b64: &str) -> Result<Self> {
        let decoded = URL_SAFE.decode(b64.trim()).map_err(|_| Error::KeyFormat)?;
        if decoded.len() != KEY_SIZE {
            return Err(Error::KeyFormat);
        }
        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&decoded);
        Ok(Self { bytes })
    }

    /// Export as URL-safe base64 (for the runtime key file)
    pub fn to_base64(&self) -> String {
        URL_SAFE.encode(self.bytes)
    }

    fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for FieldKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Encrypts and decrypts text columns with AES-256-GCM
#[derive(Clone)]
pub struct FieldCipher {
    cipher: Aes256Gcm,
}

impl FieldCipher {
    pub fn new(key: &FieldKey) -> Self {
        // 32-byte input cannot fail key-size validation
        let cipher = Aes256Gcm::new(key.as_bytes().into());
        Self { cipher }
    }

    /// Encrypt UTF-8 text into `nonce || ciphertext || tag`
    pub fn encrypt(&self, plaintext: &str) -> Result<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| Error::Encryption)?;

        let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    /// Decrypt a stored blob back into UTF-8 text
    ///
    /// An authentication failure or truncated blob is an error; corrupted
    /// data is never returned as plaintext.
    pub fn decrypt(&self, blob: &[u8]) -> Result<String> {
        if blob.len() < NONCE_SIZE {
            return Err(Error::Decryption);
        }
        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| Error::Decryption)?;

        String::from_utf8(plaintext).map_err(|_| Error::Decryption)
    }
}

impl std::fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldCipher")
            .field("cipher", &"[REDACTED]")
            .finish()
    }
}

/// Mask a resident id like `123456-1234567` => `123456-1******`
///
/// Dashes in the input are ignored; the masked form always shows the
/// birthdate part and the first digit of the remainder.
pub fn mask_resident_id(resident_id: &str) -> String {
    let cleaned: String = resident_id.chars().filter(|c| *c != '-').collect();
    let head: String = cleaned.chars().take(6).collect();
    let marker: String = cleaned.chars().skip(6).take(1).collect();
    format!("{head}-{marker}******")
}

/// Mask an account or card number except the last 4 characters
pub fn mask_account(value: &str) -> String {
    let len = value.chars().count();
    if len <= 4 {
        return "*".repeat(len);
    }
    let suffix: String = value.chars().skip(len - 4).collect();
    format!("{}{}", "*".repeat(len - 4), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_key_generation_is_random() {
        let key1 = FieldKey::generate();
        let key2 = FieldKey::generate();
        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_key_base64_roundtrip() {
        let key = FieldKey::generate();
        let restored = FieldKey::from_base64(&key.to_base64()).unwrap();
        assert_eq!(key.as_bytes(), restored.as_bytes());
    }

    #[test]
    fn test_key_rejects_wrong_length() {
        let short = URL_SAFE.encode([7u8; 16]);
        assert!(matches!(FieldKey::from_base64(&short), Err(Error::KeyFormat)));
        assert!(matches!(FieldKey::from_base64("not base64!!"), Err(Error::KeyFormat)));
    }

    #[test]
    fn test_key_debug_redacted() {
        let key = FieldKey::generate();
        let debug = format!("{:?}", key);
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let cipher = FieldCipher::new(&FieldKey::generate());
        for text in ["9710139019902", "", "계좌 1234-567", "odd utf8 ✓"] {
            let blob = cipher.encrypt(text).unwrap();
            assert_eq!(cipher.decrypt(&blob).unwrap(), text);
        }
    }

    #[test]
    fn test_decrypt_with_wrong_key_fails() {
        let cipher1 = FieldCipher::new(&FieldKey::generate());
        let cipher2 = FieldCipher::new(&FieldKey::generate());
        let blob = cipher1.encrypt("secret").unwrap();
        assert!(matches!(cipher2.decrypt(&blob), Err(Error::Decryption)));
    }

    #[test]
    fn test_tampered_blob_fails() {
        let cipher = FieldCipher::new(&FieldKey::generate());
        let blob = cipher.encrypt("9710139019902").unwrap();

        // Flip one bit in every position past the nonce: ciphertext and tag
        for i in NONCE_SIZE..blob.len() {
            let mut tampered = blob.clone();
            tampered[i] ^= 0x01;
            assert!(
                matches!(cipher.decrypt(&tampered), Err(Error::Decryption)),
                "bit flip at {} was not detected",
                i
            );
        }
    }

    #[test]
    fn test_truncated_blob_fails() {
        let cipher = FieldCipher::new(&FieldKey::generate());
        let blob = cipher.encrypt("secret").unwrap();
        assert!(matches!(cipher.decrypt(&blob[..5]), Err(Error::Decryption)));
        assert!(matches!(cipher.decrypt(&[]), Err(Error::Decryption)));
    }

    #[test]
    fn test_nonces_do_not_repeat() {
        let cipher = FieldCipher::new(&FieldKey::generate());
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            let blob = cipher.encrypt("x").unwrap();
            assert!(seen.insert(blob[..NONCE_SIZE].to_vec()), "nonce repeated");
        }
    }

    #[test]
    fn test_mask_resident_id() {
        assert_eq!(mask_resident_id("123456-1234567"), "123456-1******");
        assert_eq!(mask_resident_id("1234561234567"), "123456-1******");
    }

    #[test]
    fn test_mask_account() {
        assert_eq!(mask_account("123456789012"), "********9012");
        assert_eq!(mask_account("12"), "**");
        assert_eq!(mask_account("1234"), "****");
        assert_eq!(mask_account("12345"), "*2345");
    }
}
