//! AES-256-GCM encryption for tokens at rest.
//!
//! Every token is encrypted independently with a fresh random nonce. The
//! 256-bit master key comes from the environment and never touches disk.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

/// Master key size in bytes (256 bits)
const KEY_SIZE: usize = 32;

/// GCM nonce size in bytes (96 bits)
const NONCE_SIZE: usize = 12;

/// Decodes and validates the base64-encoded master key.
///
/// Fails unless the decoded key is exactly 32 bytes.
pub fn validate_key(key_base64: &str) -> Result<Vec<u8>> {
    let key_bytes = BASE64
        .decode(key_base64)
        .context("Encryption key is not valid base64")?;

    if key_bytes.len() != KEY_SIZE {
        return Err(anyhow!(
            "Encryption key must be {} bytes, got {}",
            KEY_SIZE,
            key_bytes.len()
        ));
    }

    Ok(key_bytes)
}

/// Encrypts a token with AES-256-GCM under a random nonce.
///
/// Returns `(ciphertext, nonce)`, both base64-encoded for storage. The nonce
/// is generated from the OS CSPRNG and must never be reused with this key.
pub fn encrypt(plaintext: &str, key: &[u8]) -> Result<(String, String)> {
    if key.len() != KEY_SIZE {
        return Err(anyhow!("Encryption key must be {} bytes", KEY_SIZE));
    }

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| anyhow!("Failed to create cipher: {}", e))?;

    let nonce_bytes = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext_bytes = cipher
        .encrypt(&nonce_bytes, plaintext.as_bytes())
        .map_err(|e| anyhow!("Encryption failed: {}", e))?;

    Ok((BASE64.encode(&ciphertext_bytes), BASE64.encode(nonce_bytes)))
}

/// Decrypts a token previously produced by [`encrypt`].
///
/// Fails on a wrong key, a wrong nonce, or tampered ciphertext (GCM is
/// authenticated encryption).
pub fn decrypt(ciphertext: &str, nonce: &str, key: &[u8]) -> Result<String> {
    if key.len() != KEY_SIZE {
        return Err(anyhow!("Encryption key must be {} bytes", KEY_SIZE));
    }

    let ciphertext_bytes = BASE64
        .decode(ciphertext)
        .context("Failed to decode ciphertext")?;
    let nonce_bytes = BASE64.decode(nonce).context("Failed to decode nonce")?;

    if nonce_bytes.len() != NONCE_SIZE {
        return Err(anyhow!(
            "Invalid nonce size: expected {}, got {}",
            NONCE_SIZE,
            nonce_bytes.len()
        ));
    }

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| anyhow!("Failed to create cipher: {}", e))?;

    let plaintext_bytes = cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext_bytes.as_ref())
        .map_err(|e| anyhow!("Decryption failed (wrong key or corrupted data): {}", e))?;

    String::from_utf8(plaintext_bytes).context("Decrypted data is not valid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_validation() {
        let valid_key = BASE64.encode([7u8; 32]);
        assert!(validate_key(&valid_key).is_ok());

        assert!(validate_key(&BASE64.encode([0u8; 16])).is_err());
        assert!(validate_key(&BASE64.encode([0u8; 64])).is_err());
        assert!(validate_key("%%% not base64 %%%").is_err());
    }

    #[test]
    fn test_roundtrip() {
        let key = [0u8; 32];
        let plaintext = "ya29.a0AfH6-access-token";

        let (ciphertext, nonce) = encrypt(plaintext, &key).expect("Encryption failed");
        assert_ne!(ciphertext, plaintext);

        let decrypted = decrypt(&ciphertext, &nonce, &key).expect("Decryption failed");
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_nonces_are_unique() {
        let key = [0u8; 32];

        let (c1, n1) = encrypt("same-token", &key).unwrap();
        let (c2, n2) = encrypt("same-token", &key).unwrap();

        // Random nonces mean identical plaintexts never produce identical rows
        assert_ne!(n1, n2);
        assert_ne!(c1, c2);
        assert_eq!(decrypt(&c1, &n1, &key).unwrap(), "same-token");
        assert_eq!(decrypt(&c2, &n2, &key).unwrap(), "same-token");
    }

    #[test]
    fn test_wrong_key_fails() {
        let (ciphertext, nonce) = encrypt("secret", &[0u8; 32]).unwrap();
        assert!(decrypt(&ciphertext, &nonce, &[1u8; 32]).is_err());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = [0u8; 32];
        let (mut ciphertext, nonce) = encrypt("secret", &key).unwrap();

        ciphertext.push('X');
        assert!(decrypt(&ciphertext, &nonce, &key).is_err());
    }
}
