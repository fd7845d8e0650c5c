//! envelope - field-level encryption for keeper records
//!
//! A 256-bit key is derived from a passphrase and used with AES-256-GCM.
//! Every encryption draws a fresh 96-bit nonce which is prepended to the
//! ciphertext, so the output layout is `nonce || ciphertext || tag`.
//!
//! Only the `opaque` and `meta` fields of a record are encrypted. Name and
//! type stay readable because the stores look records up by them.

mod record;

pub use record::{decrypt_record, encrypt_record};

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of the nonce prepended to every ciphertext
pub const NONCE_LEN: usize = 12;

/// Envelope errors
#[derive(Error, Debug)]
pub enum CryptError {
    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Decryption error: {0}")]
    Decryption(String),
}

pub type Result<T> = std::result::Result<T, CryptError>;

/// Symmetric key, wiped from memory when dropped
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Key([u8; 32]);

impl Key {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(aes_gcm::Key::<Aes256Gcm>::from_slice(&self.0))
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Key(..)")
    }
}

/// Derive a key from a passphrase
///
/// Plain SHA-256, so the same passphrase always yields the same key.
pub fn derive_key(passphrase: &[u8]) -> Key {
    Key(Sha256::digest(passphrase).into())
}

/// Encrypt `plaintext`, returning `nonce || ciphertext || tag`
pub fn encrypt(key: &Key, plaintext: &[u8]) -> Result<Vec<u8>> {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = key
        .cipher()
        .encrypt(&nonce, plaintext)
        .map_err(|e| CryptError::Encryption(e.to_string()))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt the output of [`encrypt`]
///
/// Fails on truncated input and whenever authentication fails, which is the
/// case for a wrong key as well as for corrupted data.
pub fn decrypt(key: &Key, data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < NONCE_LEN {
        return Err(CryptError::Decryption(format!(
            "ciphertext too short: {} bytes",
            data.len()
        )));
    }

    let (nonce, ciphertext) = data.split_at(NONCE_LEN);
    key.cipher()
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptError::Decryption("authentication failed".to_string()))
}

/// Encrypt a string into hex text
pub fn encrypt_string(key: &Key, plaintext: &str) -> Result<String> {
    Ok(hex::encode(encrypt(key, plaintext.as_bytes())?))
}

/// Decrypt hex text produced by [`encrypt_string`]
pub fn decrypt_string(key: &Key, hex_text: &str) -> Result<String> {
    let data = hex::decode(hex_text).map_err(|e| CryptError::Decryption(e.to_string()))?;
    let plain = decrypt(key, &data)?;
    String::from_utf8(plain).map_err(|e| CryptError::Decryption(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let key = derive_key(b"correct horse battery");
        let sealed = encrypt(&key, b"top secret").unwrap();
        assert_eq!(sealed.len(), NONCE_LEN + b"top secret".len() + 16);
        assert_eq!(decrypt(&key, &sealed).unwrap(), b"top secret");
    }

    #[test]
    fn test_wrong_key() {
        let sealed = encrypt(&derive_key(b"first passphrase"), b"data").unwrap();
        let err = decrypt(&derive_key(b"second passphrase"), &sealed).unwrap_err();
        assert!(matches!(err, CryptError::Decryption(_)));
    }

    #[test]
    fn test_tampered_ciphertext() {
        let key = derive_key(b"some passphrase");
        let mut sealed = encrypt(&key, b"data").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(decrypt(&key, &sealed).is_err());
    }

    #[test]
    fn test_short_input() {
        let key = derive_key(b"some passphrase");
        let err = decrypt(&key, &[0u8; NONCE_LEN - 1]).unwrap_err();
        assert!(matches!(err, CryptError::Decryption(_)));
    }

    #[test]
    fn test_key_is_deterministic() {
        let a = derive_key(b"same passphrase");
        let b = derive_key(b"same passphrase");
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_ne!(a.as_bytes(), derive_key(b"other passphrase").as_bytes());
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let key = derive_key(b"some passphrase");
        let first = encrypt_string(&key, "hello").unwrap();
        let second = encrypt_string(&key, "hello").unwrap();
        assert_ne!(first, second);
        assert_eq!(decrypt_string(&key, &first).unwrap(), "hello");
        assert_eq!(decrypt_string(&key, &second).unwrap(), "hello");
    }

    #[test]
    fn test_bad_hex() {
        let key = derive_key(b"some passphrase");
        assert!(matches!(
            decrypt_string(&key, "not hex at all"),
            Err(CryptError::Decryption(_))
        ));
    }

    #[test]
    fn test_debug_hides_key() {
        let key = derive_key(b"some passphrase");
        assert_eq!(format!("{:?}", key), "Key(..)");
    }
}
