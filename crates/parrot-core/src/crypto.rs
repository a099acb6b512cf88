//! Passphrase sealing using ChaCha20-Poly1305 AEAD
//!
//! Protects the identity file at rest. The 32-byte cipher key is derived
//! from the operator's passphrase with HKDF-SHA256 and a per-file random
//! salt, so the same passphrase never yields the same key twice.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;

use crate::error::{AgentError, AgentResult};

/// Nonce size for ChaCha20-Poly1305 (12 bytes)
pub const NONCE_SIZE: usize = 12;

/// Salt size for key derivation
pub const SALT_SIZE: usize = 16;

const KDF_INFO: &[u8] = b"parrot identity file v1";

/// Cipher keyed from a passphrase.
///
/// # Wire Format
///
/// Sealed data format: `[nonce (12 bytes)] + [ciphertext + auth_tag (16 bytes)]`
///
/// # Example
///
/// ```
/// use parrot_core::crypto::PassphraseSeal;
///
/// let salt = PassphraseSeal::generate_salt();
/// let seal = PassphraseSeal::derive(b"01234567", &salt).unwrap();
///
/// let sealed = seal.seal(b"secret").unwrap();
/// assert_eq!(seal.open(&sealed).unwrap(), b"secret");
/// ```
pub struct PassphraseSeal {
    cipher: ChaCha20Poly1305,
}

impl PassphraseSeal {
    /// Derive the cipher key from `passphrase` and `salt`.
    pub fn derive(passphrase: &[u8], salt: &[u8]) -> AgentResult<Self> {
        let hk = Hkdf::<Sha256>::new(Some(salt), passphrase);
        let mut key = [0u8; 32];
        hk.expand(KDF_INFO, &mut key)
            .map_err(|e| AgentError::Crypto(format!("Key derivation failed: {}", e)))?;
        Ok(Self {
            cipher: ChaCha20Poly1305::new((&key).into()),
        })
    }

    /// Generate a random salt for a new file
    pub fn generate_salt() -> [u8; SALT_SIZE] {
        let mut salt = [0u8; SALT_SIZE];
        rand::rng().fill_bytes(&mut salt);
        salt
    }

    /// Encrypt `plaintext` under a fresh random nonce.
    pub fn seal(&self, plaintext: &[u8]) -> AgentResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| AgentError::Crypto(format!("Encryption failed: {}", e)))?;

        let mut result = nonce_bytes.to_vec();
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    /// Decrypt data produced by [`seal`](Self::seal).
    ///
    /// Fails on a wrong passphrase, tampered data or truncated input.
    pub fn open(&self, sealed: &[u8]) -> AgentResult<Vec<u8>> {
        if sealed.len() < NONCE_SIZE {
            return Err(AgentError::Crypto(
                "Data too short to contain nonce".to_string(),
            ));
        }
        let (nonce, encrypted) = sealed.split_at(NONCE_SIZE);

        self.cipher
            .decrypt(Nonce::from_slice(nonce), encrypted)
            .map_err(|e| AgentError::Crypto(format!("Decryption failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let salt = PassphraseSeal::generate_salt();
        let seal = PassphraseSeal::derive(b"01234567", &salt).unwrap();

        let sealed = seal.seal(b"Hello, World!").unwrap();
        assert!(sealed.len() >= 13 + NONCE_SIZE + 16);
        assert_eq!(seal.open(&sealed).unwrap(), b"Hello, World!");
    }

    #[test]
    fn test_same_plaintext_different_output() {
        let seal = PassphraseSeal::derive(b"pass", &[0u8; SALT_SIZE]).unwrap();
        let a = seal.seal(b"x").unwrap();
        let b = seal.seal(b"x").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_passphrase_fails() {
        let salt = PassphraseSeal::generate_salt();
        let sealed = PassphraseSeal::derive(b"right", &salt)
            .unwrap()
            .seal(b"secret")
            .unwrap();
        let wrong = PassphraseSeal::derive(b"wrong", &salt).unwrap();
        assert!(matches!(wrong.open(&sealed), Err(AgentError::Crypto(_))));
    }

    #[test]
    fn test_different_salt_fails() {
        let sealed = PassphraseSeal::derive(b"pass", &[1u8; SALT_SIZE])
            .unwrap()
            .seal(b"secret")
            .unwrap();
        let other = PassphraseSeal::derive(b"pass", &[2u8; SALT_SIZE]).unwrap();
        assert!(other.open(&sealed).is_err());
    }

    #[test]
    fn test_tampered_data_fails() {
        let seal = PassphraseSeal::derive(b"pass", &[0u8; SALT_SIZE]).unwrap();
        let mut sealed = seal.seal(b"secret").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0xff;
        assert!(seal.open(&sealed).is_err());
    }

    #[test]
    fn test_truncated_data_fails() {
        let seal = PassphraseSeal::derive(b"pass", &[0u8; SALT_SIZE]).unwrap();
        assert!(seal.open(&[0u8; 5]).is_err());
    }
}
