//! X25519 keypair for the local identity

use rand::RngCore;
use x25519_dalek::{PublicKey as DhPublicKey, StaticSecret};

use crate::error::{AgentError, AgentResult};
use crate::types::PublicKey;

/// Long-term X25519 keypair.
///
/// The public half is what the directory publishes for our identity.
pub struct Keypair {
    secret: StaticSecret,
}

impl Keypair {
    /// Generate a new random keypair
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        rand::rng().fill_bytes(&mut seed);
        Self::from_bytes(seed)
    }

    /// Rebuild a keypair from its 32 secret bytes
    pub fn from_bytes(secret: [u8; 32]) -> Self {
        Self {
            secret: StaticSecret::from(secret),
        }
    }

    /// Rebuild a keypair from a slice, which must be exactly 32 bytes
    pub fn from_slice(bytes: &[u8]) -> AgentResult<Self> {
        let secret: [u8; 32] = bytes.try_into().map_err(|_| {
            AgentError::IdentityFile(format!("secret key must be 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self::from_bytes(secret))
    }

    /// The public key matching this secret
    pub fn public_key(&self) -> PublicKey {
        PublicKey(DhPublicKey::from(&self.secret).to_bytes())
    }

    /// The 32 secret bytes
    pub fn to_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }
}

impl Clone for Keypair {
    fn clone(&self) -> Self {
        Self::from_bytes(self.to_bytes())
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("public", &hex::encode(self.public_key().as_bytes()))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_generation() {
        let a = Keypair::generate();
        let b = Keypair::generate();
        assert_ne!(a.public_key(), b.public_key());
    }

    #[test]
    fn test_bytes_roundtrip_keeps_public_key() {
        let keypair = Keypair::generate();
        let restored = Keypair::from_bytes(keypair.to_bytes());
        assert_eq!(keypair.public_key(), restored.public_key());
    }

    #[test]
    fn test_from_slice_rejects_wrong_length() {
        assert!(matches!(
            Keypair::from_slice(&[0u8; 31]),
            Err(AgentError::IdentityFile(_))
        ));
    }

    #[test]
    fn test_debug_hides_secret() {
        let keypair = Keypair::from_bytes([7u8; 32]);
        let debug = format!("{:?}", keypair);
        assert!(!debug.contains(&hex::encode([7u8; 32])));
    }
}
