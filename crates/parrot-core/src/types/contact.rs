//! Contact types
//!
//! A contact is everything the agent knows about a remote identity: the
//! public key the directory handed out, the public nickname the peer last
//! announced, and an optional first/last name.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Identity;
use crate::error::AgentError;

/// Maximum length of a public nickname in bytes
pub const MAX_NICKNAME_BYTES: usize = 32;

/// Truncate a nickname to [`MAX_NICKNAME_BYTES`] without splitting a character.
pub fn truncate_nickname(nickname: &str) -> String {
    if nickname.len() <= MAX_NICKNAME_BYTES {
        return nickname.to_string();
    }
    let mut end = MAX_NICKNAME_BYTES;
    while !nickname.is_char_boundary(end) {
        end -= 1;
    }
    nickname[..end].to_string()
}

/// 32-byte public key of a contact, serialized as hex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    /// Parse from a slice, which must be exactly 32 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, AgentError> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| AgentError::Crypto(format!("public key must be 32 bytes, got {}", bytes.len())))?;
        Ok(Self(arr))
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl TryFrom<String> for PublicKey {
    type Error = AgentError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let bytes = hex::decode(&s).map_err(|e| AgentError::Crypto(format!("bad public key hex: {}", e)))?;
        Self::from_slice(&bytes)
    }
}

impl From<PublicKey> for String {
    fn from(key: PublicKey) -> Self {
        hex::encode(key.0)
    }
}

/// A known remote party
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// The contact's identity code
    pub identity: Identity,
    /// Nickname announced by the contact itself
    #[serde(default)]
    pub public_nickname: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// Public key as published by the directory
    pub public_key: PublicKey,
}

impl Contact {
    /// Create a contact with only identity and key set
    pub fn new(identity: Identity, public_key: PublicKey) -> Self {
        Self {
            identity,
            public_nickname: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            public_key,
        }
    }

    /// Builder-style nickname setter (truncates to 32 bytes)
    pub fn with_nickname(mut self, nickname: &str) -> Self {
        self.public_nickname = truncate_nickname(nickname);
        self
    }

    /// Human readable label.
    ///
    /// `[ID] "nick"` by default. When a first or last name is known the
    /// name replaces the nickname, unless `with_nickname` asks for both:
    /// `[ID] First Last "nick"`.
    pub fn display_name(&self, with_nickname: bool) -> String {
        let quoted = format!("\"{}\"", self.public_nickname);
        let full_name = [self.first_name.as_str(), self.last_name.as_str()]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ");

        let label = if full_name.is_empty() {
            quoted
        } else if with_nickname {
            format!("{} {}", full_name, quoted)
        } else {
            full_name
        };

        format!("[{}] {}", self.identity, label)
    }
}
