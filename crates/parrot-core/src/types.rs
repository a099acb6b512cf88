//! Core types for Parrot

use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;

pub mod contact;
pub mod group;

pub use contact::{Contact, PublicKey, MAX_NICKNAME_BYTES};
pub use group::{Group, GroupUpdate};

/// Length of an identity code in characters
pub const IDENTITY_LEN: usize = 8;

/// Check whether `s` is exactly eight characters of `[0-9A-Z]`.
///
/// This is the only identity pattern in the workspace; argument parsing,
/// the interactive sender and the resolver all go through it.
pub fn is_valid_identity(s: &str) -> bool {
    s.len() == IDENTITY_LEN
        && s
            .bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_uppercase())
}

/// Eight-character code naming a messaging party
///
/// Stored as raw ASCII so it is `Copy` and cheap to use as a map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity([u8; IDENTITY_LEN]);

impl Identity {
    /// Parse an identity, upper-casing the input first.
    ///
    /// `"1337abcd"` is accepted as `1337ABCD`; anything that is not eight
    /// alphanumeric ASCII characters is rejected.
    pub fn parse(s: &str) -> Result<Self, AgentError> {
        let upper = s.to_ascii_uppercase();
        if !is_valid_identity(&upper) {
            return Err(AgentError::InvalidIdentity(s.to_string()));
        }
        let mut bytes = [0u8; IDENTITY_LEN];
        bytes.copy_from_slice(upper.as_bytes());
        Ok(Self(bytes))
    }

    /// Generate a random identity code
    pub fn random() -> Self {
        const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
        let mut rng = rand::rng();
        let mut bytes = [0u8; IDENTITY_LEN];
        for b in bytes.iter_mut() {
            *b = ALPHABET[(rng.next_u32() as usize) % ALPHABET.len()];
        }
        Self(bytes)
    }

    /// The identity as a string slice
    pub fn as_str(&self) -> &str {
        // Only ever constructed from validated ASCII.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Identity {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Identity {
    type Error = AgentError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Identity> for String {
    fn from(id: Identity) -> Self {
        id.as_str().to_string()
    }
}

/// Identifier of a single protocol message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub [u8; 8]);

impl MessageId {
    /// Create a new random MessageId
    pub fn new() -> Self {
        let mut bytes = [0u8; 8];
        rand::rng().fill_bytes(&mut bytes);
        Self(bytes)
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Identifier of a group, unique only together with its creator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub [u8; 8]);

impl GroupId {
    /// Create a new random GroupId
    pub fn new() -> Self {
        let mut bytes = [0u8; 8];
        rand::rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Build a GroupId from an integer, big-endian
    pub fn from_u64(value: u64) -> Self {
        Self(value.to_be_bytes())
    }
}

impl Default for GroupId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Delivery receipt status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiptStatus {
    Delivered,
    Read,
    Approved,
    Disapproved,
}

impl ReceiptStatus {
    /// Numeric status as carried on the wire
    pub fn code(self) -> u8 {
        match self {
            ReceiptStatus::Delivered => 1,
            ReceiptStatus::Read => 2,
            ReceiptStatus::Approved => 3,
            ReceiptStatus::Disapproved => 4,
        }
    }

    /// Inverse of [`ReceiptStatus::code`]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(ReceiptStatus::Delivered),
            2 => Some(ReceiptStatus::Read),
            3 => Some(ReceiptStatus::Approved),
            4 => Some(ReceiptStatus::Disapproved),
            _ => None,
        }
    }
}

impl fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiptStatus::Delivered => write!(f, "delivered"),
            ReceiptStatus::Read => write!(f, "read"),
            ReceiptStatus::Approved => write!(f, "approved"),
            ReceiptStatus::Disapproved => write!(f, "disapproved"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identity() {
        assert!(is_valid_identity("ECHOECHO"));
        assert!(is_valid_identity("1337ABCD"));
        assert!(!is_valid_identity("1337abcd"));
        assert!(!is_valid_identity("1337ABC"));
        assert!(!is_valid_identity("1337ABCDE"));
        assert!(!is_valid_identity("1337-BCD"));
        assert!(!is_valid_identity("1337ÄBC"));
    }

    #[test]
    fn test_identity_parse_uppercases() {
        let id = Identity::parse("1337abcd").unwrap();
        assert_eq!(id.as_str(), "1337ABCD");
        assert_eq!(format!("{}", id), "1337ABCD");
    }

    #[test]
    fn test_identity_parse_rejects_garbage() {
        assert!(matches!(
            Identity::parse("hello"),
            Err(AgentError::InvalidIdentity(_))
        ));
        assert!(Identity::parse("ABCD 123").is_err());
    }

    #[test]
    fn test_identity_random_is_valid() {
        for _ in 0..50 {
            let id = Identity::random();
            assert!(is_valid_identity(id.as_str()));
        }
    }

    #[test]
    fn test_identity_serde_as_string() {
        let id = Identity::parse("ABCD1234").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"ABCD1234\"");
        let back: Identity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<Identity>("\"nope\"").is_err());
    }

    #[test]
    fn test_message_id_display() {
        let id = MessageId([0xde, 0xad, 0xbe, 0xef, 0, 1, 2, 3]);
        assert_eq!(id.to_string(), "deadbeef00010203");
        assert_ne!(MessageId::new(), MessageId::new());
    }

    #[test]
    fn test_group_id_from_u64() {
        assert_eq!(GroupId::from_u64(1).to_string(), "0000000000000001");
    }

    #[test]
    fn test_receipt_status_codes() {
        for status in [
            ReceiptStatus::Delivered,
            ReceiptStatus::Read,
            ReceiptStatus::Approved,
            ReceiptStatus::Disapproved,
        ] {
            assert_eq!(ReceiptStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(ReceiptStatus::from_code(9), None);
    }
}
