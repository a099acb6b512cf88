//! Local identity of the agent
//!
//! The identity file holds our 8-character identity and the X25519 secret
//! key, sealed with the operator's passphrase:
//!
//! ```text
//! {
//!   "version": 1,
//!   "salt": "<hex, 16 bytes>",
//!   "sealed": "<base64: nonce || ChaCha20-Poly1305(contents)>"
//! }
//! ```
//!
//! `contents` is `{"identity":"1337ABCD","secret":"<hex, 32 bytes>"}`.
//! Nothing about the identity is readable without the passphrase.

mod keypair;

pub use keypair::Keypair;

use std::fs;
use std::io;
use std::path::Path;

use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::crypto::PassphraseSeal;
use crate::error::{AgentError, AgentResult};
use crate::storage::atomic_write;
use crate::types::{Identity, PublicKey};

const FILE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct IdentityFile {
    version: u32,
    salt: String,
    sealed: String,
}

#[derive(Serialize, Deserialize)]
struct Contents {
    identity: Identity,
    secret: String,
}

/// Our identity together with its secret key
#[derive(Debug, Clone)]
pub struct LocalIdentity {
    identity: Identity,
    keypair: Keypair,
}

impl LocalIdentity {
    /// Create a new identity with a random code and fresh keypair
    pub fn generate() -> Self {
        Self {
            identity: Identity::random(),
            keypair: Keypair::generate(),
        }
    }

    pub fn new(identity: Identity, keypair: Keypair) -> Self {
        Self { identity, keypair }
    }

    pub fn identity(&self) -> Identity {
        self.identity
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    pub fn public_key(&self) -> PublicKey {
        self.keypair.public_key()
    }

    /// Whether an identity file exists at `path`
    pub fn exists(path: impl AsRef<Path>) -> bool {
        path.as_ref().is_file()
    }

    /// Seal this identity with `passphrase` and write it atomically to `path`.
    pub fn save(&self, path: impl AsRef<Path>, passphrase: &[u8]) -> AgentResult<()> {
        let path = path.as_ref();
        let contents = serde_json::to_vec(&Contents {
            identity: self.identity,
            secret: hex::encode(self.keypair.to_bytes()),
        })?;

        let salt = PassphraseSeal::generate_salt();
        let sealed = PassphraseSeal::derive(passphrase, &salt)?.seal(&contents)?;
        let file = IdentityFile {
            version: FILE_VERSION,
            salt: hex::encode(salt),
            sealed: base64::engine::general_purpose::STANDARD.encode(sealed),
        };

        let data = serde_json::to_vec_pretty(&file)?;
        atomic_write(path, &data).map_err(|source| AgentError::Persistence {
            path: path.to_path_buf(),
            source,
        })?;
        info!(identity = %self.identity, path = %path.display(), "Saved identity file");
        Ok(())
    }

    /// Read and unseal the identity file at `path`.
    ///
    /// Every failure (missing file, unknown version, wrong passphrase,
    /// corrupt contents) is reported as [`AgentError::IdentityFile`].
    pub fn load(path: impl AsRef<Path>, passphrase: &[u8]) -> AgentResult<Self> {
        let path = path.as_ref();
        let fail = |reason: String| AgentError::IdentityFile(format!("{}: {}", path.display(), reason));

        let data = fs::read(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => fail("not found".to_string()),
            _ => fail(e.to_string()),
        })?;
        let file: IdentityFile =
            serde_json::from_slice(&data).map_err(|e| fail(format!("malformed: {}", e)))?;
        if file.version != FILE_VERSION {
            return Err(fail(format!("unsupported version {}", file.version)));
        }

        let salt = hex::decode(&file.salt).map_err(|e| fail(format!("bad salt: {}", e)))?;
        let sealed = base64::engine::general_purpose::STANDARD
            .decode(&file.sealed)
            .map_err(|e| fail(format!("bad sealed data: {}", e)))?;
        let contents = PassphraseSeal::derive(passphrase, &salt)?
            .open(&sealed)
            .map_err(|_| fail("wrong passphrase or corrupted file".to_string()))?;

        let contents: Contents =
            serde_json::from_slice(&contents).map_err(|e| fail(format!("malformed: {}", e)))?;
        let secret = hex::decode(&contents.secret).map_err(|e| fail(format!("bad secret: {}", e)))?;
        let keypair = Keypair::from_slice(&secret)?;

        info!(identity = %contents.identity, "Loaded identity file");
        Ok(Self::new(contents.identity, keypair))
    }
}
