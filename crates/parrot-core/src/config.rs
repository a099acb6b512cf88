//! Agent configuration
//!
//! Everything the agent needs to start, independent of where it came from
//! (the CLI builds it from flags).

use std::path::{Path, PathBuf};

use crate::dispatcher::DispatchConfig;
use crate::error::{AgentError, AgentResult};
use crate::resolver::RetryPolicy;
use crate::types::contact::truncate_nickname;

/// Identity file name inside the configuration directory
pub const IDENTITY_FILE: &str = "threema.id";
/// Address book file name inside the configuration directory
pub const ADDRESS_BOOK_FILE: &str = "address.book";
/// Group directory file name inside the configuration directory
pub const GROUP_DIRECTORY_FILE: &str = "group.directory";

/// Default public nickname
pub const DEFAULT_NICKNAME: &str = "parrot";
/// Default identity file passphrase
pub const DEFAULT_PASSPHRASE: &str = "01234567";
/// Passphrases shorter than this get a warning
pub const MIN_PASSPHRASE_LEN: usize = 8;

/// Locations of the three persistent files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentPaths {
    pub identity: PathBuf,
    pub address_book: PathBuf,
    pub group_directory: PathBuf,
}

impl AgentPaths {
    /// Standard file names inside `confdir`
    pub fn in_dir(confdir: impl AsRef<Path>) -> Self {
        let confdir = confdir.as_ref();
        Self {
            identity: confdir.join(IDENTITY_FILE),
            address_book: confdir.join(ADDRESS_BOOK_FILE),
            group_directory: confdir.join(GROUP_DIRECTORY_FILE),
        }
    }
}

/// Passphrase protecting the identity file
#[derive(Clone, PartialEq, Eq)]
pub struct Passphrase(Vec<u8>);

impl Passphrase {
    /// Take a plain passphrase as typed
    pub fn plain(pass: &str) -> Self {
        Self(pass.as_bytes().to_vec())
    }

    /// Decode a hex-encoded passphrase; invalid hex is a configuration error
    pub fn from_hex(hexpass: &str) -> AgentResult<Self> {
        hex::decode(hexpass)
            .map(Self)
            .map_err(|e| AgentError::Config(format!("--hexpass is not valid hex: {}", e)))
    }

    /// Whether the passphrase is shorter than [`MIN_PASSPHRASE_LEN`]
    pub fn is_weak(&self) -> bool {
        self.0.len() < MIN_PASSPHRASE_LEN
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Default for Passphrase {
    fn default() -> Self {
        Self::plain(DEFAULT_PASSPHRASE)
    }
}

impl std::fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Passphrase({} bytes)", self.0.len())
    }
}

/// Where the session connects
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Transport {
    /// Offline, only messages to ourselves are delivered
    #[default]
    Loopback,
    /// Relay at `host:port`
    Relay(String),
}

/// Complete agent configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub paths: AgentPaths,
    /// Public nickname, at most 32 bytes
    pub nickname: String,
    pub passphrase: Passphrase,
    pub transport: Transport,
    pub directory_url: String,
    pub retry: RetryPolicy,
    pub dispatch: DispatchConfig,
}

impl AgentConfig {
    /// Defaults for a configuration directory
    pub fn new(confdir: impl AsRef<Path>) -> Self {
        Self {
            paths: AgentPaths::in_dir(confdir),
            nickname: DEFAULT_NICKNAME.to_string(),
            passphrase: Passphrase::default(),
            transport: Transport::default(),
            directory_url: crate::directory::DEFAULT_DIRECTORY_URL.to_string(),
            retry: RetryPolicy::default(),
            dispatch: DispatchConfig::default(),
        }
    }

    /// Set the public nickname, truncated to 32 bytes
    pub fn with_nickname(mut self, nickname: &str) -> Self {
        self.nickname = truncate_nickname(nickname);
        self
    }
}
