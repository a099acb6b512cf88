//! Error types for Parrot

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for Parrot operations
#[derive(Error, Debug)]
pub enum AgentError {
    /// A string did not match the 8-character identity format
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    /// A single inbound event could not be received or decoded
    #[error("Transport error: {0}")]
    Transport(String),

    /// The directory service could not resolve an identity
    #[error("Directory lookup for {identity} failed: {reason}")]
    Directory {
        /// Identity that was being resolved
        identity: String,
        /// Failure reported by the directory
        reason: String,
    },

    /// Saving a store to disk failed
    #[error("Saving {} failed: {source}", path.display())]
    Persistence {
        /// File that could not be written
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The session refused or failed to transmit a message
    #[error("Send error: {0}")]
    Send(String),

    /// The session is gone; nothing more can be sent or received
    #[error("Session closed")]
    SessionClosed,

    /// Loading the local identity failed (missing, corrupt or wrong passphrase)
    #[error("Identity file error: {0}")]
    IdentityFile(String),

    /// Error during serialization/deserialization
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Cryptographic operation failed
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Invalid startup configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// How the supervisor reacts to an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Report and keep running
    Recoverable,
    /// Report and terminate the agent
    Fatal,
}

impl AgentError {
    /// Classify this error for the top-level failure policy.
    ///
    /// Per-event transport errors, directory failures, store saves and
    /// outbound sends only affect the operation that triggered them. Losing
    /// the session or the identity leaves nothing to continue with.
    pub fn severity(&self) -> Severity {
        match self {
            AgentError::InvalidIdentity(_)
            | AgentError::Transport(_)
            | AgentError::Directory { .. }
            | AgentError::Persistence { .. }
            | AgentError::Send(_) => Severity::Recoverable,
            AgentError::SessionClosed
            | AgentError::IdentityFile(_)
            | AgentError::Serialization(_)
            | AgentError::Crypto(_)
            | AgentError::Config(_)
            | AgentError::Io(_) => Severity::Fatal,
        }
    }

    /// Shorthand for `severity() == Severity::Fatal`
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

/// Result type alias using AgentError
pub type AgentResult<T> = Result<T, AgentError>;
