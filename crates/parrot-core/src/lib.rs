//! Parrot Core Library
//!
//! Message dispatch and local-state synchronization for a command-line
//! messaging agent.
//!
//! ## Overview
//!
//! The agent keeps a persistent identity, talks to peers through a secured
//! session and keeps two local caches in sync with what it receives:
//!
//! - **Address book**: contacts keyed by identity, filled from the directory
//! - **Group directory**: groups keyed by (creator, group id)
//!
//! ## Core Principles
//!
//! - **One way in**: contacts only enter the address book through the resolver
//! - **Ordered**: inbound events are handled one at a time, in arrival order
//! - **Durable**: every store mutation is saved before it completes; a failed
//!   save is retried on the next mutation or at shutdown
//! - **Quiet core**: components publish [`AgentEvent`]s instead of printing
//!
//! ## Quick Start
//!
//! ```ignore
//! use parrot_core::{Agent, AgentConfig, LocalIdentity};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AgentConfig::new(".");
//!     let identity = LocalIdentity::load(&config.paths.identity, config.passphrase.as_bytes())?;
//!     let (agent, inbound) = Agent::connect(&identity, config).await?;
//!
//!     let mut events = agent.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("{}", event);
//!         }
//!     });
//!
//!     let stdin = tokio::io::BufReader::new(tokio::io::stdin());
//!     agent.run(inbound, stdin, CancellationToken::new()).await?;
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod config;
pub mod crypto;
pub mod directory;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod gateway;
pub mod identity;
pub mod interactive;
pub mod logging;
pub mod message;
pub mod resolver;
pub mod session;
pub mod storage;
pub mod types;

// Re-exports
pub use agent::Agent;
pub use config::{AgentConfig, AgentPaths, Passphrase, Transport};
pub use directory::{DirectoryService, HttpDirectory, DEFAULT_DIRECTORY_URL};
pub use dispatcher::{DispatchConfig, DispatchExit, Dispatcher};
pub use error::{AgentError, AgentResult, Severity};
pub use events::{event_channel, AgentEvent, EventSender};
pub use gateway::OutboundGateway;
pub use identity::{Keypair, LocalIdentity};
pub use interactive::{parse_line, InteractiveSender};
pub use message::{InboundEvent, InboundMessage, MessageKind, OutboundMessage};
pub use resolver::{ContactResolver, RetryPolicy};
pub use session::{InboundReceiver, LoopbackSession, RelayFrame, RelaySession, Session};
pub use storage::{ContactStore, GroupStore};
pub use types::*;
