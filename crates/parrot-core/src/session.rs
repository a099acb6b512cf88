//! Sessions - the secured channel the core talks through
//!
//! A session yields decoded, authenticated [`InboundEvent`]s on an unbounded
//! ordered channel and accepts [`OutboundMessage`]s for transmission. How it
//! gets there (handshake, encryption, server connectivity) is its own
//! business.
//!
//! Two implementations ship with the crate:
//! - [`LoopbackSession`]: in-process, only reaches the agent itself
//! - [`RelaySession`]: newline-delimited JSON frames over TCP to a relay

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::AgentResult;
use crate::message::{InboundEvent, OutboundMessage};
use crate::types::MessageId;

mod loopback;
mod relay;

pub use loopback::LoopbackSession;
pub use relay::{RelayFrame, RelaySession, MAX_FRAME_BYTES};

/// Receiving half of a session's inbound stream
pub type InboundReceiver = mpsc::UnboundedReceiver<InboundEvent>;

/// Outbound half of a running session
#[async_trait]
pub trait Session: Send + Sync {
    /// Hand a message to the session for encryption and transmission.
    ///
    /// Returns the id of the submitted message once the session accepted it.
    async fn submit(&self, message: OutboundMessage) -> AgentResult<MessageId>;

    /// The operator's input has ended.
    ///
    /// A session whose inbound stream only carries what the operator sends
    /// closes that stream here; events already queued are still delivered.
    fn input_ended(&self) {}
}
