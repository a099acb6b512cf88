//! In-process session that can only reach the agent itself

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use super::{InboundReceiver, Session};
use crate::error::{AgentError, AgentResult};
use crate::message::{InboundEvent, InboundMessage, OutboundMessage};
use crate::types::{Identity, MessageId};

/// Offline session
///
/// Messages addressed to the agent's own identity come straight back as
/// inbound events; anything else fails with a send error. Since only the
/// operator can feed it, the inbound stream closes once their input ends.
pub struct LoopbackSession {
    own: Identity,
    nickname: String,
    inbound_tx: Mutex<Option<mpsc::UnboundedSender<InboundEvent>>>,
}

impl LoopbackSession {
    /// Start a loopback session for `own`
    pub fn start(own: Identity, nickname: impl Into<String>) -> (Self, InboundReceiver) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        (
            Self {
                own,
                nickname: nickname.into(),
                inbound_tx: Mutex::new(Some(inbound_tx)),
            },
            inbound_rx,
        )
    }

    fn deliver(&self, message: InboundMessage) -> AgentResult<()> {
        let inbound = self.inbound_tx.lock();
        let tx = inbound.as_ref().ok_or(AgentError::SessionClosed)?;
        tx.send(InboundEvent::Message(message))
            .map_err(|_| AgentError::SessionClosed)
    }

    fn no_route(&self, to: &Identity) -> AgentError {
        AgentError::Send(format!("offline, no route to {}", to))
    }
}

#[async_trait]
impl Session for LoopbackSession {
    async fn submit(&self, message: OutboundMessage) -> AgentResult<MessageId> {
        let id = message.id();
        debug!(%id, "Loopback submit");

        match message {
            OutboundMessage::Text { to, body, .. } => {
                if to != self.own {
                    return Err(self.no_route(&to));
                }
                self.deliver(InboundMessage::Text {
                    sender: self.own,
                    id,
                    nickname: self.nickname.clone(),
                    body,
                })?;
            }
            OutboundMessage::GroupText {
                creator,
                group_id,
                recipients,
                body,
                ..
            } => {
                if !recipients.contains(&self.own) {
                    return Ok(id);
                }
                self.deliver(InboundMessage::GroupText {
                    sender: self.own,
                    id,
                    creator,
                    group_id,
                    body,
                })?;
            }
            OutboundMessage::DeliveryReceipt {
                to,
                status,
                acknowledged,
                ..
            } => {
                if to != self.own {
                    return Err(self.no_route(&to));
                }
                self.deliver(InboundMessage::DeliveryReceipt {
                    sender: self.own,
                    id,
                    status,
                    acknowledged,
                })?;
            }
        }

        Ok(id)
    }

    fn input_ended(&self) {
        if self.inbound_tx.lock().take().is_some() {
            debug!("Loopback inbound closed");
        }
    }
}
