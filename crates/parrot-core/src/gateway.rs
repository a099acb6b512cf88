//! Outbound gateway - addressed plaintext in, message ids out

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::AgentResult;
use crate::message::OutboundMessage;
use crate::resolver::ContactResolver;
use crate::session::Session;
use crate::types::{Contact, Group, Identity, MessageId, ReceiptStatus};

/// Hands outbound messages to the session
///
/// 1:1 texts go through the resolver first so the destination ends up in
/// the address book. Group texts and receipts address parties we already
/// know and skip resolution.
#[derive(Clone)]
pub struct OutboundGateway {
    own: Identity,
    session: Arc<dyn Session>,
    resolver: Arc<ContactResolver>,
}

impl OutboundGateway {
    pub fn new(own: Identity, session: Arc<dyn Session>, resolver: Arc<ContactResolver>) -> Self {
        Self {
            own,
            session,
            resolver,
        }
    }

    /// The agent's own identity
    pub fn own_identity(&self) -> Identity {
        self.own
    }

    /// Tell the session that no more operator input will arrive
    pub(crate) fn input_ended(&self) {
        self.session.input_ended();
    }

    /// Resolve `destination` and send it a text message.
    ///
    /// Returns the message id together with the resolved contact.
    pub async fn send_text(
        &self,
        destination: &Identity,
        body: &str,
    ) -> AgentResult<(MessageId, Contact)> {
        let contact = self.resolver.resolve(destination, None).await?;
        let id = self
            .session
            .submit(OutboundMessage::Text {
                id: MessageId::new(),
                to: *destination,
                body: body.to_string(),
            })
            .await?;
        info!(%id, to = %destination, "Sent text message");
        Ok((id, contact))
    }

    /// Send a text to every member of `group` except ourselves.
    ///
    /// The session fans the message out per recipient under one id. `None`
    /// if we are the only member.
    pub async fn send_group_text(
        &self,
        group: &Group,
        body: &str,
    ) -> AgentResult<Option<MessageId>> {
        let recipients: Vec<Identity> = group.recipients(&self.own).copied().collect();
        if recipients.is_empty() {
            debug!(group_id = %group.group_id, "Group has no other members");
            return Ok(None);
        }

        let id = self
            .session
            .submit(OutboundMessage::GroupText {
                id: MessageId::new(),
                creator: group.creator,
                group_id: group.group_id,
                recipients: recipients.clone(),
                body: body.to_string(),
            })
            .await?;
        info!(%id, group_id = %group.group_id, recipients = recipients.len(), "Sent group text");
        Ok(Some(id))
    }

    /// Confirm `acknowledged` to its sender
    pub async fn send_delivery_receipt(
        &self,
        to: &Identity,
        acknowledged: MessageId,
        status: ReceiptStatus,
    ) -> AgentResult<MessageId> {
        let id = self
            .session
            .submit(OutboundMessage::DeliveryReceipt {
                id: MessageId::new(),
                to: *to,
                status,
                acknowledged,
            })
            .await?;
        debug!(%id, %to, %acknowledged, %status, "Sent delivery receipt");
        Ok(id)
    }
}
