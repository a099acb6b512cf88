//! Message dispatcher - one reaction per inbound message kind
//!
//! ## Reactions
//!
//! | Kind               | Reaction                                                  |
//! |--------------------|-----------------------------------------------------------|
//! | Text               | publish, delivery receipt, nickname tracking, echo reply  |
//! | GroupText          | publish, optional reply to the other members              |
//! | GroupSetName       | publish, rename group, save group directory               |
//! | GroupSetMembers    | publish, replace member list, save group directory        |
//! | GroupMemberLeft    | publish                                                   |
//! | DeliveryReceipt    | publish                                                   |
//! | TypingNotification | publish                                                   |
//! | Image / Audio      | publish (content not rendered)                            |
//! | Unknown            | warn, publish type code and payload                       |
//!
//! Messages from our own identity are published but never answered, so a
//! loopback session cannot make the agent talk to itself forever.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::AgentResult;
use crate::events::{triage, AgentEvent, EventSender};
use crate::gateway::OutboundGateway;
use crate::message::{InboundEvent, InboundMessage};
use crate::resolver::ContactResolver;
use crate::session::InboundReceiver;
use crate::storage::GroupStore;
use crate::types::{GroupUpdate, Identity, ReceiptStatus};

/// Optional automatic replies
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Answer every 1:1 text with `> {body}`
    pub echo: bool,
    /// Text sent to the other members whenever a known group talks
    pub group_reply: Option<String>,
}

/// Why the dispatcher stopped without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchExit {
    /// The session closed its inbound stream
    StreamClosed,
    /// Shutdown was requested
    Shutdown,
}

/// Consumes the inbound stream strictly in arrival order
#[derive(Clone)]
pub struct Dispatcher {
    own: Identity,
    resolver: Arc<ContactResolver>,
    groups: Arc<GroupStore>,
    gateway: OutboundGateway,
    events: EventSender,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(
        resolver: Arc<ContactResolver>,
        groups: Arc<GroupStore>,
        gateway: OutboundGateway,
        events: EventSender,
        config: DispatchConfig,
    ) -> Self {
        Self {
            own: gateway.own_identity(),
            resolver,
            groups,
            gateway,
            events,
            config,
        }
    }

    /// Process inbound events until the stream closes or `shutdown` fires.
    ///
    /// The event being handled when shutdown is requested is finished
    /// first. Both stores are flushed on every way out, including a fatal
    /// error, which is returned after it has been published.
    pub async fn run(
        &self,
        mut inbound: InboundReceiver,
        shutdown: CancellationToken,
    ) -> AgentResult<DispatchExit> {
        info!(identity = %self.own, "Dispatcher started");

        let result = loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break Ok(DispatchExit::Shutdown),
                event = inbound.recv() => match event {
                    Some(event) => {
                        if let Err(e) = self.dispatch(event).await {
                            break Err(e);
                        }
                    }
                    None => break Ok(DispatchExit::StreamClosed),
                },
            }
        };

        self.flush_stores();
        info!(?result, "Dispatcher stopped");
        result
    }

    /// Handle one item of the inbound stream.
    ///
    /// Recoverable failures are published and swallowed; only fatal ones
    /// come back as `Err`.
    pub async fn dispatch(&self, event: InboundEvent) -> AgentResult<()> {
        match event {
            InboundEvent::Message(message) => self.handle(message).await,
            InboundEvent::Error(message) => {
                warn!(%message, "Error receiving message");
                self.publish(AgentEvent::TransportError { message });
                Ok(())
            }
        }
    }

    async fn handle(&self, message: InboundMessage) -> AgentResult<()> {
        debug!(kind = %message.kind(), sender = %message.sender(), id = %message.id(), "Dispatching");

        match message {
            InboundMessage::Text {
                sender,
                id,
                nickname,
                body,
            } => {
                self.publish(AgentEvent::TextReceived {
                    sender,
                    nickname: nickname.clone(),
                    body: body.clone(),
                });
                if sender == self.own {
                    return Ok(());
                }

                triage(
                    &self.events,
                    self.gateway
                        .send_delivery_receipt(&sender, id, ReceiptStatus::Delivered)
                        .await,
                )?;
                triage(
                    &self.events,
                    self.resolver.observe_nickname(&sender, &nickname).await,
                )?;
                if self.config.echo {
                    self.echo(&sender, &body).await?;
                }
            }

            InboundMessage::GroupText {
                sender,
                creator,
                group_id,
                body,
                ..
            } => {
                self.publish(AgentEvent::GroupTextReceived {
                    sender,
                    creator,
                    group_id,
                    body,
                });
                if sender == self.own {
                    return Ok(());
                }
                let Some(reply) = &self.config.group_reply else {
                    return Ok(());
                };
                match self.groups.lookup(&creator, &group_id) {
                    Some(group) => {
                        let sent = triage(
                            &self.events,
                            self.gateway.send_group_text(&group, reply).await,
                        )?;
                        if let Some(Some(_)) = sent {
                            self.publish(AgentEvent::GroupReplySent {
                                group_id,
                                recipients: group.recipients(&self.own).count(),
                            });
                        }
                    }
                    None => debug!(%creator, %group_id, "No reply to unknown group"),
                }
            }

            InboundMessage::GroupSetName {
                sender,
                group_id,
                name,
                ..
            } => {
                self.publish(AgentEvent::GroupRenamed {
                    creator: sender,
                    group_id,
                    name: name.clone(),
                });
                self.groups.upsert(GroupUpdate::name(sender, group_id, name));
                triage(&self.events, self.groups.persist())?;
            }

            InboundMessage::GroupSetMembers {
                sender,
                group_id,
                members,
                ..
            } => {
                self.publish(AgentEvent::GroupMembersChanged {
                    creator: sender,
                    group_id,
                    members: members.clone(),
                });
                self.groups
                    .upsert(GroupUpdate::members(sender, group_id, members));
                triage(&self.events, self.groups.persist())?;
            }

            InboundMessage::GroupMemberLeft {
                sender, group_id, ..
            } => self.publish(AgentEvent::GroupMemberLeft {
                member: sender,
                group_id,
            }),

            InboundMessage::DeliveryReceipt {
                sender,
                status,
                acknowledged,
                ..
            } => self.publish(AgentEvent::ReceiptReceived {
                sender,
                acknowledged,
                status,
            }),

            InboundMessage::TypingNotification { sender, typing, .. } => {
                self.publish(AgentEvent::Typing { sender, typing })
            }

            InboundMessage::Image { sender, .. } => {
                self.publish(AgentEvent::ImageReceived { sender })
            }

            InboundMessage::Audio { sender, .. } => {
                self.publish(AgentEvent::AudioReceived { sender })
            }

            InboundMessage::Unknown {
                sender,
                type_code,
                payload,
                ..
            } => {
                warn!(%sender, type_code, len = payload.len(), "Unknown message type");
                self.publish(AgentEvent::UnknownMessage {
                    sender,
                    type_code,
                    payload,
                });
            }
        }

        Ok(())
    }

    async fn echo(&self, to: &Identity, body: &str) -> AgentResult<()> {
        let reply = format!("> {}", body);
        if let Some((id, contact)) = triage(&self.events, self.gateway.send_text(to, &reply).await)? {
            self.publish(AgentEvent::MessageSent {
                id,
                to: contact,
                body: reply,
            });
        }
        Ok(())
    }

    fn flush_stores(&self) {
        let _ = triage(&self.events, self.resolver.contacts().flush());
        let _ = triage(&self.events, self.groups.flush());
    }

    fn publish(&self, event: AgentEvent) {
        // No subscribers is fine; the agent runs headless in tests.
        let _ = self.events.send(event);
    }
}
