//! Agent events - everything the operator gets to see
//!
//! The dispatcher, resolver and interactive sender never print. They
//! publish [`AgentEvent`]s on a broadcast channel and the front end decides
//! how to render them. `Display` gives the default terminal rendering.

use std::fmt;

use tokio::sync::broadcast;
use tracing::{error, warn};

use crate::error::AgentResult;
use crate::types::{Contact, GroupId, Identity, MessageId, ReceiptStatus};

/// Buffer size for the event broadcast channel.
pub const EVENT_CHANNEL_SIZE: usize = 256;

/// Sender half used by every component that reports to the operator
pub type EventSender = broadcast::Sender<AgentEvent>;

/// Create the event channel
pub fn event_channel() -> (EventSender, broadcast::Receiver<AgentEvent>) {
    broadcast::channel(EVENT_CHANNEL_SIZE)
}

/// Report a failed operation and decide whether the agent keeps going.
///
/// Recoverable errors are published as a non-fatal [`AgentEvent::Failure`]
/// and swallowed (`Ok(None)`). Fatal errors are published and handed back
/// so the caller can stop.
pub fn triage<T>(events: &EventSender, result: AgentResult<T>) -> AgentResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            let fatal = e.is_fatal();
            if fatal {
                error!(error = %e, "Fatal error");
            } else {
                warn!(error = %e, "Operation failed");
            }
            let _ = events.send(AgentEvent::Failure {
                message: e.to_string(),
                fatal,
            });
            if fatal {
                Err(e)
            } else {
                Ok(None)
            }
        }
    }
}

/// Something the operator should see
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// A 1:1 text message arrived
    TextReceived {
        sender: Identity,
        nickname: String,
        body: String,
    },
    /// Image message (display not supported)
    ImageReceived { sender: Identity },
    /// Audio message (playback not supported)
    AudioReceived { sender: Identity },
    /// A text message to a group arrived
    GroupTextReceived {
        sender: Identity,
        creator: Identity,
        group_id: GroupId,
        body: String,
    },
    /// The group creator renamed the group
    GroupRenamed {
        creator: Identity,
        group_id: GroupId,
        name: String,
    },
    /// The group creator replaced the member list
    GroupMembersChanged {
        creator: Identity,
        group_id: GroupId,
        members: Vec<Identity>,
    },
    /// A member left a group
    GroupMemberLeft {
        member: Identity,
        group_id: GroupId,
    },
    /// A delivery receipt arrived for one of our messages
    ReceiptReceived {
        sender: Identity,
        acknowledged: MessageId,
        status: ReceiptStatus,
    },
    /// Typing started or stopped
    Typing { sender: Identity, typing: bool },
    /// A message kind this agent does not understand
    UnknownMessage {
        sender: Identity,
        type_code: u8,
        payload: Vec<u8>,
    },
    /// A contact was fetched from the directory and added
    ContactAdded { contact: Contact },
    /// A known contact announced a different nickname
    NicknameChanged { contact: Contact, nickname: String },
    /// A 1:1 text was handed to the session
    MessageSent {
        id: MessageId,
        to: Contact,
        body: String,
    },
    /// An automatic reply went out to a group
    GroupReplySent {
        group_id: GroupId,
        recipients: usize,
    },
    /// An operator line did not start with a valid identity
    InvalidInput,
    /// Receiving one event failed
    TransportError { message: String },
    /// An operation failed; `fatal` errors stop the agent
    Failure { message: String, fatal: bool },
}

impl fmt::Display for AgentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentEvent::TextReceived {
                sender,
                nickname,
                body,
            } => write!(
                f,
                "\nMessage from {}: {}: {}\n--------------------\n",
                sender, nickname, body
            ),
            AgentEvent::ImageReceived { sender } => write!(
                f,
                "  Image Message from {}. (displaying image messages not implemented yet)",
                sender
            ),
            AgentEvent::AudioReceived { sender } => write!(
                f,
                "  Audio Message from {}. (playing audio messages not implemented yet)",
                sender
            ),
            AgentEvent::GroupTextReceived {
                sender,
                creator,
                group_id,
                body,
            } => write!(
                f,
                "  {} for Group [{}] created by [{}]:\n{}",
                sender, group_id, creator, body
            ),
            AgentEvent::GroupRenamed { group_id, name, .. } => {
                write!(f, "  Group [{}] is now called {}", group_id, name)
            }
            AgentEvent::GroupMembersChanged {
                group_id, members, ..
            } => {
                let list: Vec<&str> = members.iter().map(Identity::as_str).collect();
                write!(f, "  Group [{}] now includes [{}]", group_id, list.join(" "))
            }
            AgentEvent::GroupMemberLeft { member, group_id } => {
                write!(f, "  Member [{}] left the Group [{}]", member, group_id)
            }
            AgentEvent::ReceiptReceived {
                sender,
                acknowledged,
                status,
            } => write!(
                f,
                "  Message [{}] has been acknowledged by {} ({}).",
                acknowledged, sender, status
            ),
            AgentEvent::Typing { sender, typing } => write!(
                f,
                "  Typing Notification from {}: [{}]",
                sender,
                if *typing { "on" } else { "off" }
            ),
            AgentEvent::UnknownMessage {
                sender,
                type_code,
                payload,
            } => write!(
                f,
                "  Unknown message type 0x{:02x} from: {}\nContent: {}",
                type_code,
                sender,
                hex::encode(payload)
            ),
            AgentEvent::ContactAdded { contact } => write!(
                f,
                "  Contact missing in addressbook, so add it. ID: {}, Nickname: {}",
                contact.identity, contact.public_nickname
            ),
            AgentEvent::NicknameChanged { contact, nickname } => write!(
                f,
                "  Contact {} has new public nickname: {}",
                contact.display_name(true),
                nickname
            ),
            AgentEvent::MessageSent { id, to, .. } => {
                writeln!(f, "  Sending message [{}] to {}.", id, to.display_name(false))
            }
            AgentEvent::GroupReplySent {
                group_id,
                recipients,
            } => write!(
                f,
                "  Replied to Group [{}] ({} recipients)",
                group_id, recipients
            ),
            AgentEvent::InvalidInput => write!(f, "  ID is invalid!"),
            AgentEvent::TransportError { message } => {
                write!(f, "  Error Receiving Message: {}", message)
            }
            AgentEvent::Failure { message, fatal } => {
                if *fatal {
                    write!(f, "  Fatal: {}", message)
                } else {
                    write!(f, "  Error: {}", message)
                }
            }
        }
    }
}
