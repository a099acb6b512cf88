//! Decoded protocol messages
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  InboundEvent: what the session hands to the dispatcher         │
//! │  ├── Message(InboundMessage): decoded, authenticated payload    │
//! │  └── Error(String): a single receive failed                     │
//! │                                                                 │
//! │  OutboundMessage: what the gateway hands to the session         │
//! │  ├── Text: 1:1 text                                             │
//! │  ├── GroupText: text to every member of a group                 │
//! │  └── DeliveryReceipt: confirmation for a received message       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{GroupId, Identity, MessageId, ReceiptStatus};

/// One item of the inbound stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InboundEvent {
    /// A decoded message
    Message(InboundMessage),
    /// Receiving or decoding one message failed; the stream continues
    Error(String),
}

/// Decoded inbound payload, one variant per protocol message kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InboundMessage {
    Text {
        sender: Identity,
        id: MessageId,
        nickname: String,
        body: String,
    },
    Image {
        sender: Identity,
        id: MessageId,
    },
    Audio {
        sender: Identity,
        id: MessageId,
    },
    GroupText {
        sender: Identity,
        id: MessageId,
        creator: Identity,
        group_id: GroupId,
        body: String,
    },
    /// Sent by the group creator
    GroupSetName {
        sender: Identity,
        id: MessageId,
        group_id: GroupId,
        name: String,
    },
    /// Sent by the group creator
    GroupSetMembers {
        sender: Identity,
        id: MessageId,
        group_id: GroupId,
        members: Vec<Identity>,
    },
    GroupMemberLeft {
        sender: Identity,
        id: MessageId,
        creator: Identity,
        group_id: GroupId,
    },
    DeliveryReceipt {
        sender: Identity,
        id: MessageId,
        status: ReceiptStatus,
        acknowledged: MessageId,
    },
    TypingNotification {
        sender: Identity,
        id: MessageId,
        typing: bool,
    },
    /// Anything this agent does not understand
    Unknown {
        sender: Identity,
        id: MessageId,
        type_code: u8,
        #[serde(default)]
        payload: Vec<u8>,
    },
}

/// Tag-only view of [`InboundMessage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Text,
    Image,
    Audio,
    GroupText,
    GroupSetName,
    GroupSetMembers,
    GroupMemberLeft,
    DeliveryReceipt,
    TypingNotification,
    Unknown,
}

impl MessageKind {
    /// Every kind, so tests can check each one is handled
    pub const ALL: [MessageKind; 10] = [
        MessageKind::Text,
        MessageKind::Image,
        MessageKind::Audio,
        MessageKind::GroupText,
        MessageKind::GroupSetName,
        MessageKind::GroupSetMembers,
        MessageKind::GroupMemberLeft,
        MessageKind::DeliveryReceipt,
        MessageKind::TypingNotification,
        MessageKind::Unknown,
    ];
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::Audio => "audio",
            MessageKind::GroupText => "group_text",
            MessageKind::GroupSetName => "group_set_name",
            MessageKind::GroupSetMembers => "group_set_members",
            MessageKind::GroupMemberLeft => "group_member_left",
            MessageKind::DeliveryReceipt => "delivery_receipt",
            MessageKind::TypingNotification => "typing_notification",
            MessageKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

impl InboundMessage {
    /// The kind tag of this message
    pub fn kind(&self) -> MessageKind {
        match self {
            InboundMessage::Text { .. } => MessageKind::Text,
            InboundMessage::Image { .. } => MessageKind::Image,
            InboundMessage::Audio { .. } => MessageKind::Audio,
            InboundMessage::GroupText { .. } => MessageKind::GroupText,
            InboundMessage::GroupSetName { .. } => MessageKind::GroupSetName,
            InboundMessage::GroupSetMembers { .. } => MessageKind::GroupSetMembers,
            InboundMessage::GroupMemberLeft { .. } => MessageKind::GroupMemberLeft,
            InboundMessage::DeliveryReceipt { .. } => MessageKind::DeliveryReceipt,
            InboundMessage::TypingNotification { .. } => MessageKind::TypingNotification,
            InboundMessage::Unknown { .. } => MessageKind::Unknown,
        }
    }

    /// Who sent this message
    pub fn sender(&self) -> Identity {
        match self {
            InboundMessage::Text { sender, .. }
            | InboundMessage::Image { sender, .. }
            | InboundMessage::Audio { sender, .. }
            | InboundMessage::GroupText { sender, .. }
            | InboundMessage::GroupSetName { sender, .. }
            | InboundMessage::GroupSetMembers { sender, .. }
            | InboundMessage::GroupMemberLeft { sender, .. }
            | InboundMessage::DeliveryReceipt { sender, .. }
            | InboundMessage::TypingNotification { sender, .. }
            | InboundMessage::Unknown { sender, .. } => *sender,
        }
    }

    /// Protocol message id
    pub fn id(&self) -> MessageId {
        match self {
            InboundMessage::Text { id, .. }
            | InboundMessage::Image { id, .. }
            | InboundMessage::Audio { id, .. }
            | InboundMessage::GroupText { id, .. }
            | InboundMessage::GroupSetName { id, .. }
            | InboundMessage::GroupSetMembers { id, .. }
            | InboundMessage::GroupMemberLeft { id, .. }
            | InboundMessage::DeliveryReceipt { id, .. }
            | InboundMessage::TypingNotification { id, .. }
            | InboundMessage::Unknown { id, .. } => *id,
        }
    }
}

/// Outbound payload handed to a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutboundMessage {
    Text {
        id: MessageId,
        to: Identity,
        body: String,
    },
    /// One copy per recipient is produced by the session
    GroupText {
        id: MessageId,
        creator: Identity,
        group_id: GroupId,
        recipients: Vec<Identity>,
        body: String,
    },
    DeliveryReceipt {
        id: MessageId,
        to: Identity,
        status: ReceiptStatus,
        acknowledged: MessageId,
    },
}

impl OutboundMessage {
    /// Message id assigned when the request was built
    pub fn id(&self) -> MessageId {
        match self {
            OutboundMessage::Text { id, .. }
            | OutboundMessage::GroupText { id, .. }
            | OutboundMessage::DeliveryReceipt { id, .. } => *id,
        }
    }
}
