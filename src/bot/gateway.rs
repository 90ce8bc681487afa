//! Transport capabilities and the inbound message shape.
//!
//! The router only talks to the chat network and the image store through these
//! traits, so the Discord adapter and the in-memory test fakes are
//! interchangeable.

use crate::errors::Result;
use async_trait::async_trait;

/// Who sent a message. `id` is the transport address, `nickname` is the name
/// used as seller and buyer identity in the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Address usable as a private-message target
    pub id: String,
    /// Display name
    pub nickname: String,
}

/// Where a message was posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chat {
    /// One-to-one conversation with the bot
    Private,
    /// Group conversation; the group id doubles as the trade venue id
    Group {
        /// Group address usable as a message target
        group_id: String,
    },
}

/// Payload of an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    /// Plain text
    Text(String),
    /// Image bytes
    Image(Vec<u8>),
    /// Raw transfer notification payload
    Transfer(String),
}

/// One message delivered by the transport.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Conversation the message was posted in
    pub chat: Chat,
    /// Author of the message
    pub sender: Identity,
    /// Message content
    pub body: MessageBody,
}

impl InboundMessage {
    /// Target that replies to this message go to.
    #[must_use]
    pub fn reply_target(&self) -> &str {
        match &self.chat {
            Chat::Private => &self.sender.id,
            Chat::Group { group_id } => group_id,
        }
    }

    /// Group id when the message was posted in a group.
    #[must_use]
    pub fn group_id(&self) -> Option<&str> {
        match &self.chat {
            Chat::Private => None,
            Chat::Group { group_id } => Some(group_id),
        }
    }
}

/// A group the bot account administers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRef {
    /// Group address usable as a message target
    pub id: String,
    /// Display name of the group
    pub name: String,
}

/// A contact reachable by private message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactRef {
    /// Address usable as a private-message target
    pub id: String,
    /// Display name, matched against sender nicknames
    pub nickname: String,
}

/// Sending side of the chat transport.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Sends a text message to a user or group.
    async fn send_text(&self, target: &str, text: &str) -> Result<()>;

    /// Sends an image to a user or group.
    async fn send_image(&self, target: &str, image: &[u8]) -> Result<()>;

    /// Resolves the sender of a message.
    fn current_sender_identity(&self, message: &InboundMessage) -> Identity {
        message.sender.clone()
    }

    /// Groups administered by the bot account.
    async fn list_groups(&self) -> Result<Vec<GroupRef>>;

    /// Contacts reachable by private message.
    async fn list_contacts(&self) -> Result<Vec<ContactRef>>;
}

/// Storage for uploaded images.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores bytes under a new collision-resistant name and returns the reference.
    async fn store(&self, bytes: &[u8]) -> Result<String>;

    /// Reads back previously stored bytes.
    async fn load(&self, reference: &str) -> Result<Vec<u8>>;
}
