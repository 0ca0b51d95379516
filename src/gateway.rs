//! Chat transport collaborator contract
//!
//! The engine never talks to a chat platform directly; it dispatches
//! enforcement and notices through this trait. Failures are reported, never
//! fatal: a dropped notice or a failed restrict call must not unwind
//! reputation state that was already committed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ChatId, MemberId};

/// Stable reference to a single message inside a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: i64,
}

/// Permission set applied by `restrict_member`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPermissions {
    pub can_send_messages: bool,
    pub can_send_media: bool,
}

impl ChatPermissions {
    /// Full member permissions, restored after verification or mute expiry.
    pub fn full() -> Self {
        Self {
            can_send_messages: true,
            can_send_media: true,
        }
    }

    /// No-send permissions used for mutes and unverified members.
    pub fn muted() -> Self {
        Self {
            can_send_messages: false,
            can_send_media: false,
        }
    }
}

/// Destination of an outbound notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeTarget {
    /// The chat a moderated message was posted in.
    Chat(ChatId),
    /// A direct notice to one member.
    Member(MemberId),
    /// The review channel watched by human moderators.
    Channel(crate::ChannelId),
}

/// Action set attached to review-channel alerts for a human to invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewAction {
    Warn,
    Mute,
    Ban,
}

/// The full review palette sent with every toxicity/media alert.
pub const REVIEW_ACTIONS: [ReviewAction; 3] =
    [ReviewAction::Warn, ReviewAction::Mute, ReviewAction::Ban];

/// Chat-platform gateway consumed by the engine.
///
/// Implementations are expected to treat repeated enforcement as a no-op:
/// restricting an already-restricted member or banning an already-banned one
/// returns `Ok` rather than an error.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Remove a message from its chat.
    async fn delete_message(&self, message: MessageRef) -> anyhow::Result<()>;

    /// Apply a permission set to a member, optionally until a deadline.
    async fn restrict_member(
        &self,
        chat_id: ChatId,
        member: MemberId,
        permissions: ChatPermissions,
        until: Option<DateTime<Utc>>,
    ) -> anyhow::Result<()>;

    /// Permanently remove a member from a chat.
    async fn ban_member(&self, chat_id: ChatId, member: MemberId) -> anyhow::Result<()>;

    /// Deliver a human-readable notice, optionally carrying review actions.
    async fn send_message(
        &self,
        target: NoticeTarget,
        body: &str,
        actions: &[ReviewAction],
    ) -> anyhow::Result<()>;
}
