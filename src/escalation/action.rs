use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::gateway::MessageRef;
use crate::{ChatId, MemberId};

/// One inbound message event, as delivered by the platform glue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    pub chat_id: ChatId,
    pub message_id: i64,
    pub sender: MemberId,
    /// Message body, absent for pure media posts.
    pub text: Option<String>,
    /// Opaque media reference, absent for pure text posts.
    pub media: Option<String>,
    pub sent_at: DateTime<Utc>,
}

impl MessageEvent {
    pub fn text(
        chat_id: ChatId,
        message_id: i64,
        sender: MemberId,
        body: impl Into<String>,
        sent_at: DateTime<Utc>,
    ) -> Self {
        Self {
            chat_id,
            message_id,
            sender,
            text: Some(body.into()),
            media: None,
            sent_at,
        }
    }

    pub fn media(
        chat_id: ChatId,
        message_id: i64,
        sender: MemberId,
        reference: impl Into<String>,
        sent_at: DateTime<Utc>,
    ) -> Self {
        Self {
            chat_id,
            message_id,
            sender,
            text: None,
            media: Some(reference.into()),
            sent_at,
        }
    }

    pub fn reference(&self) -> MessageRef {
        MessageRef {
            chat_id: self.chat_id,
            message_id: self.message_id,
        }
    }
}

/// Reply context required by moderator commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyTarget {
    pub chat_id: ChatId,
    pub member: MemberId,
}

/// Outcome value of evaluating one event; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnforcementAction {
    None,
    DeleteMessage,
    Mute(Duration),
    Ban,
}

/// Result of processing one inbound message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventOutcome {
    pub action: EnforcementAction,
    /// Member reputation after any delta committed by this event.
    pub reputation: f64,
    pub events_in_window: u32,
}

/// Result of a moderator command or review action.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandOutcome {
    pub action: EnforcementAction,
    /// Subject reputation after any delta committed by this command.
    pub reputation: f64,
    /// Post-insert warn count for the subject.
    pub warn_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_reference() {
        let event = MessageEvent::text(10, 77, 1, "hi", Utc::now());
        assert_eq!(
            event.reference(),
            MessageRef {
                chat_id: 10,
                message_id: 77
            }
        );
    }

    #[test]
    fn test_constructors_set_payload_kind() {
        let text = MessageEvent::text(1, 1, 1, "hello", Utc::now());
        assert!(text.text.is_some() && text.media.is_none());

        let media = MessageEvent::media(1, 1, 1, "photo.jpg", Utc::now());
        assert!(media.media.is_some() && media.text.is_none());
    }
}
