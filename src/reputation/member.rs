use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::MemberId;

/// Per-member durable record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberRecord {
    pub member_id: MemberId,

    /// Bounded trust score; see [`crate::config::ReputationPolicy`].
    pub reputation: f64,

    /// Clean messages observed for this member.
    pub messages_sent: u64,

    /// Support tickets filed by this member.
    pub tickets_opened: u64,

    /// First observation (join or first message).
    pub joined_at: DateTime<Utc>,

    /// Last counted activity, consumed by the inactivity sweep.
    pub last_active: DateTime<Utc>,
}

impl MemberRecord {
    pub fn new(member_id: MemberId, default_score: f64, now: DateTime<Utc>) -> Self {
        Self {
            member_id,
            reputation: default_score,
            messages_sent: 0,
            tickets_opened: 0,
            joined_at: now,
            last_active: now,
        }
    }
}

/// Closed set of named activity counters.
///
/// Mutation targets are picked from this enum, never from caller-supplied
/// field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityCounter {
    MessagesSent,
    TicketsOpened,
}

impl ActivityCounter {
    /// Column name used by the persistence mirror.
    pub fn column(&self) -> &'static str {
        match self {
            ActivityCounter::MessagesSent => "messages_sent",
            ActivityCounter::TicketsOpened => "tickets_opened",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_defaults() {
        let now = Utc::now();
        let record = MemberRecord::new(42, 50.0, now);
        assert_eq!(record.member_id, 42);
        assert_eq!(record.reputation, 50.0);
        assert_eq!(record.messages_sent, 0);
        assert_eq!(record.joined_at, now);
    }

    #[test]
    fn test_counter_columns_are_closed() {
        assert_eq!(ActivityCounter::MessagesSent.column(), "messages_sent");
        assert_eq!(ActivityCounter::TicketsOpened.column(), "tickets_opened");
    }
}
