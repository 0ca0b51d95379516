//! Support ticket intake
//!
//! A three-step form modeled as an explicit finite-state machine with typed
//! states and a transition table, keyed by the member running it:
//!
//! ```text
//! open -> AwaitingDescription -> AwaitingPriority -> (filed, session ends)
//! ```
//!
//! Sessions are process-scoped and time out after inactivity; the sweep
//! prunes them. Filing a ticket notifies the review channel and counts
//! toward the member's activity.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::EngineError;
use crate::gateway::{ChatGateway, NoticeTarget};
use crate::reputation::{ActivityCounter, ReputationStore};
use crate::sweep::TransientState;
use crate::{ChannelId, ChatId, MemberId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketState {
    AwaitingDescription,
    AwaitingPriority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketPriority {
    Normal,
    Urgent,
}

#[derive(Debug, Clone)]
struct TicketSession {
    ticket_id: u64,
    chat_id: ChatId,
    state: TicketState,
    description: Option<String>,
    last_update: DateTime<Utc>,
}

/// Ticket intake desk; one active session per member.
pub struct TicketDesk {
    store: Arc<ReputationStore>,
    gateway: Arc<dyn ChatGateway>,
    review_channel: ChannelId,
    sessions: DashMap<MemberId, TicketSession>,
    next_ticket: AtomicU64,
    ttl: Duration,
}

impl TicketDesk {
    pub fn new(
        store: Arc<ReputationStore>,
        gateway: Arc<dyn ChatGateway>,
        review_channel: ChannelId,
        session_ttl_secs: i64,
    ) -> Self {
        Self {
            store,
            gateway,
            review_channel,
            sessions: DashMap::new(),
            next_ticket: AtomicU64::new(1),
            ttl: Duration::seconds(session_ttl_secs),
        }
    }

    /// Start a ticket session. A member with a session already open keeps
    /// it; the existing ticket id is returned.
    pub async fn open(&self, chat_id: ChatId, member: MemberId) -> Result<u64, EngineError> {
        if let Some(session) = self.sessions.get(&member) {
            return Ok(session.ticket_id);
        }

        let ticket_id = self.next_ticket.fetch_add(1, Ordering::SeqCst);
        self.sessions.insert(
            member,
            TicketSession {
                ticket_id,
                chat_id,
                state: TicketState::AwaitingDescription,
                description: None,
                last_update: Utc::now(),
            },
        );

        self.notify(
            NoticeTarget::Chat(chat_id),
            &format!(
                "Ticket #{} has been created. Please describe your issue.",
                ticket_id
            ),
        )
        .await;

        info!(member, ticket_id, "Ticket session opened");
        Ok(ticket_id)
    }

    /// Feed one member reply into the state machine.
    ///
    /// Transition table: a description is accepted only in
    /// `AwaitingDescription`; any other input is rejected with
    /// `InvalidTarget` and leaves the session untouched.
    pub async fn handle_reply(
        &self,
        member: MemberId,
        text: &str,
    ) -> Result<TicketState, EngineError> {
        let (chat_id, ticket_id) = {
            let mut session = self
                .sessions
                .get_mut(&member)
                .ok_or(EngineError::InvalidTarget)?;

            match session.state {
                TicketState::AwaitingDescription => {
                    session.description = Some(text.to_string());
                    session.state = TicketState::AwaitingPriority;
                    session.last_update = Utc::now();
                    (session.chat_id, session.ticket_id)
                }
                TicketState::AwaitingPriority => return Err(EngineError::InvalidTarget),
            }
        };

        self.notify(
            NoticeTarget::Chat(chat_id),
            &format!("Is ticket #{} an urgent issue?", ticket_id),
        )
        .await;

        Ok(TicketState::AwaitingPriority)
    }

    /// Set the priority and file the ticket, ending the session.
    pub async fn set_priority(
        &self,
        member: MemberId,
        priority: TicketPriority,
    ) -> Result<u64, EngineError> {
        // Missing session and wrong state are the same typed failure; the
        // session only ends when the transition is legal.
        let (_, session) = self
            .sessions
            .remove_if(&member, |_, s| s.state == TicketState::AwaitingPriority)
            .ok_or(EngineError::InvalidTarget)?;

        self.store
            .record_activity(member, ActivityCounter::TicketsOpened)
            .await?;

        self.notify(
            NoticeTarget::Channel(self.review_channel),
            &format!(
                "New ticket #{} from member {} ({:?}): {}",
                session.ticket_id,
                member,
                priority,
                session.description.as_deref().unwrap_or("(no description)")
            ),
        )
        .await;

        info!(
            member,
            ticket_id = session.ticket_id,
            ?priority,
            "Ticket filed"
        );
        Ok(session.ticket_id)
    }

    /// Abandon an open session, if any.
    pub fn cancel(&self, member: MemberId) -> bool {
        self.sessions.remove(&member).is_some()
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions.len()
    }

    async fn notify(&self, target: NoticeTarget, body: &str) {
        if let Err(e) = self.gateway.send_message(target, body, &[]).await {
            warn!("Failed to deliver ticket notice: {}", e);
        }
    }
}

impl TransientState for TicketDesk {
    fn prune_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| now - session.last_update <= self.ttl);
        before - self.sessions.len()
    }
}
