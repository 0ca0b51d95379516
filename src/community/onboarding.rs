//! Welcome and verification flow
//!
//! New members are restricted on join until they confirm they are human
//! through a verify action. Pending verifications are transient state,
//! expired by the sweep; an unverified member who never clicks simply
//! stays restricted.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::EngineError;
use crate::gateway::{ChatGateway, ChatPermissions, NoticeTarget};
use crate::reputation::ReputationStore;
use crate::sweep::TransientState;
use crate::{ChatId, MemberId};

#[derive(Debug, Clone, Copy)]
struct PendingVerification {
    chat_id: ChatId,
    requested_at: DateTime<Utc>,
}

pub struct Onboarding {
    store: Arc<ReputationStore>,
    gateway: Arc<dyn ChatGateway>,
    pending: DashMap<MemberId, PendingVerification>,
    ttl: Duration,
}

impl Onboarding {
    pub fn new(
        store: Arc<ReputationStore>,
        gateway: Arc<dyn ChatGateway>,
        session_ttl_secs: i64,
    ) -> Self {
        Self {
            store,
            gateway,
            pending: DashMap::new(),
            ttl: Duration::seconds(session_ttl_secs),
        }
    }

    /// Handle a join event: restrict, create the member record, welcome.
    pub async fn member_joined(
        &self,
        chat_id: ChatId,
        member: MemberId,
    ) -> Result<(), EngineError> {
        if let Err(e) = self
            .gateway
            .restrict_member(chat_id, member, ChatPermissions::muted(), None)
            .await
        {
            // The member stays unrestricted; verification still applies.
            warn!(member, "Failed to restrict new member: {}", e);
        }

        self.store.record(member).await?;
        self.pending.insert(
            member,
            PendingVerification {
                chat_id,
                requested_at: Utc::now(),
            },
        );

        if let Err(e) = self
            .gateway
            .send_message(
                NoticeTarget::Chat(chat_id),
                &format!(
                    "Welcome, member {}! Please verify you are human to start posting.",
                    member
                ),
                &[],
            )
            .await
        {
            warn!(member, "Failed to deliver welcome notice: {}", e);
        }

        info!(member, chat_id, "New member awaiting verification");
        Ok(())
    }

    /// Handle a verify action.
    ///
    /// Only the member being verified may click their own button; anyone
    /// else is rejected without touching the pending entry.
    pub async fn verify(
        &self,
        clicker: MemberId,
        subject: MemberId,
    ) -> Result<(), EngineError> {
        if clicker != subject {
            return Err(EngineError::Unauthorized);
        }

        let (_, pending) = self
            .pending
            .remove(&subject)
            .ok_or(EngineError::InvalidTarget)?;

        self.gateway
            .restrict_member(pending.chat_id, subject, ChatPermissions::full(), None)
            .await
            .map_err(EngineError::transport)?;

        if let Err(e) = self
            .gateway
            .send_message(
                NoticeTarget::Chat(pending.chat_id),
                &format!("Member {} has been verified. Welcome!", subject),
                &[],
            )
            .await
        {
            warn!(member = subject, "Failed to deliver verification notice: {}", e);
        }

        info!(member = subject, "Member verified");
        Ok(())
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl TransientState for Onboarding {
    fn prune_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.pending.len();
        self.pending
            .retain(|_, pending| now - pending.requested_at <= self.ttl);
        before - self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReputationPolicy;
    use crate::gateway::{MessageRef, ReviewAction};
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct TestGateway {
        restricts: StdMutex<Vec<(MemberId, ChatPermissions)>>,
    }

    #[async_trait::async_trait]
    impl ChatGateway for TestGateway {
        async fn delete_message(&self, _message: MessageRef) -> anyhow::Result<()> {
            Ok(())
        }

        async fn restrict_member(
            &self,
            _chat_id: ChatId,
            member: MemberId,
            permissions: ChatPermissions,
            _until: Option<DateTime<Utc>>,
        ) -> anyhow::Result<()> {
            self.restricts.lock().unwrap().push((member, permissions));
            Ok(())
        }

        async fn ban_member(&self, _chat_id: ChatId, _member: MemberId) -> anyhow::Result<()> {
            Ok(())
        }

        async fn send_message(
            &self,
            _target: NoticeTarget,
            _body: &str,
            _actions: &[ReviewAction],
        ) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn onboarding(gateway: Arc<TestGateway>) -> Onboarding {
        let store = Arc::new(ReputationStore::new(ReputationPolicy::default()));
        Onboarding::new(store, gateway, 1800)
    }

    #[tokio::test]
    async fn test_join_restricts_and_creates_record() {
        let gateway = Arc::new(TestGateway::default());
        let onboarding = onboarding(gateway.clone());

        onboarding.member_joined(10, 1).await.unwrap();

        let restricts = gateway.restricts.lock().unwrap();
        assert_eq!(restricts.as_slice(), &[(1, ChatPermissions::muted())]);
        assert_eq!(onboarding.pending_count(), 1);
        assert_eq!(onboarding.store.get(1), 50.0);
    }

    #[tokio::test]
    async fn test_verify_restores_permissions() {
        let gateway = Arc::new(TestGateway::default());
        let onboarding = onboarding(gateway.clone());

        onboarding.member_joined(10, 1).await.unwrap();
        onboarding.verify(1, 1).await.unwrap();

        let restricts = gateway.restricts.lock().unwrap();
        assert_eq!(restricts.last().unwrap(), &(1, ChatPermissions::full()));
        assert_eq!(onboarding.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_verify_rejects_other_members() {
        let gateway = Arc::new(TestGateway::default());
        let onboarding = onboarding(gateway);

        onboarding.member_joined(10, 1).await.unwrap();

        let err = onboarding.verify(2, 1).await.unwrap_err();
        assert_eq!(err, EngineError::Unauthorized);
        // The pending entry survives a hijack attempt.
        assert_eq!(onboarding.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_verify_without_pending_entry() {
        let gateway = Arc::new(TestGateway::default());
        let onboarding = onboarding(gateway);

        let err = onboarding.verify(1, 1).await.unwrap_err();
        assert_eq!(err, EngineError::InvalidTarget);
    }

    #[tokio::test]
    async fn test_pending_entries_expire() {
        let gateway = Arc::new(TestGateway::default());
        let onboarding = onboarding(gateway);

        onboarding.member_joined(10, 1).await.unwrap();
        let dropped = onboarding.prune_expired(Utc::now() + Duration::hours(1));
        assert_eq!(dropped, 1);
        assert_eq!(onboarding.pending_count(), 0);
    }
}
