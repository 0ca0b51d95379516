use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::ReputationPolicy;
use crate::database::DatabasePool;
use crate::error::EngineError;
use crate::reputation::{ActivityCounter, MemberRecord};
use crate::MemberId;

/// Single-writer reputation store.
///
/// In-memory state is authoritative and mutated through per-member atomic
/// entry access, so concurrent deltas for one member accumulate and never
/// overwrite each other. When a database is attached every mutation is
/// mirrored; a rejected mirror write fails the triggering operation instead
/// of silently skipping it.
pub struct ReputationStore {
    policy: ReputationPolicy,
    members: DashMap<MemberId, MemberRecord>,
    db: Option<Arc<DatabasePool>>,
}

impl ReputationStore {
    pub fn new(policy: ReputationPolicy) -> Self {
        Self {
            policy,
            members: DashMap::new(),
            db: None,
        }
    }

    pub fn with_database(mut self, db: Arc<DatabasePool>) -> Self {
        self.db = Some(db);
        self
    }

    /// Load persisted member records into memory. Called once at startup.
    pub async fn hydrate(&self) -> Result<usize, EngineError> {
        let Some(ref db) = self.db else {
            return Ok(0);
        };

        let records = db.members().all().await.map_err(EngineError::store)?;
        let count = records.len();
        for record in records {
            self.members.insert(record.member_id, record);
        }

        info!(members = count, "Hydrated reputation store");
        Ok(count)
    }

    /// Current score, or the policy default for an unseen member. Never
    /// fails and never creates a record.
    pub fn get(&self, member: MemberId) -> f64 {
        self.members
            .get(&member)
            .map(|r| r.reputation)
            .unwrap_or(self.policy.default_score)
    }

    /// Full record for a member, created lazily on first observation.
    pub async fn record(&self, member: MemberId) -> Result<MemberRecord, EngineError> {
        let record = self
            .members
            .entry(member)
            .or_insert_with(|| {
                debug!(member, "Creating member record on first observation");
                MemberRecord::new(member, self.policy.default_score, Utc::now())
            })
            .clone();

        self.mirror(&record).await?;
        Ok(record)
    }

    /// Apply a reputation delta and return the new score.
    ///
    /// The read-modify-write happens under the member's map entry, so
    /// interleaved calls for the same member serialize and their deltas sum.
    pub async fn adjust(&self, member: MemberId, delta: f64) -> Result<f64, EngineError> {
        let updated = {
            let mut entry = self.members.entry(member).or_insert_with(|| {
                MemberRecord::new(member, self.policy.default_score, Utc::now())
            });
            let record = entry.value_mut();
            record.reputation = self.policy.clamp_score(record.reputation + delta);
            record.clone()
        };

        self.mirror(&updated).await?;

        debug!(
            member,
            delta,
            reputation = updated.reputation,
            "Adjusted reputation"
        );
        Ok(updated.reputation)
    }

    /// Increment a named activity counter and bump `last_active`.
    pub async fn record_activity(
        &self,
        member: MemberId,
        counter: ActivityCounter,
    ) -> Result<(), EngineError> {
        let updated = {
            let mut entry = self.members.entry(member).or_insert_with(|| {
                MemberRecord::new(member, self.policy.default_score, Utc::now())
            });
            let record = entry.value_mut();
            match counter {
                ActivityCounter::MessagesSent => record.messages_sent += 1,
                ActivityCounter::TicketsOpened => record.tickets_opened += 1,
            }
            record.last_active = Utc::now();
            record.clone()
        };

        self.mirror(&updated).await
    }

    /// Point-in-time copy of every record, for digests and leaderboards.
    pub fn snapshot(&self) -> Vec<MemberRecord> {
        self.members.iter().map(|r| r.value().clone()).collect()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    async fn mirror(&self, record: &MemberRecord) -> Result<(), EngineError> {
        if let Some(ref db) = self.db {
            db.members()
                .upsert(record)
                .await
                .map_err(EngineError::store)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ReputationStore {
        ReputationStore::new(ReputationPolicy::default())
    }

    #[tokio::test]
    async fn test_unseen_member_gets_default() {
        let store = store();
        assert_eq!(store.get(1), 50.0);
        assert_eq!(store.member_count(), 0);
    }

    #[tokio::test]
    async fn test_adjust_clamps_into_bound() {
        let store = store();
        assert_eq!(store.adjust(1, 70.0).await.unwrap(), 100.0);
        assert_eq!(store.adjust(1, -150.0).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_unclamped_policy_allows_overflow() {
        let store = ReputationStore::new(ReputationPolicy {
            clamp: false,
            ..ReputationPolicy::default()
        });
        assert_eq!(store.adjust(1, 70.0).await.unwrap(), 120.0);
    }

    #[tokio::test]
    async fn test_deltas_accumulate_concurrently() {
        let store = Arc::new(store());

        let mut handles = vec![];
        for _ in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.adjust(7, 1.0).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.get(7), 70.0);
    }

    #[tokio::test]
    async fn test_record_activity_creates_and_counts() {
        let store = store();
        store
            .record_activity(3, ActivityCounter::MessagesSent)
            .await
            .unwrap();
        store
            .record_activity(3, ActivityCounter::MessagesSent)
            .await
            .unwrap();
        store
            .record_activity(3, ActivityCounter::TicketsOpened)
            .await
            .unwrap();

        let snapshot = store.snapshot();
        let record = snapshot.iter().find(|r| r.member_id == 3).unwrap();
        assert_eq!(record.messages_sent, 2);
        assert_eq!(record.tickets_opened, 1);
        assert_eq!(record.reputation, 50.0);
    }

    #[tokio::test]
    async fn test_snapshot_is_point_in_time() {
        let store = store();
        store.adjust(1, 5.0).await.unwrap();
        let snapshot = store.snapshot();
        store.adjust(1, 5.0).await.unwrap();

        assert_eq!(snapshot[0].reputation, 55.0);
        assert_eq!(store.get(1), 60.0);
    }
}
