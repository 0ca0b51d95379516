//! Warn Ledger
//!
//! Append-only record of warnings, moderator-issued and automatic. No
//! update or delete exists: escalation tiers must be reproducible from the
//! log alone, and the history doubles as the audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::database::DatabasePool;
use crate::error::EngineError;
use crate::MemberId;

/// Issuer id stored for automatic warns in the persistence mirror.
pub const AUTOMATIC_ISSUER_ID: i64 = 0;

/// Who issued a warn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarnIssuer {
    Moderator(MemberId),
    Automatic,
}

impl WarnIssuer {
    /// Sentinel-encoded id for the persistence mirror.
    pub fn as_db_id(&self) -> i64 {
        match self {
            WarnIssuer::Moderator(id) => *id,
            WarnIssuer::Automatic => AUTOMATIC_ISSUER_ID,
        }
    }

    pub fn from_db_id(id: i64) -> Self {
        if id == AUTOMATIC_ISSUER_ID {
            WarnIssuer::Automatic
        } else {
            WarnIssuer::Moderator(id)
        }
    }
}

/// Immutable warn record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarnRecord {
    /// Monotonic ledger id.
    pub warn_id: u64,
    pub subject: MemberId,
    pub issuer: WarnIssuer,
    pub reason: String,
    pub issued_at: DateTime<Utc>,
}

/// Append-only warn history.
pub struct WarnLedger {
    next_id: AtomicU64,
    records: RwLock<Vec<WarnRecord>>,
    db: Option<Arc<DatabasePool>>,
}

impl WarnLedger {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            records: RwLock::new(Vec::new()),
            db: None,
        }
    }

    pub fn with_database(mut self, db: Arc<DatabasePool>) -> Self {
        self.db = Some(db);
        self
    }

    /// Load the persisted history into memory. Called once at startup.
    pub async fn hydrate(&self) -> Result<usize, EngineError> {
        let Some(ref db) = self.db else {
            return Ok(0);
        };

        let persisted = db.warns().all().await.map_err(EngineError::store)?;
        let count = persisted.len();
        let max_id = persisted.iter().map(|r| r.warn_id).max().unwrap_or(0);

        {
            let mut records = self.records.write().await;
            *records = persisted;
        }
        self.next_id.store(max_id + 1, Ordering::SeqCst);

        info!(warns = count, "Hydrated warn ledger");
        Ok(count)
    }

    /// Append one record and return its monotonic id.
    pub async fn append(
        &self,
        subject: MemberId,
        issuer: WarnIssuer,
        reason: &str,
    ) -> Result<u64, EngineError> {
        let record = WarnRecord {
            warn_id: self.next_id.fetch_add(1, Ordering::SeqCst),
            subject,
            issuer,
            reason: if reason.is_empty() {
                "No reason given".to_string()
            } else {
                reason.to_string()
            },
            issued_at: Utc::now(),
        };

        if let Some(ref db) = self.db {
            db.warns()
                .insert(&record)
                .await
                .map_err(EngineError::store)?;
        }

        let warn_id = record.warn_id;
        {
            let mut records = self.records.write().await;
            records.push(record);
        }

        debug!(subject, warn_id, "Appended warn record");
        Ok(warn_id)
    }

    /// Total warns ever recorded against a member.
    pub async fn count_for(&self, member: MemberId) -> u64 {
        let records = self.records.read().await;
        records.iter().filter(|r| r.subject == member).count() as u64
    }

    /// Full history for a member, oldest first.
    pub async fn records_for(&self, member: MemberId) -> Vec<WarnRecord> {
        let records = self.records.read().await;
        records
            .iter()
            .filter(|r| r.subject == member)
            .cloned()
            .collect()
    }
}

impl Default for WarnLedger {
    fn default() -> Self {
        Self::new()
    }
}
