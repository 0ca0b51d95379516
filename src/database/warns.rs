//! Warn repository - append-only persistence for the warn ledger
//!
//! No UPDATE or DELETE statement exists here; the table mirrors the
//! ledger's append-only contract.

use sqlx::postgres::PgPool;
use sqlx::Row;
use tracing::info;

use crate::warns::{WarnIssuer, WarnRecord};
use crate::MemberId;

pub struct WarnRepository {
    pool: PgPool,
}

impl WarnRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<(), String> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS warns (
                warn_id BIGINT PRIMARY KEY,
                subject_id BIGINT NOT NULL,
                issuer_id BIGINT NOT NULL,
                reason TEXT NOT NULL,
                issued_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )
        "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to create warns table: {}", e))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_warns_subject ON warns(subject_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| format!("Failed to create warns index: {}", e))?;

        info!("Warn schema initialized");
        Ok(())
    }

    pub async fn insert(&self, record: &WarnRecord) -> Result<(), String> {
        sqlx::query(
            r#"
            INSERT INTO warns (warn_id, subject_id, issuer_id, reason, issued_at)
            VALUES ($1, $2, $3, $4, $5)
        "#,
        )
        .bind(record.warn_id as i64)
        .bind(record.subject)
        .bind(record.issuer.as_db_id())
        .bind(&record.reason)
        .bind(record.issued_at)
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to insert warn: {}", e))?;

        Ok(())
    }

    pub async fn count_for(&self, member: MemberId) -> Result<u64, String> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM warns WHERE subject_id = $1")
            .bind(member)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| format!("Failed to count warns: {}", e))?;

        let count: i64 = row.get("count");
        Ok(count as u64)
    }

    pub async fn all(&self) -> Result<Vec<WarnRecord>, String> {
        let rows = sqlx::query(
            r#"
            SELECT warn_id, subject_id, issuer_id, reason, issued_at
            FROM warns
            ORDER BY warn_id
        "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| format!("Failed to load warns: {}", e))?;

        Ok(rows
            .iter()
            .map(|row| {
                let warn_id: i64 = row.get("warn_id");
                let issuer_id: i64 = row.get("issuer_id");
                WarnRecord {
                    warn_id: warn_id as u64,
                    subject: row.get("subject_id"),
                    issuer: WarnIssuer::from_db_id(issuer_id),
                    reason: row.get("reason"),
                    issued_at: row.get("issued_at"),
                }
            })
            .collect())
    }
}
