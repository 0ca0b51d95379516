//! Member repository - persistence for reputation and activity counters

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::Row;
use tracing::{debug, info};

use crate::reputation::{ActivityCounter, MemberRecord};
use crate::MemberId;

pub struct MemberRepository {
    pool: PgPool,
}

impl MemberRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<(), String> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS members (
                member_id BIGINT PRIMARY KEY,
                reputation DOUBLE PRECISION NOT NULL DEFAULT 50.0,
                messages_sent BIGINT NOT NULL DEFAULT 0,
                tickets_opened BIGINT NOT NULL DEFAULT 0,
                joined_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
                last_active TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )
        "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to create members table: {}", e))?;

        info!("Member schema initialized");
        Ok(())
    }

    pub async fn get(&self, member: MemberId) -> Result<Option<MemberRecord>, String> {
        let row = sqlx::query(
            r#"
            SELECT member_id, reputation, messages_sent, tickets_opened, joined_at, last_active
            FROM members
            WHERE member_id = $1
        "#,
        )
        .bind(member)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| format!("Failed to get member: {}", e))?;

        Ok(row.map(|row| Self::record_from_row(&row)))
    }

    pub async fn all(&self) -> Result<Vec<MemberRecord>, String> {
        let rows = sqlx::query(
            r#"
            SELECT member_id, reputation, messages_sent, tickets_opened, joined_at, last_active
            FROM members
        "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| format!("Failed to load members: {}", e))?;

        Ok(rows.iter().map(Self::record_from_row).collect())
    }

    pub async fn upsert(&self, record: &MemberRecord) -> Result<(), String> {
        sqlx::query(
            r#"
            INSERT INTO members (member_id, reputation, messages_sent, tickets_opened, joined_at, last_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (member_id) DO UPDATE SET
                reputation = EXCLUDED.reputation,
                messages_sent = EXCLUDED.messages_sent,
                tickets_opened = EXCLUDED.tickets_opened,
                last_active = EXCLUDED.last_active
        "#,
        )
        .bind(record.member_id)
        .bind(record.reputation)
        .bind(record.messages_sent as i64)
        .bind(record.tickets_opened as i64)
        .bind(record.joined_at)
        .bind(record.last_active)
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to upsert member: {}", e))?;

        Ok(())
    }

    /// Clamped in-database reputation adjustment, for deployments that
    /// treat the database as the accumulation point.
    pub async fn adjust(
        &self,
        member: MemberId,
        delta: f64,
        min_score: f64,
        max_score: f64,
    ) -> Result<f64, String> {
        let row = sqlx::query(
            r#"
            UPDATE members
            SET reputation = GREATEST($3, LEAST($4, reputation + $2))
            WHERE member_id = $1
            RETURNING reputation
        "#,
        )
        .bind(member)
        .bind(delta)
        .bind(min_score)
        .bind(max_score)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| format!("Failed to adjust reputation: {}", e))?;

        let reputation: f64 = row.get("reputation");
        debug!(member, delta, reputation, "Adjusted reputation in database");
        Ok(reputation)
    }

    /// Increment a named counter. The column is picked from the closed
    /// [`ActivityCounter`] enum, never from caller input.
    pub async fn increment(
        &self,
        member: MemberId,
        counter: ActivityCounter,
        now: DateTime<Utc>,
    ) -> Result<(), String> {
        let query = format!(
            "UPDATE members SET {col} = {col} + 1, last_active = $2 WHERE member_id = $1",
            col = counter.column()
        );

        sqlx::query(&query)
            .bind(member)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| format!("Failed to increment counter: {}", e))?;

        Ok(())
    }

    fn record_from_row(row: &sqlx::postgres::PgRow) -> MemberRecord {
        let messages_sent: i64 = row.get("messages_sent");
        let tickets_opened: i64 = row.get("tickets_opened");
        MemberRecord {
            member_id: row.get("member_id"),
            reputation: row.get("reputation"),
            messages_sent: messages_sent as u64,
            tickets_opened: tickets_opened as u64,
            joined_at: row.get("joined_at"),
            last_active: row.get("last_active"),
        }
    }
}
