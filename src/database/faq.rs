//! FAQ repository - keyword/answer persistence for the auto-reply store

use sqlx::postgres::PgPool;
use sqlx::Row;
use std::collections::HashMap;
use tracing::info;

pub struct FaqRepository {
    pool: PgPool,
}

impl FaqRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<(), String> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS faqs (
                keyword TEXT PRIMARY KEY,
                answer TEXT NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to create faqs table: {}", e))?;

        info!("FAQ schema initialized");
        Ok(())
    }

    pub async fn upsert(&self, keyword: &str, answer: &str) -> Result<(), String> {
        sqlx::query(
            r#"
            INSERT INTO faqs (keyword, answer)
            VALUES ($1, $2)
            ON CONFLICT (keyword) DO UPDATE SET answer = EXCLUDED.answer
        "#,
        )
        .bind(keyword)
        .bind(answer)
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to upsert faq: {}", e))?;

        Ok(())
    }

    pub async fn delete(&self, keyword: &str) -> Result<bool, String> {
        let result = sqlx::query("DELETE FROM faqs WHERE keyword = $1")
            .bind(keyword)
            .execute(&self.pool)
            .await
            .map_err(|e| format!("Failed to delete faq: {}", e))?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn all(&self) -> Result<HashMap<String, String>, String> {
        let rows = sqlx::query("SELECT keyword, answer FROM faqs")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| format!("Failed to load faqs: {}", e))?;

        Ok(rows
            .iter()
            .map(|row| (row.get("keyword"), row.get("answer")))
            .collect())
    }
}
