//! FAQ keyword/answer store
//!
//! Process-scoped map with an explicit lifecycle: hydrated from the
//! repository at startup, mutated through `add`/`remove`, and read by the
//! auto-reply glue. The whole map round-trips through JSON for export and
//! seeding.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::database::DatabasePool;
use crate::error::EngineError;

pub struct FaqStore {
    entries: RwLock<HashMap<String, String>>,
    db: Option<Arc<DatabasePool>>,
}

impl FaqStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            db: None,
        }
    }

    pub fn with_database(mut self, db: Arc<DatabasePool>) -> Self {
        self.db = Some(db);
        self
    }

    /// Load persisted entries. Called once at startup.
    pub async fn hydrate(&self) -> Result<usize, EngineError> {
        let Some(ref db) = self.db else {
            return Ok(0);
        };

        let persisted = db.faqs().all().await.map_err(EngineError::store)?;
        let count = persisted.len();
        {
            let mut entries = self.entries.write().await;
            *entries = persisted;
        }

        info!(faqs = count, "Hydrated FAQ store");
        Ok(count)
    }

    pub async fn add(&self, keyword: &str, answer: &str) -> Result<(), EngineError> {
        let keyword = keyword.to_lowercase();

        if let Some(ref db) = self.db {
            db.faqs()
                .upsert(&keyword, answer)
                .await
                .map_err(EngineError::store)?;
        }

        let mut entries = self.entries.write().await;
        entries.insert(keyword, answer.to_string());
        Ok(())
    }

    pub async fn remove(&self, keyword: &str) -> Result<bool, EngineError> {
        let keyword = keyword.to_lowercase();

        if let Some(ref db) = self.db {
            db.faqs()
                .delete(&keyword)
                .await
                .map_err(EngineError::store)?;
        }

        let mut entries = self.entries.write().await;
        Ok(entries.remove(&keyword).is_some())
    }

    /// Exact keyword lookup used by the auto-reply glue.
    pub async fn lookup(&self, query: &str) -> Option<String> {
        let entries = self.entries.read().await;
        entries.get(&query.to_lowercase()).cloned()
    }

    pub async fn keywords(&self) -> Vec<String> {
        let entries = self.entries.read().await;
        let mut keywords: Vec<String> = entries.keys().cloned().collect();
        keywords.sort();
        keywords
    }

    /// Export the full map as JSON.
    pub async fn to_json(&self) -> Value {
        let entries = self.entries.read().await;
        serde_json::to_value(&*entries).unwrap_or(Value::Null)
    }

    /// Replace the map from a JSON export. Rejects non-object payloads.
    pub async fn load_json(&self, value: Value) -> Result<usize, EngineError> {
        let parsed: HashMap<String, String> = serde_json::from_value(value)
            .map_err(|e| EngineError::StoreUnavailable(format!("invalid FAQ payload: {}", e)))?;

        let count = parsed.len();
        let mut entries = self.entries.write().await;
        *entries = parsed;
        Ok(count)
    }
}

impl Default for FaqStore {
    fn default() -> Self {
        Self::new()
    }
}
