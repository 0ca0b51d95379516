//! Database connection pool using sqlx

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::database::faq::FaqRepository;
use crate::database::members::MemberRepository;
use crate::database::warns::WarnRepository;

pub struct DatabasePool {
    pool: PgPool,
    members: MemberRepository,
    warns: WarnRepository,
    faqs: FaqRepository,
}

impl DatabasePool {
    pub async fn new(connection_string: &str) -> Result<Self, String> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(connection_string)
            .await
            .map_err(|e| format!("Failed to connect to PostgreSQL: {}", e))?;

        info!("Connected to PostgreSQL");

        let members = MemberRepository::new(pool.clone());
        let warns = WarnRepository::new(pool.clone());
        let faqs = FaqRepository::new(pool.clone());

        Ok(Self {
            pool,
            members,
            warns,
            faqs,
        })
    }

    pub async fn init_schema(&self) -> Result<(), String> {
        info!("Initializing database schema...");

        self.members.init_schema().await?;
        self.warns.init_schema().await?;
        self.faqs.init_schema().await?;

        info!("Database schema initialized");
        Ok(())
    }

    pub fn members(&self) -> &MemberRepository {
        &self.members
    }

    pub fn warns(&self) -> &WarnRepository {
        &self.warns
    }

    pub fn faqs(&self) -> &FaqRepository {
        &self.faqs
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
