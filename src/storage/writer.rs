use crate::error::StoreError;
use crate::types::EventRecord;
use async_trait::async_trait;
use chrono::{NaiveDateTime, SubsecRound};
use sqlx::types::Json;
use sqlx::PgPool;

/// Durable destination for event records.
#[async_trait]
pub trait EventStore: Send + Sync + 'static {
    /// Persist one record, stamped with the current time.
    async fn insert(&self, record: &EventRecord) -> Result<(), StoreError>;

    /// Whether the backend is reachable.
    async fn ping(&self) -> bool;
}

/// Row timestamp: UTC write time at whole-second precision.
pub fn write_timestamp() -> NaiveDateTime {
    chrono::Utc::now().naive_utc().trunc_subsecs(0)
}

/// PostgreSQL-backed store. All values are bound as parameters.
#[derive(Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn insert(&self, record: &EventRecord) -> Result<(), StoreError> {
        let data = serde_json::to_value(&record.document)?;

        sqlx::query("INSERT INTO analytics (time, user_id, data) VALUES ($1, $2, $3)")
            .bind(write_timestamp())
            .bind(&record.user_id)
            .bind(Json(data))
            .execute(&self.pool)
            .await?;

        tracing::debug!(user_id = %record.user_id, "event persisted");
        Ok(())
    }

    async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}
