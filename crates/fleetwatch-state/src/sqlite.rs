use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleetwatch_core::{
    format_alert_timestamp, AlertRecord, AlertStateStore, InstanceId, Result, WatchError,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use tracing::{debug, info};

fn persist_err(e: sqlx::Error) -> WatchError {
    WatchError::Persist(e.to_string())
}

/// SQLite 状态存储
pub struct SqliteStateStore {
    pool: SqlitePool,
}

impl SqliteStateStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        Self::connect(options).await
    }

    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new().in_memory(true);
        Self::connect(options).await
    }

    async fn connect(options: SqliteConnectOptions) -> Result<Self> {
        // 单连接：内存库每个连接相互独立，且周期内本就是顺序访问
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(persist_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS instance_alert_state (
                instance_id TEXT PRIMARY KEY NOT NULL,
                last_alert_time TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(persist_err)?;

        info!("SQLite alert state store initialized");
        Ok(Self { pool })
    }
}

#[async_trait]
impl AlertStateStore for SqliteStateStore {
    async fn get(&self, instance_id: &InstanceId) -> Result<Option<AlertRecord>> {
        let row = sqlx::query(
            "SELECT last_alert_time FROM instance_alert_state WHERE instance_id = ?",
        )
        .bind(instance_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(persist_err)?;

        Ok(row.map(|row| {
            let value: String = row.get("last_alert_time");
            AlertRecord::new(instance_id.clone(), value)
        }))
    }

    async fn put(&self, instance_id: &InstanceId, time: DateTime<Utc>) -> Result<()> {
        let value = format_alert_timestamp(time);
        sqlx::query(
            r#"
            INSERT INTO instance_alert_state (instance_id, last_alert_time)
            VALUES (?, ?)
            ON CONFLICT(instance_id) DO UPDATE SET last_alert_time = excluded.last_alert_time
            "#,
        )
        .bind(instance_id.as_str())
        .bind(value.as_str())
        .execute(&self.pool)
        .await
        .map_err(persist_err)?;

        debug!(instance_id = %instance_id, last_alert_time = %value, "Alert state persisted");
        Ok(())
    }
}
