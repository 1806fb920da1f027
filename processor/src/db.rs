use crate::errors::Result;
use crate::metrics::DB_FAILURES_TOTAL;
use crate::model::EventRow;
use crate::params::DatabaseSettings;
use crate::store::RelationalStore;
use async_trait::async_trait;
use sqlx::mysql::{MySql, MySqlConnectOptions, MySqlConnection, MySqlPool, MySqlPoolOptions};
use sqlx::{Connection, Executor};
use std::time::Duration;
use tracing::{error, info, warn};

pub fn connect_options(settings: &DatabaseSettings) -> MySqlConnectOptions {
    MySqlConnectOptions::new()
        .host(&settings.host)
        .port(settings.port)
        .username(&settings.username)
        .password(&settings.password)
        .database(&settings.database)
}

/// Pool for long-running readers (the dashboard).
pub async fn make_pool(settings: &DatabaseSettings) -> Result<MySqlPool> {
    info!(host = %settings.host, database = %settings.database, "Connecting to database...");
    let pool = MySqlPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(connect_options(settings))
        .await?;

    ensure_table(&pool, &settings.table).await?;
    info!("Database connection established");

    Ok(pool)
}

/// `table` must already have passed `params::validate_identifier`.
pub async fn ensure_table<'e, E>(executor: E, table: &str) -> Result<()>
where
    E: Executor<'e, Database = MySql>,
{
    let ddl = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            id BIGINT AUTO_INCREMENT PRIMARY KEY,
            device_id VARCHAR(64) NOT NULL,
            event_type VARCHAR(32) NOT NULL,
            value DOUBLE NOT NULL,
            value_celsius DOUBLE NULL,
            timestamp DATETIME NOT NULL
        )
        "#,
        table
    );
    executor.execute(ddl.as_str()).await?;
    Ok(())
}

pub fn insert_sql(table: &str) -> String {
    format!(
        "INSERT INTO {} (device_id, event_type, value, value_celsius, timestamp) VALUES (?, ?, ?, ?, ?)",
        table
    )
}

/// MySQL/MariaDB sink for processed batches. Opens one connection per batch
/// and always closes it before returning.
#[derive(Debug, Clone, Default)]
pub struct MySqlEventStore;

impl MySqlEventStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RelationalStore for MySqlEventStore {
    async fn insert_events(&self, database: &DatabaseSettings, rows: &[EventRow]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut conn = MySqlConnection::connect_with(&connect_options(database))
            .await
            .inspect_err(|e| {
                DB_FAILURES_TOTAL.inc();
                error!("Failed to connect to database: {}", e);
            })?;

        let result = insert_in_transaction(&mut conn, &database.table, rows).await;

        if let Err(e) = conn.close().await {
            warn!("Failed to close database connection cleanly: {}", e);
        }

        result
    }
}

async fn insert_in_transaction(
    conn: &mut MySqlConnection,
    table: &str,
    rows: &[EventRow],
) -> Result<u64> {
    ensure_table(&mut *conn, table).await?;

    let sql = insert_sql(table);
    let mut tx = conn.begin().await?;

    for row in rows {
        let inserted = sqlx::query(&sql)
            .bind(&row.device_id)
            .bind(&row.event_type)
            .bind(row.value)
            .bind(row.value_celsius)
            .bind(&row.timestamp)
            .execute(&mut *tx)
            .await;

        if let Err(e) = inserted {
            // Dropping the transaction rolls back every row of this batch.
            DB_FAILURES_TOTAL.inc();
            error!(device_id = %row.device_id, "Error inserting row, batch rolled back: {}", e);
            return Err(e.into());
        }
    }

    tx.commit().await?;
    Ok(rows.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_sql_columns() {
        let sql = insert_sql("iot_events");
        assert!(sql.starts_with("INSERT INTO iot_events (device_id, event_type, value, value_celsius, timestamp)"));
        assert_eq!(sql.matches('?').count(), 5);
    }

    #[tokio::test]
    async fn test_empty_batch_skips_connection() {
        let settings = DatabaseSettings {
            host: "unreachable.invalid".to_string(),
            port: 3306,
            username: "u".to_string(),
            password: "p".to_string(),
            database: "d".to_string(),
            table: "t".to_string(),
        };
        assert_eq!(MySqlEventStore::new().insert_events(&settings, &[]).await.unwrap(), 0);
    }
}
