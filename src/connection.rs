//! Warehouse session management
//!
//! `WarehouseClient` is the seam every tool talks through. `SqlxWarehouse`
//! implements it on a sqlx `AnyPool` that is re-established once it is older
//! than the configured session TTL.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::AnyPool;
use sqlx::pool::PoolOptions;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::ConnectionSettings;
use crate::dsn::redact_dsn;
use crate::error::GatewayError;
use crate::row_converter::row_to_json;
use crate::timeout::{RetryPolicy, execute_with_timeout};
use crate::types::Row;

/// Executes SQL against the warehouse
#[async_trait]
pub trait WarehouseClient: Send + Sync {
    /// Run `sql` and return its rows with a fresh result identifier
    async fn execute_query(&self, sql: &str) -> Result<(Vec<Row>, String), GatewayError>;

    /// Like [`execute_query`](Self::execute_query) for statements that must
    /// not be sent twice: nothing is retried once it may have reached the
    /// warehouse
    async fn execute_write(&self, sql: &str) -> Result<(Vec<Row>, String), GatewayError>;
}

struct Session {
    pool: AnyPool,
    authenticated_at: Instant,
}

/// Pool-backed warehouse client
pub struct SqlxWarehouse {
    settings: ConnectionSettings,
    retry: RetryPolicy,
    session: Mutex<Option<Session>>,
}

impl SqlxWarehouse {
    pub fn new(settings: ConnectionSettings, retry: RetryPolicy) -> Self {
        // Registers the compiled-in drivers; must run before any AnyPool is built
        sqlx::any::install_default_drivers();

        Self {
            settings,
            retry,
            session: Mutex::new(None),
        }
    }

    /// Start establishing the session in the background
    ///
    /// The first query waits on the same session lock, so it observes the
    /// result of this initialization rather than racing it.
    pub fn start_init(self: &Arc<Self>) -> JoinHandle<()> {
        let warehouse = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = warehouse.pool().await {
                log::error!("Failed to initialize warehouse session: {}", e);
            }
        })
    }

    /// Current pool, reconnecting when absent or stale
    async fn pool(&self) -> Result<AnyPool, GatewayError> {
        let mut session = self.session.lock().await;

        if let Some(existing) = session.as_ref() {
            if existing.authenticated_at.elapsed() < self.settings.session_ttl {
                return Ok(existing.pool.clone());
            }
            log::info!("Warehouse session expired, reconnecting");
            existing.pool.close().await;
        }

        let pool = self.connect().await?;
        *session = Some(Session {
            pool: pool.clone(),
            authenticated_at: Instant::now(),
        });

        Ok(pool)
    }

    async fn connect(&self) -> Result<AnyPool, GatewayError> {
        let start = Instant::now();
        let statements = Arc::new(self.settings.session_statements());

        let pool = PoolOptions::new()
            .max_connections(self.settings.max_connections)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            .max_lifetime(Some(self.settings.session_ttl).filter(|ttl| !ttl.is_zero()))
            .test_before_acquire(true)
            .after_connect(move |conn, _meta| {
                let statements = Arc::clone(&statements);
                Box::pin(async move {
                    for statement in statements.iter() {
                        sqlx::query(statement).execute(&mut *conn).await?;
                    }
                    Ok(())
                })
            })
            .connect(self.settings.dsn.expose_secret())
            .await
            .map_err(|e| {
                GatewayError::ConnectionError(format!(
                    "Failed to connect to {}: {}",
                    redact_dsn(&self.settings.dsn),
                    e
                ))
            })?;

        log::info!(
            "✓ Warehouse session established ({}, {:?})",
            redact_dsn(&self.settings.dsn),
            start.elapsed()
        );

        Ok(pool)
    }

    /// Drop the session so the next query reconnects
    async fn invalidate(&self) {
        if let Some(session) = self.session.lock().await.take() {
            session.pool.close().await;
        }
    }

    /// Close the session, if any
    pub async fn close(&self) {
        self.invalidate().await;
        log::info!("Warehouse session closed");
    }
}

impl SqlxWarehouse {
    async fn run(
        &self,
        sql: &str,
        policy: &RetryPolicy,
    ) -> Result<(Vec<Row>, String), GatewayError> {
        let pool = self.pool().await?;
        log::debug!("Executing query: {}", sql);

        let result = execute_with_timeout(
            policy,
            || {
                let pool = pool.clone();
                async move { sqlx::query(sql).fetch_all(&pool).await }
            },
            "Executing query",
        )
        .await;

        let rows = match result {
            Ok(rows) => rows,
            Err(e @ GatewayError::ConnectionError(_)) => {
                self.invalidate().await;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let rows = rows.iter().map(row_to_json).collect::<Result<Vec<_>, _>>()?;
        let data_id = uuid::Uuid::new_v4().to_string();
        log::debug!("Query returned {} rows (data_id = {})", rows.len(), data_id);

        Ok((rows, data_id))
    }
}

#[async_trait]
impl WarehouseClient for SqlxWarehouse {
    async fn execute_query(&self, sql: &str) -> Result<(Vec<Row>, String), GatewayError> {
        self.run(sql, &self.retry).await
    }

    async fn execute_write(&self, sql: &str) -> Result<(Vec<Row>, String), GatewayError> {
        self.run(sql, &self.retry.for_writes()).await
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sqlite_warehouse(ttl: Duration) -> SqlxWarehouse {
        let mut settings = ConnectionSettings::new("sqlite::memory:");
        // One connection so every query sees the same in-memory database
        settings.max_connections = 1;
        settings.session_ttl = ttl;
        SqlxWarehouse::new(settings, RetryPolicy::default())
    }

    #[tokio::test]
    async fn test_execute_query_returns_rows_and_id() {
        let warehouse = sqlite_warehouse(Duration::from_secs(1800));
        let (rows, data_id) = warehouse
            .execute_query("SELECT 1 AS one, 'x' AS label")
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["one"], json!(1));
        assert_eq!(rows[0]["label"], json!("x"));
        assert!(uuid::Uuid::parse_str(&data_id).is_ok());

        let (_, second_id) = warehouse.execute_query("SELECT 1").await.unwrap();
        assert_ne!(data_id, second_id);
    }

    #[tokio::test]
    async fn test_fresh_session_is_reused() {
        let warehouse = sqlite_warehouse(Duration::from_secs(1800));
        warehouse
            .execute_query("CREATE TABLE t (id INTEGER)")
            .await
            .unwrap();
        warehouse
            .execute_query("INSERT INTO t VALUES (1)")
            .await
            .unwrap();

        let (rows, _) = warehouse.execute_query("SELECT id FROM t").await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_execute_write_shares_the_session() {
        let warehouse = sqlite_warehouse(Duration::from_secs(1800));
        warehouse
            .execute_write("CREATE TABLE t (id INTEGER)")
            .await
            .unwrap();
        let (_, data_id) = warehouse
            .execute_write("INSERT INTO t VALUES (1)")
            .await
            .unwrap();
        assert!(uuid::Uuid::parse_str(&data_id).is_ok());

        let (rows, _) = warehouse.execute_query("SELECT id FROM t").await.unwrap();
        assert_eq!(rows[0]["id"], json!(1));
    }

    #[tokio::test]
    async fn test_stale_session_reconnects() {
        let warehouse = sqlite_warehouse(Duration::ZERO);
        warehouse
            .execute_query("CREATE TABLE t (id INTEGER)")
            .await
            .unwrap();

        // A new in-memory database no longer has the table
        assert!(warehouse.execute_query("SELECT id FROM t").await.is_err());
    }

    #[tokio::test]
    async fn test_background_init_then_query() {
        let warehouse = Arc::new(sqlite_warehouse(Duration::from_secs(1800)));
        warehouse.start_init().await.unwrap();
        assert!(warehouse.session.lock().await.is_some());
        assert!(warehouse.execute_query("SELECT 1").await.is_ok());
        warehouse.close().await;
        assert!(warehouse.session.lock().await.is_none());
    }

    #[tokio::test]
    async fn test_failing_session_statement_is_connection_error() {
        let mut settings = ConnectionSettings::new("sqlite::memory:");
        settings.warehouse = Some("COMPUTE_WH".into());
        let warehouse = SqlxWarehouse::new(settings, RetryPolicy::default());

        let err = warehouse.execute_query("SELECT 1").await.unwrap_err();
        assert!(matches!(err, GatewayError::ConnectionError(_)));
    }
}
