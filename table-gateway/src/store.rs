//! Database access.
//!
//! [`TableStore`] is the only seam between request handling and PostgreSQL.
//! [`PgTableStore`] runs statements on a lazily-connecting pool; every
//! statement auto-commits on its own except [`TableStore::execute_batch`],
//! which wraps its statements in one transaction.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPoolOptions};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};

use common::config::AppConfig;
use common::errors::{AppError, AppResult};
use common::models::Record;
use common::utils::Statement;

/// Executes assembled statements.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Runs a row-returning statement and decodes its `record` column.
    async fn fetch_records(&self, stmt: &Statement) -> AppResult<Vec<Record>>;

    /// Runs a statement for its side effect, returning affected rows.
    async fn execute(&self, stmt: &Statement) -> AppResult<u64>;

    /// Runs statements in order inside a single transaction.
    async fn execute_batch(&self, stmts: &[Statement]) -> AppResult<()>;

    /// Round-trips a trivial query.
    async fn ping(&self) -> AppResult<()>;
}

/// PostgreSQL-backed store.
pub struct PgTableStore {
    pool: PgPool,
}

impl PgTableStore {
    /// Creates the pool without connecting; connections open on first use.
    pub fn new(config: &AppConfig) -> Self {
        let db = &config.database;
        let options = PgConnectOptions::new()
            .host(&db.host)
            .port(db.port)
            .database(&db.name)
            .username(&db.user)
            .password(&db.password);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect_lazy_with(options);

        tracing::info!(
            host = %db.host,
            port = db.port,
            database = %db.name,
            max_connections = config.max_connections,
            "Database pool configured"
        );
        Self { pool }
    }
}

#[async_trait]
impl TableStore for PgTableStore {
    async fn fetch_records(&self, stmt: &Statement) -> AppResult<Vec<Record>> {
        tracing::debug!(sql = %stmt.sql, binds = stmt.binds.len(), "Fetching records");
        let rows = build_query(stmt)?
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.iter()
            .map(|row| {
                let value: Value = row.try_get("record").map_err(map_sqlx_error)?;
                match value {
                    Value::Object(record) => Ok(record),
                    other => Err(AppError::Internal(format!(
                        "expected a JSON object row, got {other}"
                    ))),
                }
            })
            .collect()
    }

    async fn execute(&self, stmt: &Statement) -> AppResult<u64> {
        tracing::debug!(sql = %stmt.sql, binds = stmt.binds.len(), "Executing statement");
        let result = build_query(stmt)?
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn execute_batch(&self, stmts: &[Statement]) -> AppResult<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        for stmt in stmts {
            tracing::debug!(sql = %stmt.sql, "Executing batch statement");
            build_query(stmt)?
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }
        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

fn build_query(stmt: &Statement) -> AppResult<Query<'_, Postgres, PgArguments>> {
    stmt.binds
        .iter()
        // Dynamic SQL: keep it out of the per-connection statement cache.
        .try_fold(sqlx::query(&stmt.sql).persistent(false), bind_value)
}

/// Binds a JSON value. Caller records arrive as one JSONB object and are
/// typed by PostgreSQL; scalars only come from the gateway itself.
fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &Value,
) -> AppResult<Query<'q, Postgres, PgArguments>> {
    Ok(match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match (n.as_i64(), n.as_u64()) {
            (Some(i), _) => query.bind(i),
            (None, Some(_)) => {
                return Err(AppError::Validation(format!(
                    "Integer {n} does not fit in a BIGINT parameter"
                )))
            }
            (None, None) => query.bind(n.as_f64()),
        },
        Value::String(s) => query.bind(s.clone()),
        Value::Object(_) | Value::Array(_) => query.bind(value.clone()),
    })
}

/// Keeps the database's own message for statement failures.
fn map_sqlx_error(e: sqlx::Error) -> AppError {
    match e {
        sqlx::Error::Database(db_err) => AppError::DatabaseQuery(db_err.message().to_string()),
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Configuration(_) => AppError::DatabaseConnection(e.to_string()),
        other => AppError::DatabaseQuery(other.to_string()),
    }
}
