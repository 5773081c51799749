//! Schema administration.
//!
//! One-shot utilities outside the steady-state data path: recreate the
//! `chat_history` table with its indexes, and report column definitions and
//! row counts for the two tables the gateway writes with fixed column lists.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use common::errors::{AppError, AppResult};
use common::models::{Record, TableName};
use common::utils::Statement;

use crate::store::TableStore;

/// Tables covered by the schema report.
pub const VERIFIED_TABLES: [TableName; 2] = [TableName::ChatHistory, TableName::ImageAnalysis];

const DROP_CHAT_HISTORY: &str = "DROP TABLE IF EXISTS chat_history CASCADE";

const CREATE_CHAT_HISTORY: &str = "CREATE TABLE chat_history (
    chat_id     SERIAL       PRIMARY KEY,
    session_id  VARCHAR(255) NOT NULL,
    patient_id  VARCHAR(255),
    prompt      TEXT         NOT NULL,
    response    TEXT,
    timestamp   TIMESTAMP    NOT NULL DEFAULT CURRENT_TIMESTAMP
)";

const CHAT_HISTORY_INDEXES: [&str; 3] = [
    "CREATE INDEX idx_chat_history_session_id ON chat_history (session_id)",
    "CREATE INDEX idx_chat_history_patient_id ON chat_history (patient_id)",
    "CREATE INDEX idx_chat_history_timestamp ON chat_history (timestamp)",
];

/// One column as reported by `information_schema.columns`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ColumnDefinition {
    pub column_name: String,
    pub data_type: String,
    /// "YES" or "NO".
    pub is_nullable: String,
    pub column_default: Option<String>,
    pub character_maximum_length: Option<i64>,
}

/// Body of `POST /admin/migrate_database`.
#[derive(Debug, Serialize, ToSchema)]
pub struct MigrationReport {
    pub message: String,
    pub table: String,
    pub columns: Vec<ColumnDefinition>,
    pub indexes: Vec<String>,
}

/// Schema and size of one table.
#[derive(Debug, Serialize, ToSchema)]
pub struct TableReport {
    pub table: String,
    pub exists: bool,
    /// Absent when the table does not exist.
    pub row_count: Option<i64>,
    pub columns: Vec<ColumnDefinition>,
}

/// Body of `GET /admin/verify_schema`.
#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyReport {
    pub tables: Vec<TableReport>,
}

/// Runs schema administration statements through a [`TableStore`].
pub struct SchemaAdmin {
    store: Arc<dyn TableStore>,
}

impl SchemaAdmin {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }

    /// Drops and recreates `chat_history` and its indexes in one transaction.
    ///
    /// Existing chat history is lost.
    pub async fn migrate_chat_history(&self) -> AppResult<MigrationReport> {
        let mut script = vec![
            Statement::query(DROP_CHAT_HISTORY),
            Statement::query(CREATE_CHAT_HISTORY),
        ];
        script.extend(CHAT_HISTORY_INDEXES.iter().map(|sql| Statement::query(*sql)));
        self.store.execute_batch(&script).await?;
        tracing::warn!(table = %TableName::ChatHistory, "Table dropped and recreated");

        let table = TableName::ChatHistory;
        Ok(MigrationReport {
            message: format!("Table {table} recreated"),
            table: table.to_string(),
            columns: self.columns(table).await?,
            indexes: self.indexes(table).await?,
        })
    }

    /// Reports columns and row counts for [`VERIFIED_TABLES`].
    pub async fn verify(&self) -> AppResult<VerifyReport> {
        let mut tables = Vec::with_capacity(VERIFIED_TABLES.len());
        for table in VERIFIED_TABLES {
            let columns = self.columns(table).await?;
            let exists = !columns.is_empty();
            let row_count = if exists {
                Some(self.row_count(table).await?)
            } else {
                None
            };
            tables.push(TableReport {
                table: table.to_string(),
                exists,
                row_count,
                columns,
            });
        }
        Ok(VerifyReport { tables })
    }

    async fn columns(&self, table: TableName) -> AppResult<Vec<ColumnDefinition>> {
        let stmt = Statement {
            sql: "SELECT row_to_json(c) AS record FROM (
                    SELECT column_name, data_type, is_nullable, column_default,
                           character_maximum_length
                    FROM information_schema.columns
                    WHERE table_schema = current_schema() AND table_name = $1
                    ORDER BY ordinal_position
                 ) c"
                .to_string(),
            binds: vec![Value::String(table.to_string())],
            returns_rows: true,
        };
        self.store
            .fetch_records(&stmt)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    async fn indexes(&self, table: TableName) -> AppResult<Vec<String>> {
        let stmt = Statement {
            sql: "SELECT json_build_object('indexname', indexname) AS record
                  FROM pg_indexes
                  WHERE schemaname = current_schema() AND tablename = $1
                  ORDER BY indexname"
                .to_string(),
            binds: vec![Value::String(table.to_string())],
            returns_rows: true,
        };
        Ok(self
            .store
            .fetch_records(&stmt)
            .await?
            .into_iter()
            .filter_map(|mut r| match r.remove("indexname") {
                Some(Value::String(name)) => Some(name),
                _ => None,
            })
            .collect())
    }

    async fn row_count(&self, table: TableName) -> AppResult<i64> {
        let stmt = Statement::query(format!(
            "SELECT json_build_object('row_count', COUNT(*)) AS record FROM {table}"
        ));
        let rows = self.store.fetch_records(&stmt).await?;
        rows.first()
            .and_then(|r| r.get("row_count"))
            .and_then(Value::as_i64)
            .ok_or_else(|| AppError::Internal(format!("no row count returned for {table}")))
    }
}

fn decode(record: Record) -> AppResult<ColumnDefinition> {
    serde_json::from_value(Value::Object(record))
        .map_err(|e| AppError::Internal(format!("unexpected column definition: {e}")))
}
