//! SQL statement builder.
//!
//! Turns table operations into PostgreSQL statements. Table names come from
//! the allow-list, column names pass [`SqlBuilder::validate_identifier`], and
//! caller values travel as one JSONB parameter that PostgreSQL expands with
//! `jsonb_populate_record` against the table's own row type. Each value is
//! therefore parsed by its column's input function: text stays byte-exact,
//! and strings reach integer, numeric and timestamp columns as typed values.
//! Statements that return rows are wrapped so each row comes back as one JSON
//! object column named `record`.

use chrono::NaiveDateTime;
use serde_json::Value;

use crate::errors::{AppError, AppResult};
use crate::models::table::{FilterSet, Record, TableName};

/// Default `image_type` for `image_analysis` inserts.
pub const DEFAULT_IMAGE_TYPE: &str = "surgical_frame";

/// Longest identifier PostgreSQL keeps without truncation.
const MAX_IDENTIFIER_LEN: usize = 63;

/// Format used when the gateway supplies a timestamp itself.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

const CHAT_HISTORY_COLUMNS: [&str; 4] = ["session_id", "patient_id", "prompt", "response"];
const IMAGE_ANALYSIS_COLUMNS: [&str; 4] =
    ["patient_id", "image_type", "segmented_image_url", "description"];

/// An assembled statement with its positional bind values.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub binds: Vec<Value>,
    /// Whether the statement yields `record` rows.
    pub returns_rows: bool,
}

impl Statement {
    /// A row-returning statement with no parameters.
    pub fn query(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            binds: Vec::new(),
            returns_rows: true,
        }
    }
}

/// Accumulates bind values and hands out `$n` placeholders.
#[derive(Default)]
struct Binds(Vec<Value>);

impl Binds {
    fn placeholder(&mut self, value: Value) -> String {
        self.0.push(value);
        format!("${}", self.0.len())
    }

    /// Equality predicate for `column`, compared in the column's own type.
    fn equals(&mut self, table: TableName, column: &str, value: &Value) -> String {
        if value.is_null() {
            return format!("{column} IS NULL");
        }
        let mut single = Record::new();
        single.insert(column.to_string(), value.clone());
        let placeholder = self.placeholder(Value::Object(single));
        format!("{column} = ({}).{column}", populated(table, &placeholder))
    }
}

/// Builds the statements behind every gateway operation.
pub struct SqlBuilder;

impl SqlBuilder {
    /// Checks that a caller-supplied column name is safe to interpolate.
    ///
    /// # Errors
    /// Returns `AppError::Validation` unless the name is 1-63 ASCII letters,
    /// digits or underscores and does not start with a digit.
    pub fn validate_identifier(identifier: &str) -> AppResult<()> {
        let mut chars = identifier.chars();
        let starts_ok = chars
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false);
        if !starts_ok
            || identifier.len() > MAX_IDENTIFIER_LEN
            || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(AppError::Validation(format!(
                "Invalid column name: {identifier:?}"
            )));
        }
        Ok(())
    }

    /// `SELECT *` over the whole table.
    pub fn select_all(table: TableName) -> Statement {
        Statement::query(format!(
            "SELECT row_to_json(t) AS record FROM {table} t"
        ))
    }

    /// INSERT for `record` into `table`.
    ///
    /// `chat_history` and `image_analysis` use fixed column lists and return
    /// their generated id. Every other table takes its column list from the
    /// record keys in order and returns nothing.
    ///
    /// # Errors
    /// Returns `AppError::Validation` for an empty record or a bad column name.
    pub fn insert(table: TableName, record: &Record, now: NaiveDateTime) -> AppResult<Statement> {
        if record.is_empty() {
            return Err(AppError::Validation("No data provided".into()));
        }
        let now = Value::String(now.format(TIMESTAMP_FORMAT).to_string());

        match table {
            TableName::ChatHistory => {
                let mut row: Record = CHAT_HISTORY_COLUMNS
                    .iter()
                    .map(|c| (c.to_string(), field(record, c)))
                    .collect();
                let timestamp = match field(record, "timestamp") {
                    Value::Null => now,
                    supplied => supplied,
                };
                row.insert("timestamp".into(), timestamp);
                Ok(Self::populate_insert(table, row, Some("chat_id")))
            }
            TableName::ImageAnalysis => {
                let mut row: Record = IMAGE_ANALYSIS_COLUMNS
                    .iter()
                    .map(|c| {
                        let value = match (*c, field(record, c)) {
                            ("image_type", Value::Null) => Value::String(DEFAULT_IMAGE_TYPE.into()),
                            (_, v) => v,
                        };
                        (c.to_string(), value)
                    })
                    .collect();
                row.insert("timestamp".into(), now);
                Ok(Self::populate_insert(table, row, Some("analysis_id")))
            }
            _ => {
                for column in record.keys() {
                    Self::validate_identifier(column)?;
                }
                Ok(Self::populate_insert(table, record.clone(), None))
            }
        }
    }

    /// `INSERT ... SELECT` of the record's keys, in order, from the row
    /// PostgreSQL builds out of the record.
    fn populate_insert(table: TableName, row: Record, returning: Option<&str>) -> Statement {
        let columns: Vec<&str> = row.keys().map(String::as_str).collect();
        let selected: Vec<String> = columns.iter().map(|c| format!("r.{c}")).collect();
        let insert = format!(
            "INSERT INTO {table} ({}) SELECT {} FROM {} r",
            columns.join(", "),
            selected.join(", "),
            populated(table, "$1")
        );
        let binds = vec![Value::Object(row)];
        match returning {
            Some(id) => Statement {
                sql: as_records(&format!("{insert} RETURNING {id}")),
                binds,
                returns_rows: true,
            },
            None => Statement {
                sql: insert,
                binds,
                returns_rows: false,
            },
        }
    }

    /// DELETE of every row matching all `filters`, returning the deleted rows.
    ///
    /// # Errors
    /// Returns `AppError::Validation` for an empty filter set or a bad column
    /// name. An empty filter set would otherwise clear the table.
    pub fn delete_where(table: TableName, filters: &FilterSet) -> AppResult<Statement> {
        if filters.is_empty() {
            return Err(AppError::Validation(
                "No filters provided; refusing to delete every row".into(),
            ));
        }
        let mut binds = Binds::default();
        let mut predicates = Vec::with_capacity(filters.len());
        for (column, value) in filters.iter() {
            Self::validate_identifier(column)?;
            predicates.push(binds.equals(table, column, value));
        }
        Ok(Statement {
            sql: as_records(&format!(
                "DELETE FROM {table} WHERE {} RETURNING *",
                predicates.join(" AND ")
            )),
            binds: binds.0,
            returns_rows: true,
        })
    }

    /// DELETE of a single chat message by `chat_id`.
    pub fn delete_chat_by_id(chat_id: i64) -> Statement {
        Statement {
            sql: as_records(&format!(
                "DELETE FROM {} WHERE chat_id = $1 RETURNING *",
                TableName::ChatHistory
            )),
            binds: vec![Value::from(chat_id)],
            returns_rows: true,
        }
    }

    /// DELETE of every chat message in a session, returning their ids.
    pub fn delete_chat_by_session(session_id: &str) -> Statement {
        Statement {
            sql: as_records(&format!(
                "DELETE FROM {} WHERE session_id = $1::text RETURNING chat_id",
                TableName::ChatHistory
            )),
            binds: vec![Value::String(session_id.to_string())],
            returns_rows: true,
        }
    }
}

fn field(record: &Record, column: &str) -> Value {
    record.get(column).cloned().unwrap_or(Value::Null)
}

/// A row of `table` built from the JSONB object bound at `placeholder`.
fn populated(table: TableName, placeholder: &str) -> String {
    format!("jsonb_populate_record(NULL::{table}, {placeholder})")
}

/// Wraps a data-modifying statement so its RETURNING rows come back as JSON.
fn as_records(statement: &str) -> String {
    format!("WITH affected AS ({statement}) SELECT row_to_json(affected) AS record FROM affected")
}
