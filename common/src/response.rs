//! Response bodies for the table endpoints.

use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::models::table::Record;

/// Body of `GET /table/{name}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct TableListing {
    /// Table that was read.
    pub table: String,
    /// Number of records returned.
    pub count: usize,
    /// Every row, columns in table order.
    #[schema(value_type = Vec<Object>)]
    pub data: Vec<Record>,
}

impl TableListing {
    pub fn new(table: impl Into<String>, data: Vec<Record>) -> Self {
        Self {
            table: table.into(),
            count: data.len(),
            data,
        }
    }
}

/// Body of `POST /table/{name}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct InsertResponse {
    pub message: String,
    /// Row returned by the insert (the generated id), or null.
    #[schema(value_type = Option<Object>)]
    pub result: Option<Record>,
}

/// Body of `DELETE /table/{name}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteResponse {
    pub message: String,
    pub deleted_count: usize,
    #[schema(value_type = Vec<Object>)]
    pub deleted_records: Vec<Record>,
}

impl DeleteResponse {
    pub fn new(table: &str, deleted_records: Vec<Record>) -> Self {
        Self {
            message: format!("Deleted {} record(s) from {}", deleted_records.len(), table),
            deleted_count: deleted_records.len(),
            deleted_records,
        }
    }
}

/// Body of `DELETE /table/chat_history/{id}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct DeletedRecordResponse {
    pub message: String,
    #[schema(value_type = Object)]
    pub deleted_record: Record,
}

/// Body of `DELETE /table/chat_history/session/{session_id}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionDeleteResponse {
    pub message: String,
    pub deleted_count: usize,
    /// Ids as returned by the database.
    #[schema(value_type = Vec<Object>)]
    pub deleted_chat_ids: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_listing_counts_rows() {
        let rows = vec![
            json!({"id": 1}).as_object().cloned().unwrap(),
            json!({"id": 2}).as_object().cloned().unwrap(),
        ];
        let body = serde_json::to_value(TableListing::new("vitals", rows)).unwrap();
        assert_eq!(body["table"], "vitals");
        assert_eq!(body["count"], 2);
        assert_eq!(body["data"][1]["id"], 2);
    }

    #[test]
    fn test_empty_delete_serializes_empty_list() {
        let body = serde_json::to_value(DeleteResponse::new("vitals", vec![])).unwrap();
        assert_eq!(body["deleted_count"], 0);
        assert_eq!(body["deleted_records"], json!([]));
    }

    #[test]
    fn test_insert_without_result_is_null() {
        let body = serde_json::to_value(InsertResponse {
            message: "Record inserted into vitals".into(),
            result: None,
        })
        .unwrap();
        assert!(body["result"].is_null());
    }
}
