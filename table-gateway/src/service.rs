//! 数据表读写服务模块

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use common::errors::{AppError, AppResult};
use common::models::{FilterSet, Record, TableCatalog, TableName};
use common::response::{
    DeleteResponse, DeletedRecordResponse, InsertResponse, SessionDeleteResponse, TableListing,
};
use common::utils::SqlBuilder;

use crate::store::TableStore;

/// 医疗数据表网关服务
///
/// 每个操作先校验表名白名单，再组装语句，最多一次数据库往返。
pub struct TableService {
    store: Arc<dyn TableStore>,
    catalog: Arc<TableCatalog>,
}

impl TableService {
    /// 创建新的服务实例
    pub fn new(store: Arc<dyn TableStore>, catalog: Arc<TableCatalog>) -> Self {
        Self { store, catalog }
    }

    /// 查询整张表
    pub async fn list(&self, name: &str) -> AppResult<TableListing> {
        let table = self.catalog.resolve(name)?;
        let data = self
            .store
            .fetch_records(&SqlBuilder::select_all(table))
            .await?;
        tracing::info!(table = %table, count = data.len(), "记录已查询");
        Ok(TableListing::new(table.as_str(), data))
    }

    /// 插入一条记录
    pub async fn insert(&self, name: &str, body: &[u8]) -> AppResult<InsertResponse> {
        let table = self.catalog.resolve(name)?;
        let record = parse_record(body)?
            .filter(|r| !r.is_empty())
            .ok_or_else(|| AppError::Validation("No data provided".into()))?;

        let stmt = SqlBuilder::insert(table, &record, Utc::now().naive_utc())?;
        let result = if stmt.returns_rows {
            self.store.fetch_records(&stmt).await?.into_iter().next()
        } else {
            self.store.execute(&stmt).await?;
            None
        };

        tracing::info!(table = %table, columns = record.len(), "记录已插入");
        Ok(InsertResponse {
            message: format!("Record inserted into {table}"),
            result,
        })
    }

    /// 按条件删除记录
    ///
    /// 条件优先取查询参数，其次取 JSON 请求体；两者皆空时拒绝执行。
    pub async fn delete(
        &self,
        name: &str,
        query: Vec<(String, String)>,
        body: &[u8],
    ) -> AppResult<DeleteResponse> {
        let table = self.catalog.resolve(name)?;
        let filters = if !query.is_empty() {
            FilterSet::from_query_pairs(query)
        } else {
            parse_record(body)?
                .map(FilterSet::from_record)
                .unwrap_or_default()
        };

        let stmt = SqlBuilder::delete_where(table, &filters)?;
        let deleted = self.store.fetch_records(&stmt).await?;
        tracing::info!(table = %table, filters = filters.len(), deleted = deleted.len(), "记录已删除");
        Ok(DeleteResponse::new(table.as_str(), deleted))
    }

    /// 按 chat_id 删除单条聊天记录
    pub async fn delete_chat(&self, name: &str, chat_id: &str) -> AppResult<DeletedRecordResponse> {
        self.require_chat_history(name)?;
        let chat_id: i64 = chat_id
            .parse()
            .map_err(|_| AppError::Validation(format!("Invalid chat_id: {chat_id}")))?;

        let deleted_record = self
            .store
            .fetch_records(&SqlBuilder::delete_chat_by_id(chat_id))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("Chat record {chat_id} not found")))?;

        tracing::info!(chat_id, "聊天记录已删除");
        Ok(DeletedRecordResponse {
            message: format!("Chat record {chat_id} deleted"),
            deleted_record,
        })
    }

    /// 删除某个会话下的全部聊天记录
    pub async fn delete_session(
        &self,
        name: &str,
        session_id: &str,
    ) -> AppResult<SessionDeleteResponse> {
        self.require_chat_history(name)?;
        let deleted_chat_ids: Vec<Value> = self
            .store
            .fetch_records(&SqlBuilder::delete_chat_by_session(session_id))
            .await?
            .into_iter()
            .filter_map(|mut r| r.remove("chat_id"))
            .collect();

        tracing::info!(session_id = %session_id, deleted = deleted_chat_ids.len(), "会话记录已删除");
        Ok(SessionDeleteResponse {
            message: format!(
                "Deleted {} chat record(s) for session {session_id}",
                deleted_chat_ids.len()
            ),
            deleted_count: deleted_chat_ids.len(),
            deleted_chat_ids,
        })
    }

    /// 标识符删除仅对 chat_history 开放；其余白名单表返回 404
    fn require_chat_history(&self, name: &str) -> AppResult<()> {
        match self.catalog.resolve(name)? {
            TableName::ChatHistory => Ok(()),
            other => Err(AppError::NotFound(format!(
                "Delete by identifier is not available for {other}"
            ))),
        }
    }
}

/// 解析 JSON 对象请求体；空请求体返回 `None`
fn parse_record(body: &[u8]) -> AppResult<Option<Record>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(record)) => Ok(Some(record)),
        Ok(Value::Null) => Ok(None),
        Ok(_) => Err(AppError::Validation(
            "Request body must be a JSON object".into(),
        )),
        Err(e) => Err(AppError::Validation(format!("Invalid JSON body: {e}"))),
    }
}
