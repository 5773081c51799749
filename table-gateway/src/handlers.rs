//! Handler模块

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use common::errors::AppError;
use common::response::{
    DeleteResponse, DeletedRecordResponse, InsertResponse, SessionDeleteResponse, TableListing,
};
use crate::routes::ENDPOINTS;
use crate::schema::{MigrationReport, SchemaAdmin, VerifyReport};
use crate::service::TableService;
use crate::state::AppState;

fn service(state: &AppState) -> TableService {
    TableService::new(state.store.clone(), state.catalog.clone())
}

/// 服务元信息与可访问的数据表
#[utoipa::path(
    get,
    path = "/",
    tag = "meta",
    responses(
        (status = 200, description = "服务元信息", body = ServiceInfo)
    )
)]
pub async fn service_info(State(state): State<AppState>) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: state.config.service_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "running".to_string(),
        tables: state.catalog.names().into_iter().map(String::from).collect(),
        endpoints: ENDPOINTS.iter().map(|e| e.to_string()).collect(),
    })
}

/// 健康检查端点
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "服务运行正常", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match state.store.ping().await {
        Ok(()) => "up",
        Err(e) => {
            tracing::warn!(error = %e, "数据库探活失败");
            "down"
        }
    };
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: state.config.service_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        database: database.to_string(),
    })
}

/// 查询整张表的全部记录
#[utoipa::path(
    get,
    path = "/table/{name}",
    tag = "tables",
    params(
        ("name" = String, Path, description = "表名（白名单内）")
    ),
    responses(
        (status = 200, description = "表记录", body = TableListing),
        (status = 400, description = "表名无效", body = common::errors::ErrorBody),
        (status = 500, description = "数据库错误", body = common::errors::ErrorBody)
    )
)]
pub async fn list_records(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<TableListing>, AppError> {
    let data = service(&state).list(&name).await?;
    Ok(Json(data))
}

/// 向表中插入一条记录
#[utoipa::path(
    post,
    path = "/table/{name}",
    tag = "tables",
    params(
        ("name" = String, Path, description = "表名（白名单内）")
    ),
    request_body(content = Object, description = "列名到值的映射"),
    responses(
        (status = 201, description = "记录已插入", body = InsertResponse),
        (status = 400, description = "表名无效或缺少数据", body = common::errors::ErrorBody),
        (status = 500, description = "数据库错误", body = common::errors::ErrorBody)
    )
)]
pub async fn insert_record(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<InsertResponse>), AppError> {
    let data = service(&state).insert(&name, &body).await?;
    Ok((StatusCode::CREATED, Json(data)))
}

/// 按条件删除记录（查询参数优先，其次 JSON 请求体）
#[utoipa::path(
    delete,
    path = "/table/{name}",
    tag = "tables",
    params(
        ("name" = String, Path, description = "表名（白名单内）")
    ),
    request_body(content = Object, description = "无查询参数时使用的过滤条件"),
    responses(
        (status = 200, description = "已删除的记录", body = DeleteResponse),
        (status = 400, description = "表名无效或缺少过滤条件", body = common::errors::ErrorBody),
        (status = 500, description = "数据库错误", body = common::errors::ErrorBody)
    )
)]
pub async fn delete_records(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
    body: Bytes,
) -> Result<Json<DeleteResponse>, AppError> {
    let data = service(&state).delete(&name, query, &body).await?;
    Ok(Json(data))
}

/// 按 chat_id 删除单条聊天记录
#[utoipa::path(
    delete,
    path = "/table/{name}/{id}",
    tag = "chat_history",
    params(
        ("name" = String, Path, description = "仅支持 chat_history"),
        ("id" = i64, Path, description = "聊天记录 ID")
    ),
    responses(
        (status = 200, description = "已删除的记录", body = DeletedRecordResponse),
        (status = 400, description = "ID 非数字或表名无效", body = common::errors::ErrorBody),
        (status = 404, description = "记录未找到", body = common::errors::ErrorBody),
        (status = 500, description = "数据库错误", body = common::errors::ErrorBody)
    )
)]
pub async fn delete_chat_record(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
) -> Result<Json<DeletedRecordResponse>, AppError> {
    let data = service(&state).delete_chat(&name, &id).await?;
    Ok(Json(data))
}

/// 删除某个会话的全部聊天记录
#[utoipa::path(
    delete,
    path = "/table/{name}/session/{session_id}",
    tag = "chat_history",
    params(
        ("name" = String, Path, description = "仅支持 chat_history"),
        ("session_id" = String, Path, description = "会话 ID")
    ),
    responses(
        (status = 200, description = "已删除的聊天记录 ID", body = SessionDeleteResponse),
        (status = 500, description = "数据库错误", body = common::errors::ErrorBody)
    )
)]
pub async fn delete_chat_session(
    State(state): State<AppState>,
    Path((name, session_id)): Path<(String, String)>,
) -> Result<Json<SessionDeleteResponse>, AppError> {
    let data = service(&state).delete_session(&name, &session_id).await?;
    Ok(Json(data))
}

/// 重建 chat_history 表及其索引（会清空现有数据）
#[utoipa::path(
    post,
    path = "/admin/migrate_database",
    tag = "admin",
    responses(
        (status = 200, description = "重建后的表结构", body = MigrationReport),
        (status = 500, description = "迁移失败", body = common::errors::ErrorBody)
    )
)]
pub async fn migrate_database(
    State(state): State<AppState>,
) -> Result<Json<MigrationReport>, AppError> {
    let report = SchemaAdmin::new(state.store.clone())
        .migrate_chat_history()
        .await?;
    Ok(Json(report))
}

/// 查看 chat_history 与 image_analysis 的表结构和行数
#[utoipa::path(
    get,
    path = "/admin/verify_schema",
    tag = "admin",
    responses(
        (status = 200, description = "表结构与行数", body = VerifyReport),
        (status = 500, description = "查询失败", body = common::errors::ErrorBody)
    )
)]
pub async fn verify_schema(State(state): State<AppState>) -> Result<Json<VerifyReport>, AppError> {
    let report = SchemaAdmin::new(state.store.clone()).verify().await?;
    Ok(Json(report))
}

#[derive(Serialize, ToSchema)]
pub struct ServiceInfo {
    pub service: String,
    pub version: String,
    pub status: String,
    pub tables: Vec<String>,
    pub endpoints: Vec<String>,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    /// "up" 或 "down"
    pub database: String,
}
