//! 医疗数据表 HTTP 网关
//!
//! 将白名单内的 PostgreSQL 表以 REST 形式暴露，包括：
//! - 整表查询、单条插入、按条件删除
//! - chat_history 按 ID / 会话删除
//! - 表结构迁移与校验

mod handlers;
mod routes;
mod schema;
mod service;
mod state;
mod store;

use axum::{middleware, routing::get, Json, Router};
use common::config::AppConfig;
use common::middleware::request_id::request_id_middleware;
use state::AppState;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use utoipa::OpenApi;

const SERVICE_NAME: &str = "table-gateway";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "医疗数据表网关 API",
        version = "0.1.0",
        description = "PostgreSQL 数据表 HTTP 网关"
    ),
    paths(
        handlers::service_info,
        handlers::health_check,
        handlers::list_records,
        handlers::insert_record,
        handlers::delete_records,
        handlers::delete_chat_record,
        handlers::delete_chat_session,
        handlers::migrate_database,
        handlers::verify_schema,
    ),
    components(schemas(
        common::response::TableListing,
        common::response::InsertResponse,
        common::response::DeleteResponse,
        common::response::DeletedRecordResponse,
        common::response::SessionDeleteResponse,
        common::errors::ErrorBody,
        schema::ColumnDefinition,
        schema::MigrationReport,
        schema::TableReport,
        schema::VerifyReport,
        handlers::ServiceInfo,
        handlers::HealthResponse,
    )),
    tags(
        (name = "meta", description = "服务元信息"),
        (name = "tables", description = "通用数据表端点"),
        (name = "chat_history", description = "聊天记录端点"),
        (name = "admin", description = "表结构管理端点"),
        (name = "health", description = "健康检查端点")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    // 加载配置
    let config = AppConfig::load_with_service(SERVICE_NAME)?;
    info!(
        db_host = %config.database.host,
        db_name = %config.database.name,
        "数据库配置已加载"
    );

    // 创建应用状态（连接池惰性建立）
    let state = AppState::new(config.clone());

    let app = create_router(state);

    // 启动服务
    let addr = config.bind_addr();
    info!(service = SERVICE_NAME, address = %addr, "启动服务");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// 初始化日志追踪；LOG_FORMAT=json 时输出结构化日志
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::router())
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
