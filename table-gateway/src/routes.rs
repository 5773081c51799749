//! 路由模块

use axum::{
    routing::{delete, get, post},
    Router,
};
use crate::handlers;
use crate::state::AppState;

/// 对外公布的端点，与 `router()` 的注册保持一致
pub const ENDPOINTS: [&str; 8] = [
    "GET /table/{name}",
    "POST /table/{name}",
    "DELETE /table/{name}",
    "DELETE /table/chat_history/{id}",
    "DELETE /table/chat_history/session/{session_id}",
    "POST /admin/migrate_database",
    "GET /admin/verify_schema",
    "GET /api/health",
];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::service_info))
        .route("/api/health", get(handlers::health_check))
        .route(
            "/table/{name}",
            get(handlers::list_records)
                .post(handlers::insert_record)
                .delete(handlers::delete_records),
        )
        // 仅 chat_history 可用，表名由服务层校验
        .route("/table/{name}/{id}", delete(handlers::delete_chat_record))
        .route(
            "/table/{name}/session/{session_id}",
            delete(handlers::delete_chat_session),
        )
        .route("/admin/migrate_database", post(handlers::migrate_database))
        .route("/admin/verify_schema", get(handlers::verify_schema))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use common::config::AppConfig;
    use common::models::Record;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::store::memory::MemoryStore;

    fn app(store: Arc<MemoryStore>) -> Router {
        let config = AppConfig::from_lookup("table-gateway", |key| match key {
            "DB_HOST" => Some("localhost".into()),
            "DB_NAME" => Some("medical".into()),
            "DB_USER" => Some("postgres".into()),
            "DB_PASSWORD" => Some("secret".into()),
            _ => None,
        })
        .unwrap();
        router().with_state(AppState::with_store(config, store))
    }

    fn rows(value: Value) -> Vec<Record> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect()
    }

    async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                builder = builder.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let response = app.oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_unknown_table_is_rejected_on_every_verb() {
        let store = Arc::new(MemoryStore::new());
        for method in [Method::GET, Method::POST, Method::DELETE] {
            let (status, body) = send(
                app(store.clone()),
                method,
                "/table/users?id=1",
                Some(json!({"a": 1})),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], "Invalid table name: users");
            assert_eq!(body["code"], "INVALID_TABLE");
        }
        assert!(store.statements().is_empty());
    }

    #[tokio::test]
    async fn test_list_returns_rows_in_order() {
        let store = Arc::new(MemoryStore::new().respond(Ok(rows(json!([
            {"id": 1, "name": "Aspirin"},
            {"id": 2, "name": "Ibuprofen"}
        ])))));
        let (status, body) = send(app(store.clone()), Method::GET, "/table/medicines", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["table"], "medicines");
        assert_eq!(body["count"], 2);
        assert_eq!(body["data"][1]["name"], "Ibuprofen");
        assert_eq!(
            store.statements()[0].sql,
            "SELECT row_to_json(t) AS record FROM medicines t"
        );
    }

    #[tokio::test]
    async fn test_insert_returns_created() {
        let store = Arc::new(MemoryStore::new());
        let (status, body) = send(
            app(store.clone()),
            Method::POST,
            "/table/vitals",
            Some(json!({"patient_id": "p1", "heart_rate": 72})),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "Record inserted into vitals");
        let stmt = &store.statements()[0];
        assert!(stmt.sql.starts_with("INSERT INTO vitals (patient_id, heart_rate) SELECT"));
        assert_eq!(stmt.binds, vec![json!({"patient_id": "p1", "heart_rate": 72})]);
    }

    #[tokio::test]
    async fn test_insert_without_body_is_bad_request() {
        let store = Arc::new(MemoryStore::new());
        let (status, body) = send(app(store.clone()), Method::POST, "/table/vitals", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No data provided");
        assert!(store.statements().is_empty());
    }

    #[tokio::test]
    async fn test_image_analysis_defaults_image_type() {
        let store = Arc::new(MemoryStore::new().respond(Ok(rows(json!([{"analysis_id": 7}])))));
        let (status, body) = send(
            app(store.clone()),
            Method::POST,
            "/table/image_analysis",
            Some(json!({"patient_id": "p1", "analysis_result": "clear"})),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["result"]["analysis_id"], 7);
        let stmt = &store.statements()[0];
        assert_eq!(stmt.binds[0]["image_type"], "surgical_frame");
    }

    #[tokio::test]
    async fn test_delete_without_filters_is_bad_request() {
        let store = Arc::new(MemoryStore::new());
        let (status, _) = send(app(store.clone()), Method::DELETE, "/table/vitals", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(store.statements().is_empty());
    }

    #[tokio::test]
    async fn test_delete_with_no_match_reports_zero() {
        let store = Arc::new(MemoryStore::new());
        let (status, body) = send(
            app(store.clone()),
            Method::DELETE,
            "/table/vitals?patient_id=nobody",
            None,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deleted_count"], 0);
        assert_eq!(body["deleted_records"], json!([]));
    }

    #[tokio::test]
    async fn test_delete_chat_by_id() {
        let store = Arc::new(
            MemoryStore::new().respond(Ok(rows(json!([{"chat_id": 5, "session_id": "s1"}])))),
        );
        let (status, body) = send(
            app(store.clone()),
            Method::DELETE,
            "/table/chat_history/5",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deleted_record"]["chat_id"], 5);
        assert_eq!(store.statements()[0].binds, vec![json!(5)]);

        let (status, body) = send(app(store), Method::DELETE, "/table/chat_history/6", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_delete_by_id_only_for_chat_history() {
        let store = Arc::new(MemoryStore::new());
        let (status, _) = send(app(store.clone()), Method::DELETE, "/table/vitals/5", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(app(store.clone()), Method::DELETE, "/table/chat_history/abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(store.statements().is_empty());
    }

    #[tokio::test]
    async fn test_chat_session_lifecycle() {
        let store = Arc::new(
            MemoryStore::new()
                .respond(Ok(rows(json!([{"chat_id": 1}]))))
                .respond(Ok(rows(json!([{"chat_id": 2}]))))
                .respond(Ok(rows(json!([{"chat_id": 1}, {"chat_id": 2}])))),
        );
        for prompt in ["hello", "follow up"] {
            let (status, _) = send(
                app(store.clone()),
                Method::POST,
                "/table/chat_history",
                Some(json!({"session_id": "s1", "prompt": prompt, "response": "ok"})),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, body) = send(
            app(store.clone()),
            Method::DELETE,
            "/table/chat_history/session/s1",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deleted_count"], 2);
        assert_eq!(body["deleted_chat_ids"], json!([1, 2]));

        let statements = store.statements();
        assert_eq!(statements.len(), 3);
        assert!(statements[0].sql.contains("RETURNING chat_id"));
        assert_eq!(statements[2].binds, vec![json!("s1")]);
    }

    #[tokio::test]
    async fn test_advertised_endpoints_are_routed() {
        for endpoint in ENDPOINTS {
            let (method, path) = endpoint.split_once(' ').unwrap();
            let uri = path
                .replace("{name}", "vitals")
                .replace("{id}", "1")
                .replace("{session_id}", "s1");
            let (status, body) = send(
                app(Arc::new(MemoryStore::new())),
                method.parse().unwrap(),
                &uri,
                None,
            )
            .await;
            assert_ne!(status, StatusCode::METHOD_NOT_ALLOWED, "{endpoint}");
            // 未注册的路由返回空响应体的 404；服务层的 404 带错误码
            assert!(status != StatusCode::NOT_FOUND || body["code"] == "NOT_FOUND", "{endpoint}");
        }
    }

    #[tokio::test]
    async fn test_service_info_lists_tables() {
        let (status, body) = send(app(Arc::new(MemoryStore::new())), Method::GET, "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "table-gateway");
        let tables = body["tables"].as_array().unwrap();
        assert_eq!(tables.len(), 8);
        assert!(tables.contains(&json!("chat_history")));
    }

    #[tokio::test]
    async fn test_health_reports_database() {
        let (status, body) = send(
            app(Arc::new(MemoryStore::new())),
            Method::GET,
            "/api/health",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"], "up");
    }
}
