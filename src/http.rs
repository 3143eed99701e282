//! HTTP surface for registering actions and browsing inventory and logs.
//!
//! Authentication and sessions sit in front of this service and are not
//! handled here. Storage calls are blocking and run on tokio's blocking pool.

mod error;

use std::{io, net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::engine::Engine;
use crate::export;
use crate::model::{ActionRequest, ItemKind, ItemRef, LogFilter, LogSummary, ValidationError};
use crate::storage::Storage;

pub use error::ApiError;

const BODY_LIMIT: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    engine: Arc<Engine<Storage>>,
}

impl AppState {
    pub fn new(storage: Storage) -> Self {
        Self {
            engine: Arc::new(Engine::new(storage)),
        }
    }

    fn storage(&self) -> Storage {
        self.engine.store().clone()
    }
}

pub fn build_app(state: AppState) -> Router {
    let api = Router::new()
        .route("/logs", post(register_action))
        .route("/logs/summary", get(log_summary))
        .route("/logs/full/:id", get(log_detail))
        .route("/logs/export/csv", get(export_csv))
        .route("/weapons", get(list_weapons))
        .route("/weapons/:id", get(weapon_detail))
        .route("/specials", get(list_specials))
        .route("/specials/:id", get(special_detail))
        .route("/operators", get(list_operators))
        .route("/actions", get(list_actions))
        .route("/log-statuses", get(list_log_statuses));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(state)
}

/// Serves until ctrl-c.
pub async fn serve(addr: SocketAddr, storage: Storage) -> io::Result<()> {
    let app = build_app(AppState::new(storage));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await
}

/// Runs blocking storage work off the async executor.
async fn blocking<T, E>(f: impl FnOnce() -> Result<T, E> + Send + 'static) -> Result<T, ApiError>
where
    T: Send + 'static,
    E: Into<ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("blocking task failed: {e}")))?
        .map_err(Into::into)
}

fn parse_path_id(raw: &str, what: &str) -> Result<i64, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("{what} id must be a number")))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// ── Actions ──

async fn register_action(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request = ActionRequest::from_json(&body)?;
    let engine = Arc::clone(&state.engine);
    let log = blocking(move || engine.register(&request)).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "log created, item status updated",
            "log": log,
        })),
    ))
}

// ── Logs ──

/// Log listing filters. `start_date`/`end_date` are accepted as aliases.
#[derive(Debug, Default, Deserialize)]
struct LogQuery {
    #[serde(alias = "start_date")]
    start: Option<String>,
    #[serde(alias = "end_date")]
    end: Option<String>,
    action: Option<String>,
    item: Option<String>,
    status: Option<String>,
}

impl LogQuery {
    fn filter(&self) -> Result<LogFilter, ValidationError> {
        LogFilter::parse(
            self.start.as_deref(),
            self.end.as_deref(),
            self.action.as_deref(),
            self.item.as_deref(),
            self.status.as_deref(),
        )
    }
}

async fn log_summary(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Value>, ApiError> {
    let filter = query.filter()?;
    let storage = state.storage();
    let logs = blocking(move || storage.list_logs(&filter)).await?;
    let logs: Vec<LogSummary> = logs.iter().map(LogSummary::from).collect();
    Ok(Json(json!({ "success": true, "logs": logs })))
}

async fn log_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_path_id(&id, "log")?;
    let storage = state.storage();
    let log = blocking(move || storage.load_log(id))
        .await?
        .ok_or_else(|| ApiError::NotFound("log entry not found".into()))?;
    Ok(Json(json!({ "success": true, "log": log })))
}

async fn export_csv(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = query.filter()?;
    let storage = state.storage();
    let logs = blocking(move || storage.list_logs(&filter)).await?;
    let mut body = Vec::new();
    export::write_csv(&mut body, &logs)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"logs.csv\""),
        ],
        body,
    ))
}

// ── Inventory ──

async fn list_items(state: AppState, kind: ItemKind) -> Result<Json<Value>, ApiError> {
    let storage = state.storage();
    let items = blocking(move || storage.list_items(kind)).await?;
    let key = match kind {
        ItemKind::Weapon => "weapons",
        ItemKind::SpecialDevice => "specials",
    };
    Ok(Json(json!({ "success": true, key: items })))
}

async fn item_detail(state: AppState, kind: ItemKind, raw_id: &str) -> Result<Json<Value>, ApiError> {
    let id = parse_path_id(raw_id, kind.label())?;
    let storage = state.storage();
    let item = blocking(move || storage.load_item(ItemRef { kind, id }))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("{} not found", kind.label())))?;
    let key = match kind {
        ItemKind::Weapon => "weapon",
        ItemKind::SpecialDevice => "special",
    };
    Ok(Json(json!({ "success": true, key: item })))
}

async fn list_weapons(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    list_items(state, ItemKind::Weapon).await
}

async fn weapon_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    item_detail(state, ItemKind::Weapon, &id).await
}

async fn list_specials(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    list_items(state, ItemKind::SpecialDevice).await
}

async fn special_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    item_detail(state, ItemKind::SpecialDevice, &id).await
}

// ── Catalogues ──

async fn list_operators(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let storage = state.storage();
    let operators = blocking(move || storage.list_operators()).await?;
    Ok(Json(json!({ "success": true, "operators": operators })))
}

async fn list_actions(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let storage = state.storage();
    let actions = blocking(move || storage.list_actions()).await?;
    Ok(Json(json!({ "success": true, "actions": actions })))
}

async fn list_log_statuses(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let storage = state.storage();
    let statuses = blocking(move || storage.list_log_statuses()).await?;
    Ok(Json(json!({ "success": true, "logStatuses": statuses })))
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::Request;
    use serde::de::DeserializeOwned;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::model::ItemStatus;
    use crate::storage::{Store, fixtures};

    fn test_app() -> (TempDir, Storage, Router) {
        let (dir, storage) = fixtures::storage();
        fixtures::add_operator(&storage, 1, "Ivan", "Petrov");
        fixtures::add_weapon(&storage, 101, "AK-12 #101", ItemStatus::InStock);
        fixtures::add_special(&storage, 7, "NVG #7", ItemStatus::InStock);
        let app = build_app(AppState::new(storage.clone()));
        (dir, storage, app)
    }

    async fn read_json<T: DeserializeOwned>(res: axum::http::Response<Body>) -> T {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json")
    }

    async fn post_log(app: &Router, body: &str) -> axum::http::Response<Body> {
        app.clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/logs")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn fetch(app: &Router, uri: &str) -> axum::http::Response<Body> {
        app.clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    const TAKE_W101: &str = r#"{"operatorId": 1, "actionKind": 1, "statusGoal": 3, "weaponId": 101}"#;
    const RETURN_W101: &str = r#"{"operatorId": 1, "actionKind": 2, "statusGoal": 1, "weaponId": 101}"#;

    #[tokio::test]
    async fn health_is_ok() {
        let (_dir, _storage, app) = test_app();

        let res = fetch(&app, "/health").await;

        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn take_conflict_return_scenario() {
        let (_dir, storage, app) = test_app();
        let w = ItemRef::weapon(101);

        let res = post_log(&app, TAKE_W101).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = read_json(res).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["log"]["item"], "AK-12 #101");
        assert_eq!(body["log"]["operator"], "Ivan Petrov");
        assert_eq!(body["log"]["action"], "Taken");
        assert_eq!(storage.current_status(w).unwrap(), Some(ItemStatus::Taken));

        let res = post_log(&app, TAKE_W101).await;
        assert_eq!(res.status(), StatusCode::CONFLICT);
        let body: Value = read_json(res).await;
        assert_eq!(body["success"], false);
        let message = body["message"].as_str().unwrap();
        assert!(message.contains("weapon 101 is currently \"Taken\""), "{message}");

        let res = post_log(&app, RETURN_W101).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(storage.current_status(w).unwrap(), Some(ItemStatus::InStock));
        assert_eq!(fixtures::log_count(&storage), 2);
    }

    #[tokio::test]
    async fn missing_operator_is_rejected_before_writing() {
        let (_dir, storage, app) = test_app();

        let res = post_log(&app, r#"{"actionKind": 1, "statusGoal": 3, "weaponId": 101}"#).await;

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = read_json(res).await;
        assert!(body["message"].as_str().unwrap().contains("operatorId"));
        assert_eq!(fixtures::log_count(&storage), 0);
        assert_eq!(
            storage.current_status(ItemRef::weapon(101)).unwrap(),
            Some(ItemStatus::InStock)
        );
    }

    #[tokio::test]
    async fn malformed_bodies_are_bad_requests() {
        let (_dir, _storage, app) = test_app();

        for body in [
            "not json",
            r#"{"operatorId": 1, "actionKind": 1, "statusGoal": 3, "extra": 1}"#,
            r#"{"operatorId": "one", "actionKind": 1, "statusGoal": 3}"#,
        ] {
            let res = post_log(&app, body).await;
            assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{body}");
        }
    }

    #[tokio::test]
    async fn unknown_operator_is_a_data_error() {
        let (_dir, storage, app) = test_app();

        let res = post_log(&app, r#"{"operatorId": 42, "actionKind": 1, "statusGoal": 3, "weaponId": 101}"#).await;

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = read_json(res).await;
        assert!(body["message"].as_str().unwrap().starts_with("data error"));
        assert_eq!(
            storage.current_status(ItemRef::weapon(101)).unwrap(),
            Some(ItemStatus::InStock)
        );
    }

    #[tokio::test]
    async fn legacy_field_names_are_accepted() {
        let (_dir, storage, app) = test_app();

        let res = post_log(
            &app,
            r#"{"soldier": "1", "action_type": "3", "status": "4", "specials_taken": "7", "comment": "lens cracked"}"#,
        )
        .await;

        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = read_json(res).await;
        assert_eq!(body["log"]["specialDevice"], "NVG #7");
        assert_eq!(body["log"]["comment"], "lens cracked");
        assert_eq!(body["log"]["status"], "Under repair");
        assert_eq!(
            storage.current_status(ItemRef::special_device(7)).unwrap(),
            Some(ItemStatus::UnderRepair)
        );
    }

    #[tokio::test]
    async fn item_detail_validates_and_finds() {
        let (_dir, _storage, app) = test_app();

        assert_eq!(fetch(&app, "/api/weapons/abc").await.status(), StatusCode::BAD_REQUEST);
        assert_eq!(fetch(&app, "/api/weapons/999").await.status(), StatusCode::NOT_FOUND);

        let res = fetch(&app, "/api/weapons/101").await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = read_json(res).await;
        assert_eq!(body["weapon"]["name"], "AK-12 #101");
        assert_eq!(body["weapon"]["status"], "in_stock");

        let body: Value = read_json(fetch(&app, "/api/specials").await).await;
        assert_eq!(body["specials"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn log_listing_and_detail() {
        let (_dir, _storage, app) = test_app();
        post_log(&app, TAKE_W101).await;
        post_log(&app, RETURN_W101).await;

        let body: Value = read_json(fetch(&app, "/api/logs/summary").await).await;
        let logs = body["logs"].as_array().unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0]["action"], "Returned");

        let body: Value = read_json(fetch(&app, "/api/logs/summary?action=Taken").await).await;
        assert_eq!(body["logs"].as_array().unwrap().len(), 1);

        let res = fetch(&app, "/api/logs/summary?start=someday").await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let body: Value = read_json(fetch(&app, "/api/logs/full/1").await).await;
        assert_eq!(body["log"]["weapon"], "AK-12 #101");
        assert_eq!(fetch(&app, "/api/logs/full/99").await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn csv_export_has_attachment_headers() {
        let (_dir, _storage, app) = test_app();
        post_log(&app, TAKE_W101).await;

        let res = fetch(&app, "/api/logs/export/csv").await;

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers()[header::CONTENT_TYPE],
            "text/csv; charset=utf-8"
        );
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("AK-12 #101"));
    }

    #[tokio::test]
    async fn catalogues_are_listed() {
        let (_dir, _storage, app) = test_app();

        let body: Value = read_json(fetch(&app, "/api/actions").await).await;
        assert_eq!(body["actions"].as_array().unwrap().len(), 3);

        let body: Value = read_json(fetch(&app, "/api/log-statuses").await).await;
        assert_eq!(body["logStatuses"].as_array().unwrap().len(), 4);

        let body: Value = read_json(fetch(&app, "/api/operators").await).await;
        assert_eq!(body["operators"][0]["surname"], "Petrov");
    }
}
