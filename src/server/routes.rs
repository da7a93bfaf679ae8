//! HTTP Routes
//!
//! Translates the HTTP/JSON surface into engine calls. Every response uses
//! the `{response, ok, error}` envelope; lookup failures map to 404,
//! malformed bodies to 406 and snapshot failures to 500.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use crate::persistence::{self, PersistError, SnapshotBackend};
use crate::storage::{Engine, StorageError, Value};

/// Response envelope shared by every endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resp {
    pub response: serde_json::Value,
    pub ok: bool,
    pub error: String,
}

impl Resp {
    pub fn ok(response: impl Into<serde_json::Value>) -> Self {
        Self {
            response: response.into(),
            ok: true,
            error: String::new(),
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            response: serde_json::Value::Null,
            ok: false,
            error: error.into(),
        }
    }
}

/// State shared by all handlers.
///
/// The engine sits behind a lock because a restore replaces it wholesale;
/// handlers clone the cheap engine handle out and release the lock before
/// touching storage.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<RwLock<Engine>>,
    backend: Arc<dyn SnapshotBackend>,
    chunks: u32,
}

impl AppState {
    pub fn new(engine: Engine, backend: Arc<dyn SnapshotBackend>, chunks: u32) -> Self {
        Self {
            engine: Arc::new(RwLock::new(engine)),
            backend,
            chunks,
        }
    }

    /// Current engine handle.
    pub fn engine(&self) -> Engine {
        self.engine.read().clone()
    }

    fn swap_engine(&self, fresh: Engine) {
        *self.engine.write() = fresh;
    }
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/v1/ping", get(ping))
        .route(
            "/v1/kvstorage/",
            post(add_record).put(update_record).delete(remove_record),
        )
        .route("/v1/kvstorage/get/{key}", get(get_record))
        .route("/v1/kvstorage/getdict/{key}/{dict_key}", get(get_dict_record))
        .route("/v1/kvstorage/getlist/{key}/{index}", get(get_list_record))
        .route("/v1/kvstorage/dict/", post(add_dict))
        .route("/v1/kvstorage/list/", post(add_list))
        .route("/v1/kvstorage/keys", get(get_keys))
        .route("/v1/kvstorage/saveToDb", get(save_to_db))
        .route("/v1/kvstorage/loadFromDb", get(load_from_db))
        .with_state(state)
}

type ApiResponse = (StatusCode, Json<Resp>);

fn ok(response: impl Into<serde_json::Value>) -> ApiResponse {
    (StatusCode::OK, Json(Resp::ok(response)))
}

fn not_found(err: StorageError) -> ApiResponse {
    (StatusCode::NOT_FOUND, Json(Resp::err(err.to_string())))
}

fn bad_body(rejection: JsonRejection) -> ApiResponse {
    (
        StatusCode::NOT_ACCEPTABLE,
        Json(Resp::err(rejection.body_text())),
    )
}

fn persist_failed(err: PersistError) -> ApiResponse {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(Resp::err(err.to_string())),
    )
}

#[derive(Debug, Deserialize)]
struct WriteBody {
    key: String,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    ttl: i64,
}

#[derive(Debug, Deserialize)]
struct DictBody {
    key: String,
    value: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    ttl: i64,
}

#[derive(Debug, Deserialize)]
struct ListBody {
    key: String,
    value: Vec<serde_json::Value>,
    #[serde(default)]
    ttl: i64,
}

#[derive(Debug, Deserialize)]
struct KeyBody {
    key: String,
}

async fn ping() -> &'static str {
    "pong"
}

async fn add_record(
    State(state): State<AppState>,
    body: Result<Json<WriteBody>, JsonRejection>,
) -> ApiResponse {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_body(rejection),
    };
    state
        .engine()
        .set(&body.key, Value::from_json(body.value), body.ttl);
    info!(key = %body.key, "added record");
    ok("")
}

async fn update_record(
    State(state): State<AppState>,
    body: Result<Json<WriteBody>, JsonRejection>,
) -> ApiResponse {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_body(rejection),
    };
    match state
        .engine()
        .update(&body.key, Value::from_json(body.value), body.ttl)
    {
        Ok(()) => {
            info!(key = %body.key, "updated record");
            ok("")
        }
        Err(err) => not_found(err),
    }
}

async fn remove_record(
    State(state): State<AppState>,
    body: Result<Json<KeyBody>, JsonRejection>,
) -> ApiResponse {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_body(rejection),
    };
    // Removal of an absent key still answers ok; DELETE is idempotent.
    state.engine().remove(&body.key);
    info!(key = %body.key, "removed record");
    ok("")
}

async fn get_record(State(state): State<AppState>, Path(key): Path<String>) -> ApiResponse {
    let result = match state.engine().get(&key) {
        Some(value) => ok(value.into_json()),
        None => not_found(StorageError::KeyNotFound),
    };
    info!(key = %key, "fetched record");
    result
}

async fn get_dict_record(
    State(state): State<AppState>,
    Path((key, dict_key)): Path<(String, String)>,
) -> ApiResponse {
    let result = match state.engine().get_dict_element(&key, &dict_key) {
        Ok(value) => ok(value),
        Err(err) => not_found(err),
    };
    info!(key = %key, dict_key = %dict_key, "fetched dictionary element");
    result
}

async fn get_list_record(
    State(state): State<AppState>,
    Path((key, index)): Path<(String, i64)>,
) -> ApiResponse {
    let result = match state.engine().get_list_element(&key, index) {
        Ok(value) => ok(value),
        Err(err) => not_found(err),
    };
    info!(key = %key, index, "fetched list element");
    result
}

async fn add_dict(
    State(state): State<AppState>,
    body: Result<Json<DictBody>, JsonRejection>,
) -> ApiResponse {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_body(rejection),
    };
    state.engine().set(&body.key, Value::Dict(body.value), body.ttl);
    info!(key = %body.key, "added dictionary");
    ok("")
}

async fn add_list(
    State(state): State<AppState>,
    body: Result<Json<ListBody>, JsonRejection>,
) -> ApiResponse {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_body(rejection),
    };
    state.engine().set(&body.key, Value::List(body.value), body.ttl);
    info!(key = %body.key, "added list");
    ok("")
}

async fn get_keys(State(state): State<AppState>) -> ApiResponse {
    ok(json!(state.engine().keys()))
}

async fn save_to_db(State(state): State<AppState>) -> ApiResponse {
    match persistence::save(&state.engine(), state.backend.as_ref()).await {
        Ok(()) => {
            info!("saved snapshot to database");
            ok("")
        }
        Err(err) => {
            error!(error = %err, "snapshot save failed");
            persist_failed(err)
        }
    }
}

async fn load_from_db(State(state): State<AppState>) -> ApiResponse {
    // The previous engine (and its reaper) is discarded wholesale; the
    // snapshot loads into a fresh one.
    let old = state.engine();
    old.stop_ttl_processing().await;
    let fresh = Engine::new(state.chunks, true);
    state.swap_engine(fresh.clone());

    match persistence::restore(&fresh, state.backend.as_ref()).await {
        Ok(()) => {
            info!("loaded snapshot from database");
            ok("")
        }
        Err(err) => {
            error!(error = %err, "snapshot load failed");
            persist_failed(err)
        }
    }
}
