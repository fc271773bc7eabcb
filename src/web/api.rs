//! The management API: CRUD over the record store, guarded by a bearer
//! token. Everything rides the datastore channel, the same as the
//! resolver's lookups.

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tokio::sync::oneshot;
use tracing::error;

use crate::datastore::{Command, RecordPayload};
use crate::error::IbexError;
use crate::web::WebState;

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": "missing authorization"})),
    )
        .into_response()
}

fn forbidden() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({"error": "invalid token"})),
    )
        .into_response()
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "record store unavailable"})),
    )
        .into_response()
}

fn validation_error(field: String, message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"error": message, "field": field})),
    )
        .into_response()
}

/// Check the bearer token against the configured admin token. No header
/// is a 401, a wrong token is a 403.
fn authorize(headers: &HeaderMap, state: &WebState) -> Result<(), Response> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Err(unauthorized());
    };
    let token = value
        .to_str()
        .unwrap_or("")
        .strip_prefix("Bearer ")
        .unwrap_or("");
    if token.is_empty() || token != state.config.admin_token {
        return Err(forbidden());
    }
    Ok(())
}

pub async fn create_record(
    State(state): State<WebState>,
    headers: HeaderMap,
    Json(payload): Json<RecordPayload>,
) -> Response {
    if let Err(response) = authorize(&headers, &state) {
        return response;
    }
    let (tx_oneshot, rx_oneshot) = oneshot::channel();
    let command = Command::Insert {
        payload,
        resp: tx_oneshot,
    };
    if let Err(err) = state.store.send(command).await {
        error!("Failed to send insert to the record store: {err}");
        return internal_error();
    }
    match rx_oneshot.await {
        Ok(Ok(id)) => Json(json!({"status": "ok", "id": id})).into_response(),
        Ok(Err(IbexError::InvalidRecord { field, message })) => validation_error(field, message),
        Ok(Err(err)) => {
            error!("Failed to insert record: {err}");
            internal_error()
        }
        Err(_) => internal_error(),
    }
}

pub async fn list_records(State(state): State<WebState>, headers: HeaderMap) -> Response {
    if let Err(response) = authorize(&headers, &state) {
        return response;
    }
    let (tx_oneshot, rx_oneshot) = oneshot::channel();
    if let Err(err) = state.store.send(Command::List { resp: tx_oneshot }).await {
        error!("Failed to send list to the record store: {err}");
        return internal_error();
    }
    match rx_oneshot.await {
        Ok(records) => Json(records).into_response(),
        Err(_) => internal_error(),
    }
}

pub async fn delete_record(
    State(state): State<WebState>,
    headers: HeaderMap,
    Path(domain): Path<String>,
) -> Response {
    if let Err(response) = authorize(&headers, &state) {
        return response;
    }
    let (tx_oneshot, rx_oneshot) = oneshot::channel();
    let command = Command::DeleteByName {
        name: domain,
        resp: tx_oneshot,
    };
    if let Err(err) = state.store.send(command).await {
        error!("Failed to send delete to the record store: {err}");
        return internal_error();
    }
    match rx_oneshot.await {
        Ok(deleted) => Json(json!({"status": "deleted", "deleted": deleted})).into_response(),
        Err(_) => internal_error(),
    }
}

pub async fn update_record(
    State(state): State<WebState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(payload): Json<RecordPayload>,
) -> Response {
    if let Err(response) = authorize(&headers, &state) {
        return response;
    }
    let (tx_oneshot, rx_oneshot) = oneshot::channel();
    let command = Command::Update {
        id,
        payload,
        resp: tx_oneshot,
    };
    if let Err(err) = state.store.send(command).await {
        error!("Failed to send update to the record store: {err}");
        return internal_error();
    }
    match rx_oneshot.await {
        Ok(Ok(true)) => Json(json!({"status": "ok", "id": id})).into_response(),
        Ok(Ok(false)) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "no such record"})),
        )
            .into_response(),
        Ok(Err(IbexError::InvalidRecord { field, message })) => validation_error(field, message),
        Ok(Err(err)) => {
            error!("Failed to update record {id}: {err}");
            internal_error()
        }
        Err(_) => internal_error(),
    }
}

pub async fn delete_record_by_id(
    State(state): State<WebState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    if let Err(response) = authorize(&headers, &state) {
        return response;
    }
    let (tx_oneshot, rx_oneshot) = oneshot::channel();
    let command = Command::DeleteById {
        id,
        resp: tx_oneshot,
    };
    if let Err(err) = state.store.send(command).await {
        error!("Failed to send delete to the record store: {err}");
        return internal_error();
    }
    match rx_oneshot.await {
        Ok(0) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "no such record"})),
        )
            .into_response(),
        Ok(_) => Json(json!({"status": "deleted"})).into_response(),
        Err(_) => internal_error(),
    }
}
