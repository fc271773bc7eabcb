//! DNS-over-HTTPS: the wire form (`application/dns-message`) and the
//! JSON form (`application/dns-json`), both on GET and POST.

use axum::body::Bytes;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use tracing::debug;

use crate::enums::RecordType;
use crate::querylog::Transport;
use crate::resolver::JsonResponse;
use crate::web::WebState;

pub const CONTENT_TYPE_WIRE: &str = "application/dns-message";
pub const CONTENT_TYPE_JSON: &str = "application/dns-json";

#[derive(Debug, Default, Deserialize)]
pub struct DohQuery {
    /// Base64url-encoded raw question bytes
    pub dns: Option<String>,
    /// QNAME field, JSON form
    pub name: Option<String>,
    /// Query type, defaults to A
    #[serde(alias = "type", default)]
    pub rrtype: Option<String>,
}

/// The JSON form's POST body.
#[derive(Debug, Deserialize)]
struct JsonQueryBody {
    name: Option<String>,
    #[serde(alias = "type", default)]
    rrtype: Option<String>,
}

fn wire_reply(bytes: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, CONTENT_TYPE_WIRE)],
        bytes,
    )
        .into_response()
}

fn json_reply(body: JsonResponse) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, CONTENT_TYPE_JSON)],
        Json(body),
    )
        .into_response()
}

fn json_error(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        [(header::CONTENT_TYPE, CONTENT_TYPE_JSON)],
        Json(json!({ "error": message })),
    )
        .into_response()
}

fn accepts_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.contains(CONTENT_TYPE_JSON))
        .unwrap_or(false)
}

/// Decode the `dns` query parameter: base64url with any stripped `=`
/// padding restored.
fn decode_dns_param(dns: &str) -> Option<Vec<u8>> {
    general_purpose::URL_SAFE_NO_PAD
        .decode(dns.trim_end_matches('='))
        .ok()
}

async fn resolve_json_form(
    state: &WebState,
    name: Option<String>,
    rrtype: Option<String>,
    client_ip: SocketAddr,
) -> Response {
    let Some(name) = name else {
        return json_error("missing name parameter");
    };
    let rrtype_name = rrtype.unwrap_or_else(|| "A".to_string()).to_uppercase();
    let Some(rrtype) = RecordType::from_name(&rrtype_name) else {
        return json_error("unsupported type");
    };
    let body = state
        .resolver
        .resolve_json(&name, rrtype, Some(client_ip.ip()))
        .await;
    json_reply(body)
}

pub async fn handle_get(
    State(state): State<WebState>,
    ConnectInfo(client): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(params): Query<DohQuery>,
) -> Response {
    // JSON form when asked for by Accept or by shape of the query string
    if accepts_json(&headers) || params.name.is_some() {
        return resolve_json_form(&state, params.name, params.rrtype, client).await;
    }

    let Some(dns) = params.dns else {
        return json_error("missing dns parameter");
    };
    let Some(query_bytes) = decode_dns_param(&dns) else {
        return json_error("invalid dns parameter");
    };

    match state
        .resolver
        .resolve(&query_bytes, Some(client.ip()), Transport::DohWire)
        .await
    {
        Ok(reply_bytes) => wire_reply(reply_bytes),
        Err(error) => {
            debug!("Failed to answer DoH GET query: {error}");
            json_error("invalid dns parameter")
        }
    }
}

pub async fn handle_post(
    State(state): State<WebState>,
    ConnectInfo(client): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or(CONTENT_TYPE_WIRE);

    if content_type.starts_with(CONTENT_TYPE_JSON) {
        let payload: JsonQueryBody = match serde_json::from_slice(&body) {
            Ok(value) => value,
            Err(err) => {
                debug!("Failed to parse DoH JSON body: {err}");
                return json_error("invalid json body");
            }
        };
        return resolve_json_form(&state, payload.name, payload.rrtype, client).await;
    }

    match state
        .resolver
        .resolve(&body, Some(client.ip()), Transport::DohWire)
        .await
    {
        Ok(reply_bytes) => wire_reply(reply_bytes),
        Err(error) => {
            debug!("Failed to answer DoH POST query: {error}");
            json_error("invalid dns message")
        }
    }
}
