//! # Web things
//!
//! axum + axum-server carry the HTTPS side: DoH at `/dns-query` and the
//! management API under `/api`.

use crate::config::ConfigFile;
use crate::datastore::Command;
use crate::error::IbexError;
use crate::resolver::Resolver;
use axum::routing::{delete, get, post, put};
use axum::Router;
use concread::cowcell::asynch::CowCellReadTxn;
use std::io;
use std::net::SocketAddr;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

pub mod api;
pub mod doh;

pub const STATUS_OK: &str = "Ok";

/// Everything the HTTPS handlers need.
#[derive(Clone)]
pub struct WebState {
    pub resolver: Resolver,
    pub store: Sender<Command>,
    pub config: ConfigFile,
}

pub fn router(state: WebState) -> Router {
    Router::new()
        .route("/dns-query", get(doh::handle_get).post(doh::handle_post))
        .route("/admin/record", post(api::create_record))
        .route("/admin/records", get(api::list_records))
        .route("/admin/record/{domain}", delete(api::delete_record))
        .route(
            "/admin/record/id/{id}",
            put(api::update_record).delete(api::delete_record_by_id),
        )
        .route("/status", get(status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn status() -> &'static str {
    STATUS_OK
}

/// Stand up the HTTPS listener and return its task handle.
pub async fn build(
    resolver: Resolver,
    store: Sender<Command>,
    config: CowCellReadTxn<ConfigFile>,
) -> Result<JoinHandle<Result<(), io::Error>>, IbexError> {
    let addr = config.api_listener_address()?;
    let tls_config = config.get_tls_config().await?;
    let state = WebState {
        resolver,
        store,
        config: (*config).clone(),
    };
    let app = router(state);

    let res: JoinHandle<Result<(), io::Error>> = tokio::spawn(
        axum_server::bind_rustls(addr, tls_config)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>()),
    );
    info!("Started DoH/API server on https://{addr}");
    Ok(res)
}
