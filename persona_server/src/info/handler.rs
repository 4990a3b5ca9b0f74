use std::sync::Arc;

use axum::{Json, extract::State};

use crate::state::ServerState;

use super::dto::Info;

#[utoipa::path(
    get,
    path = "/",
    description = "Service name, version and watcher status",
    responses(
        (status = 200, description = "Success", body = Info),
    )
)]
pub async fn info(State(server_state): State<Arc<ServerState>>) -> Json<Info> {
    Json(Info {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        watched_addresses: server_state.watcher().watched(),
    })
}
