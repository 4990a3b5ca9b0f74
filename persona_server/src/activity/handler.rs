use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};
use persona_core::helpers::dto::ActivityEntry;

use crate::{error::ErrorServer, state::ServerState};

#[utoipa::path(
    get,
    path = "/activity/{address}",
    description = "Classified transfer history, newest first",
    params(
        ("address" = String, Path, description = "EVM address, 0x-prefixed"),
    ),
    responses(
        (status = 200, description = "Success", body = [ActivityEntry]),
        (status = 400, description = "Bad Request"),
        (status = 502, description = "Bad Gateway"),
    )
)]
pub async fn activity(
    State(server_state): State<Arc<ServerState>>,
    Path(address): Path<String>,
) -> Result<Json<Vec<ActivityEntry>>, ErrorServer> {
    let feed = server_state.aggregator().get_activity_feed(&address).await?;
    Ok(Json(feed))
}
