use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};
use persona_core::helpers::dto::Profile;

use crate::{error::ErrorServer, state::ServerState};

#[utoipa::path(
    get,
    path = "/profile/{address}",
    description = "Merged identity for an address across all chains",
    params(
        ("address" = String, Path, description = "EVM address, 0x-prefixed"),
    ),
    responses(
        (status = 200, description = "Success", body = Profile),
        (status = 400, description = "Bad Request"),
        (status = 502, description = "Bad Gateway"),
    )
)]
pub async fn profile(
    State(server_state): State<Arc<ServerState>>,
    Path(address): Path<String>,
) -> Result<Json<Profile>, ErrorServer> {
    let profile = server_state.aggregator().get_profile(&address).await?;
    Ok(Json(profile))
}
