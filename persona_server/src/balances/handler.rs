use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};
use persona_core::helpers::dto::TokenBalance;

use crate::{error::ErrorServer, state::ServerState};

#[utoipa::path(
    get,
    path = "/balances/{address}",
    description = "Nonzero fungible token balances with metadata",
    params(
        ("address" = String, Path, description = "EVM address, 0x-prefixed"),
    ),
    responses(
        (status = 200, description = "Success", body = [TokenBalance]),
        (status = 400, description = "Bad Request"),
        (status = 502, description = "Bad Gateway"),
    )
)]
pub async fn balances(
    State(server_state): State<Arc<ServerState>>,
    Path(address): Path<String>,
) -> Result<Json<Vec<TokenBalance>>, ErrorServer> {
    let balances = server_state.aggregator().get_token_balances(&address).await?;
    Ok(Json(balances))
}
