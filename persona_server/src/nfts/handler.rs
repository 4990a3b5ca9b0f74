use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use persona_core::helpers::dto::NftAsset;
use persona_core::upstream::SupportedChain;

use crate::{error::ErrorServer, state::ServerState};

use super::dto::NftQuery;

#[utoipa::path(
    get,
    path = "/nfts/{address}",
    description = "NFT holdings across all chains, optionally filtered to one",
    params(
        ("address" = String, Path, description = "EVM address, 0x-prefixed"),
        NftQuery,
    ),
    responses(
        (status = 200, description = "Success", body = [NftAsset]),
        (status = 400, description = "Bad Request"),
        (status = 502, description = "Bad Gateway"),
    )
)]
pub async fn nfts(
    State(server_state): State<Arc<ServerState>>,
    Path(address): Path<String>,
    Query(query): Query<NftQuery>,
) -> Result<Json<Vec<NftAsset>>, ErrorServer> {
    let filter = match query.chain.as_deref() {
        Some(raw) => match SupportedChain::parse(raw) {
            Some(chain) => Some(chain),
            None => {
                return Err(ErrorServer {
                    message: format!("unsupported chain: {}", raw),
                    status: StatusCode::BAD_REQUEST.into(),
                });
            }
        },
        None => None,
    };

    let mut assets = server_state.aggregator().aggregate_nfts(&address).await?;
    if let Some(chain) = filter {
        assets.retain(|asset| asset.chain == chain.name());
    }
    Ok(Json(assets))
}
