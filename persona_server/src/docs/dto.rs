use persona_core::helpers::dto::{
    ActivityCategory, ActivityEntry, NftAsset, NftAttribute, Profile, TokenBalance,
};
use utoipa::OpenApi;

use crate::{activity, balances, info, nfts, profile};

#[derive(OpenApi)]
#[openapi(
    paths(
        info::handler::info,
        profile::handler::profile,
        nfts::handler::nfts,
        activity::handler::activity,
        balances::handler::balances,
    ),
    components(schemas(
        info::dto::Info,
        Profile,
        NftAsset,
        NftAttribute,
        ActivityEntry,
        ActivityCategory,
        TokenBalance,
    ))
)]
pub struct ApiDoc;
