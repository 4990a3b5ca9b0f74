use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
pub struct NftQuery {
    /// Restrict results to one chain, e.g. `ethereum` or `polygon`.
    pub chain: Option<String>,
}
