use crate::config::ConfigError;
use crate::geo_point::GeoError;
use crate::parsers::ParseError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum FogError {
    #[error(transparent)]
    Geo(#[from] GeoError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("storage failed: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("JSON output failed: {0}")]
    Output(#[from] serde_json::Error),
}
