use thiserror::Error;

use crate::state::PageId;

/// Terminal failure for a whole page view.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    #[error("page {page_id} was not found")]
    NotFound { page_id: PageId },
    #[error("stream transport failed: {message}")]
    Transport { message: String },
    #[error("page fetch failed: {message}")]
    Fetch { message: String },
}

impl ViewError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid event json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("event is missing its \"type\" tag")]
    MissingTag,
    #[error("transcript io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },
}
