use std::time::Duration;

use foodinspect_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport failed: {0}")]
    Transport(String),

    #[error("endpoint template {0:?} has no {{id}} placeholder")]
    Endpoint(String),

    /// A cached document exists but could not be read back.
    #[error("cached document is unreadable: {0}")]
    Unreadable(#[source] StoreError),

    /// Writing to or reading from the document cache failed. Unlike the
    /// other variants this is never folded into a dead classification.
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl FetchError {
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}
