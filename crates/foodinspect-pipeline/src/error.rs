use std::path::PathBuf;

use foodinspect_fetch::FetchError;
use foodinspect_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("cannot read candidate file {path}: {source}")]
    Feed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("candidate file {path} has no {column} column")]
    FeedColumn { path: PathBuf, column: String },

    #[error("extraction task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
