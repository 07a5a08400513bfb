use std::path::PathBuf;

use arrow::datatypes::DataType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[cfg(feature = "parquet")]
    #[error("parquet error: {0}")]
    Parquet(#[from] ::parquet::errors::ParquetError),

    #[error("relation {relation} has no key column {column}")]
    MissingKeyColumn { relation: String, column: String },

    #[error("key column {column} has unsupported type {data_type}")]
    UnsupportedKeyType { column: String, data_type: DataType },

    #[error("key column {column} contains a null at row {row}")]
    NullKey { column: String, row: usize },

    #[error("schema mismatch for {relation}: {detail}")]
    SchemaMismatch { relation: String, detail: String },

    #[error("{0}")]
    Other(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
