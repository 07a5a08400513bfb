//! Retrieval layer: resolve an inspection identifier to cached report bytes,
//! classifying it live or dead on the way.

mod error;
pub mod fetcher;
pub mod transport;

#[cfg(feature = "http")]
pub mod http;

pub use error::FetchError;
pub use fetcher::{Fetcher, Resolution, Source};
pub use transport::Transport;

#[cfg(feature = "http")]
pub use http::{DEFAULT_ENDPOINT, HttpOptions, HttpTransport};
