//! Run orchestration: candidate feed, chunked fan-out/fan-in over the fetch
//! and extract pools, and the merge barrier that commits each chunk.

mod error;
pub mod candidates;
pub mod report;
pub mod runner;

pub use candidates::{CandidateFeed, read_id_column};
pub use error::PipelineError;
pub use report::RunReport;
pub use runner::Pipeline;
