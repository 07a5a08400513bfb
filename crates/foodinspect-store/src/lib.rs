//! Storage layer: write-once document cache, keyed merge, and persisted relations.

mod error;
pub use error::StoreError;

pub mod cache;
pub mod ledger;
pub mod merge;
pub mod table;

pub use cache::{DocumentCache, FsDocumentCache, MemoryDocumentCache};
pub use ledger::{Liveness, LivenessLedger};
pub use merge::{MergeLedger, MergeOutcome, merge};
pub use table::{Relation, StagedMerge, TableFormat, TableStore};
