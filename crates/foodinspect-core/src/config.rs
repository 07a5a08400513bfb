//! Pipeline tuning knobs, passed explicitly into the pipeline entry point.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Worker pool sizes, chunking, and per-request timeout for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Concurrent fetch resolves (network bound).
    pub fetch_concurrency: usize,
    /// Concurrent extractions (CPU bound).
    pub extract_concurrency: usize,
    /// Identifiers per chunk. Each chunk is committed as a whole.
    pub chunk_size: usize,
    /// Upper bound on a single network resolve; exceeding it classifies the
    /// identifier as dead.
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
    /// Re-resolve identifiers the liveness ledger already records as dead.
    pub retry_dead: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch_concurrency: 40,
            extract_concurrency: 7,
            chunk_size: 2000,
            request_timeout: Duration::from_secs(30),
            retry_dead: false,
        }
    }
}

impl PipelineConfig {
    /// Clamp zero-sized pools and chunks to one so a run always makes progress.
    pub fn normalized(mut self) -> Self {
        self.fetch_concurrency = self.fetch_concurrency.max(1);
        self.extract_concurrency = self.extract_concurrency.max(1);
        self.chunk_size = self.chunk_size.max(1);
        self
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
