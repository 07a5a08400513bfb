use std::collections::BTreeMap;

use serde::Serialize;

/// Counters for one run, accumulated chunk by chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub candidates: usize,
    /// Already classified dead by an earlier run and not retried.
    pub skipped_dead: usize,
    /// Already present in the summaries export.
    pub already_extracted: usize,
    pub chunks: usize,
    pub live: usize,
    pub dead: usize,
    pub cache_hits: usize,
    pub newly_cached: usize,
    pub extracted: usize,
    pub new_summary_rows: usize,
    pub new_detail_rows: usize,
    pub new_ledger_rows: usize,
    /// Rejected identifiers by reason tag.
    pub rejected: BTreeMap<String, usize>,
}

impl RunReport {
    pub fn reject(&mut self, reason: impl Into<String>) {
        *self.rejected.entry(reason.into()).or_default() += 1;
    }

    pub fn rejected_total(&self) -> usize {
        self.rejected.values().sum()
    }
}
