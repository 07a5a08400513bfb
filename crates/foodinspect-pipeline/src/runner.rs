//! Chunked run: fan out retrieval, fan out extraction, then commit.
//!
//! Each chunk passes three stages in order. Retrieval runs up to
//! `fetch_concurrency` resolves at once on the current task. Extraction of
//! the live documents runs on the blocking pool, at most
//! `extract_concurrency` at a time. The merge barrier then folds the chunk's
//! records into the exports. A storage failure anywhere before the barrier
//! abandons the chunk without committing any of it.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use foodinspect_core::{
    ExtractedInspection, InspectionId, InspectionSummary, LivenessRecord, PipelineConfig,
    ViolationDetail, relations,
};
use foodinspect_extract::{ExtractionError, Provenance, extract_document};
use foodinspect_fetch::{FetchError, Fetcher, Resolution, Source, Transport};
use foodinspect_store::merge::row_keys;
use foodinspect_store::{DocumentCache, Liveness, LivenessLedger, Relation, TableStore};
use futures::StreamExt;
use futures::stream;
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tracing::{info, warn};

use crate::{CandidateFeed, PipelineError, RunReport};

type Extraction = Result<Result<ExtractedInspection, ExtractionError>, JoinError>;

pub struct Pipeline<T, C> {
    fetcher: Fetcher<T, C>,
    store: TableStore,
    config: PipelineConfig,
    checked_on: NaiveDate,
}

impl<T: Transport, C: DocumentCache + 'static> Pipeline<T, C> {
    pub fn new(fetcher: Fetcher<T, C>, store: TableStore, config: PipelineConfig) -> Self {
        Self {
            fetcher,
            store,
            config: config.normalized(),
            checked_on: Local::now().date_naive(),
        }
    }

    /// Date stamped on liveness rows written by this run.
    pub fn with_checked_on(mut self, day: NaiveDate) -> Self {
        self.checked_on = day;
        self
    }

    pub fn store(&self) -> &TableStore {
        &self.store
    }

    pub async fn run(&self, feed: &CandidateFeed) -> Result<RunReport, PipelineError> {
        let ledger = LivenessLedger::from_batch(&self.store.read(&Relation::liveness_ledger())?)?;
        let summaries = self.store.read(&Relation::inspection_summaries())?;
        let extracted: HashSet<i64> = row_keys(&summaries, relations::INSPECTION_SUMMARY_KEY)?
            .into_iter()
            .filter_map(|key| key.first().copied())
            .collect();
        let provenance = Arc::new(feed.provenance());

        let mut report = RunReport::default();
        let mut pending = Vec::new();
        for id in feed.candidates() {
            report.candidates += 1;
            if extracted.contains(&id.as_i64()) {
                report.already_extracted += 1;
            } else if !self.config.retry_dead && ledger.status(id) == Some(Liveness::Dead) {
                report.skipped_dead += 1;
            } else {
                pending.push(id);
            }
        }

        let chunks = pending.len().div_ceil(self.config.chunk_size);
        info!(
            candidates = report.candidates,
            pending = pending.len(),
            skipped_dead = report.skipped_dead,
            already_extracted = report.already_extracted,
            chunks,
            "starting run"
        );
        for (n, chunk) in pending.chunks(self.config.chunk_size).enumerate() {
            info!(chunk = n + 1, of = chunks, size = chunk.len(), "processing chunk");
            self.run_chunk(chunk, &provenance, &mut report).await?;
            report.chunks += 1;
        }
        info!(
            live = report.live,
            dead = report.dead,
            extracted = report.extracted,
            rejected = report.rejected_total(),
            "run complete"
        );
        Ok(report)
    }

    async fn run_chunk(
        &self,
        chunk: &[InspectionId],
        provenance: &Arc<Provenance>,
        report: &mut RunReport,
    ) -> Result<(), PipelineError> {
        let mut resolved: Vec<(InspectionId, Result<Resolution, FetchError>)> =
            stream::iter(chunk.iter().copied())
                .map(|id| async move { (id, self.fetcher.resolve(id).await) })
                .buffer_unordered(self.config.fetch_concurrency)
                .collect()
                .await;
        resolved.sort_by_key(|(id, _)| *id);

        let mut ledger_rows = Vec::new();
        let mut live = Vec::new();
        for (id, outcome) in resolved {
            match outcome {
                Ok(Resolution::Live {
                    bytes,
                    source,
                    newly_cached,
                }) => {
                    report.live += 1;
                    report.cache_hits += usize::from(source == Source::Cache);
                    report.newly_cached += usize::from(newly_cached);
                    ledger_rows.push(self.liveness(id, true));
                    live.push((id, bytes));
                }
                Ok(Resolution::Dead) => {
                    report.dead += 1;
                    ledger_rows.push(self.liveness(id, false));
                }
                Err(FetchError::Unreadable(e)) => {
                    warn!(%id, error = %e, "cached document unreadable");
                    report.reject("unreadable");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let mut summary_rows: Vec<InspectionSummary> = Vec::new();
        let mut detail_rows: Vec<ViolationDetail> = Vec::new();
        for (id, outcome) in self.extract_all(live, provenance).await? {
            match outcome {
                Ok(Ok(record)) => {
                    report.extracted += 1;
                    summary_rows.push(record.summary);
                    detail_rows.extend(record.violations);
                }
                Ok(Err(rejection)) => {
                    warn!(%id, reason = %rejection.reason(), "rejected document");
                    report.reject(rejection.reason());
                }
                Err(e) => {
                    warn!(%id, error = %e, "extraction task failed");
                    report.reject("extract_panicked");
                }
            }
        }

        // All three relations are staged before any is published, so a storage
        // failure leaves the exports as they were before the chunk.
        let details = relations::violations_to_batch(&detail_rows)?;
        let summaries = relations::summaries_to_batch(&summary_rows)?;
        let ledger = relations::liveness_to_batch(&ledger_rows)?;
        let outcomes = self.store.merge_all(&[
            (Relation::violation_details(), &details),
            (Relation::inspection_summaries(), &summaries),
            (Relation::liveness_ledger(), &ledger),
        ])?;
        if let [details, summaries, ledger] = outcomes.as_slice() {
            report.new_detail_rows += details.appended;
            report.new_summary_rows += summaries.appended;
            report.new_ledger_rows += ledger.appended;
        }
        Ok(())
    }

    /// Extract every live document on the blocking pool, bounded by the
    /// extract semaphore. Results come back in input order.
    async fn extract_all(
        &self,
        live: Vec<(InspectionId, Vec<u8>)>,
        provenance: &Arc<Provenance>,
    ) -> Result<Vec<(InspectionId, Extraction)>, PipelineError> {
        let permits = Arc::new(Semaphore::new(self.config.extract_concurrency));
        let handles: Vec<_> = live
            .into_iter()
            .map(|(id, bytes)| {
                let permits = permits.clone();
                let provenance = provenance.clone();
                let handle = tokio::spawn(async move {
                    let _permit = permits.acquire_owned().await;
                    tokio::task::spawn_blocking(move || extract_document(&bytes, id, &provenance))
                        .await
                });
                (id, handle)
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (id, handle) in handles {
            results.push((id, handle.await?));
        }
        Ok(results)
    }

    fn liveness(&self, id: InspectionId, was_live: bool) -> LivenessRecord {
        LivenessRecord {
            inspection_id: id,
            was_live,
            checked_on: self.checked_on,
        }
    }
}
