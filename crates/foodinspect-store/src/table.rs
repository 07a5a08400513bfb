//! Persisted relations: CSV (default) or Parquet files in an output directory.
//!
//! A relation file is only ever replaced whole: the merged relation is written
//! to a temporary file next to it and renamed into place.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::compute::concat_batches;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use foodinspect_core::relations;
use tempfile::NamedTempFile;
use tracing::info;

use crate::StoreError;
use crate::merge::{MergeOutcome, merge};

const CSV_BATCH_SIZE: usize = 8192;

/// One exported relation: file stem, schema, and merge key.
#[derive(Debug, Clone)]
pub struct Relation {
    pub name: &'static str,
    pub schema: SchemaRef,
    pub key: &'static [&'static str],
}

impl Relation {
    pub fn inspection_summaries() -> Self {
        Self {
            name: relations::INSPECTION_SUMMARIES,
            schema: Arc::new(relations::inspection_summary_schema()),
            key: relations::INSPECTION_SUMMARY_KEY,
        }
    }

    pub fn violation_details() -> Self {
        Self {
            name: relations::VIOLATION_DETAILS,
            schema: Arc::new(relations::violation_detail_schema()),
            key: relations::VIOLATION_DETAIL_KEY,
        }
    }

    pub fn liveness_ledger() -> Self {
        Self {
            name: relations::LIVENESS_LEDGER,
            schema: Arc::new(relations::liveness_ledger_schema()),
            key: relations::LIVENESS_LEDGER_KEY,
        }
    }
}

/// On-disk format of the exported relations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableFormat {
    #[default]
    Csv,
    #[cfg(feature = "parquet")]
    Parquet,
}

impl TableFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            #[cfg(feature = "parquet")]
            Self::Parquet => "parquet",
        }
    }
}

/// Directory of persisted relations in one format.
pub struct TableStore {
    dir: PathBuf,
    format: TableFormat,
}

impl TableStore {
    /// Open (and create if needed) an output directory.
    pub fn open(dir: impl Into<PathBuf>, format: TableFormat) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        Ok(Self { dir, format })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, relation: &Relation) -> PathBuf {
        self.dir
            .join(format!("{}.{}", relation.name, self.format.extension()))
    }

    /// Read a relation. A missing file is an empty relation.
    pub fn read(&self, relation: &Relation) -> Result<RecordBatch, StoreError> {
        let path = self.path(relation);
        if !path.exists() {
            return Ok(RecordBatch::new_empty(relation.schema.clone()));
        }
        let file = File::open(&path).map_err(|e| StoreError::io(&path, e))?;
        let batches = match self.format {
            TableFormat::Csv => read_csv(file, &relation.schema)?,
            #[cfg(feature = "parquet")]
            TableFormat::Parquet => read_parquet(file)?,
        };
        Ok(concat_batches(&relation.schema, &batches)?)
    }

    /// Replace a relation file with `batch`.
    pub fn write(&self, relation: &Relation, batch: &RecordBatch) -> Result<(), StoreError> {
        let tmp = self.write_temp(batch)?;
        persist(tmp, &self.path(relation))
    }

    /// Merge `incoming` into the persisted relation and write the union back.
    ///
    /// The file is left untouched when nothing new would be appended and it
    /// already exists.
    pub fn merge_into(
        &self,
        relation: &Relation,
        incoming: &RecordBatch,
    ) -> Result<MergeOutcome, StoreError> {
        self.stage(relation, incoming)?.publish()
    }

    /// Merge several relations as one commit.
    ///
    /// Every merged relation is written to a synced temporary file first. Only
    /// when all of them are staged are the files renamed into place, so a
    /// failure while merging or writing leaves every relation untouched.
    pub fn merge_all(
        &self,
        batches: &[(Relation, &RecordBatch)],
    ) -> Result<Vec<MergeOutcome>, StoreError> {
        let staged = batches
            .iter()
            .map(|(relation, incoming)| self.stage(relation, incoming))
            .collect::<Result<Vec<_>, _>>()?;
        staged.into_iter().map(StagedMerge::publish).collect()
    }

    /// Merge `incoming` and write the result beside the relation file without
    /// replacing it.
    pub fn stage(
        &self,
        relation: &Relation,
        incoming: &RecordBatch,
    ) -> Result<StagedMerge, StoreError> {
        let existing = self.read(relation)?;
        let outcome = merge(&existing, incoming, relation.key).map_err(|e| match e {
            StoreError::SchemaMismatch { detail, .. } => StoreError::SchemaMismatch {
                relation: relation.name.to_string(),
                detail,
            },
            other => other,
        })?;

        let path = self.path(relation);
        let tmp = if outcome.appended > 0 || !path.exists() {
            Some(self.write_temp(&outcome.batch)?)
        } else {
            None
        };
        Ok(StagedMerge {
            name: relation.name,
            path,
            tmp,
            outcome,
        })
    }

    fn write_temp(&self, batch: &RecordBatch) -> Result<NamedTempFile, StoreError> {
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        match self.format {
            TableFormat::Csv => {
                let mut writer = WriterBuilder::new()
                    .with_header(true)
                    .build(tmp.as_file_mut());
                writer.write(batch)?;
            }
            #[cfg(feature = "parquet")]
            TableFormat::Parquet => {
                let mut writer =
                    parquet::arrow::ArrowWriter::try_new(tmp.as_file_mut(), batch.schema(), None)?;
                writer.write(batch)?;
                writer.close()?;
            }
        }
        tmp.as_file()
            .sync_all()
            .map_err(|e| StoreError::io(tmp.path(), e))?;
        Ok(tmp)
    }
}

/// A merged relation written to a temporary file but not yet visible.
///
/// Dropping it discards the temporary file.
pub struct StagedMerge {
    name: &'static str,
    path: PathBuf,
    tmp: Option<NamedTempFile>,
    outcome: MergeOutcome,
}

impl StagedMerge {
    pub fn outcome(&self) -> &MergeOutcome {
        &self.outcome
    }

    /// Rename the staged file over the relation file.
    pub fn publish(self) -> Result<MergeOutcome, StoreError> {
        if let Some(tmp) = self.tmp {
            persist(tmp, &self.path)?;
        }
        let outcome = self.outcome;
        info!(
            relation = self.name,
            existing = outcome.existing_rows,
            appended = outcome.appended,
            discarded = outcome.discarded,
            "merged relation"
        );
        Ok(outcome)
    }
}

fn persist(tmp: NamedTempFile, path: &Path) -> Result<(), StoreError> {
    tmp.persist(path).map_err(|e| StoreError::io(path, e.error))?;
    Ok(())
}

fn read_csv(file: File, schema: &SchemaRef) -> Result<Vec<RecordBatch>, StoreError> {
    let reader = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .with_batch_size(CSV_BATCH_SIZE)
        .build(file)?;
    let batches: Result<Vec<RecordBatch>, _> = reader.collect();
    Ok(batches?)
}

#[cfg(feature = "parquet")]
fn read_parquet(file: File) -> Result<Vec<RecordBatch>, StoreError> {
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let batches: Result<Vec<RecordBatch>, _> = reader.collect();
    Ok(batches?)
}
