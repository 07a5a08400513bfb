//! Keyed, left-biased merge of Arrow relations.
//!
//! `merge(existing, incoming, key)` keeps every existing row untouched and
//! appends the incoming rows whose key is absent from `existing`. Incoming
//! rows that collide with an existing key are discarded, never used to
//! update. The result depends only on the two row sets, not on the order
//! rows were produced in.

use std::collections::HashSet;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, UInt32Array};
use arrow::compute::{concat_batches, take};
use arrow::datatypes::{DataType, Int32Type, Int64Type};
use arrow::record_batch::RecordBatch;
use tracing::debug;

use crate::StoreError;

/// Composite key of one row. All key columns are integers or booleans.
pub type RowKey = Vec<i64>;

/// The key set of an already persisted relation.
pub struct MergeLedger {
    keys: HashSet<RowKey>,
}

impl MergeLedger {
    pub fn from_batch(batch: &RecordBatch, key: &[&str]) -> Result<Self, StoreError> {
        Ok(Self {
            keys: row_keys(batch, key)?.into_iter().collect(),
        })
    }

    pub fn contains(&self, key: &RowKey) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Result of one merge.
#[derive(Debug)]
pub struct MergeOutcome {
    pub batch: RecordBatch,
    pub existing_rows: usize,
    pub appended: usize,
    pub discarded: usize,
}

/// Fold `incoming` into `existing`, keyed by the `key` columns.
///
/// Appended rows are ordered by key. Duplicate keys within `incoming` keep
/// their first occurrence.
pub fn merge(
    existing: &RecordBatch,
    incoming: &RecordBatch,
    key: &[&str],
) -> Result<MergeOutcome, StoreError> {
    check_compatible(existing, incoming)?;

    let ledger = MergeLedger::from_batch(existing, key)?;
    let incoming_keys = row_keys(incoming, key)?;

    let mut seen: HashSet<&RowKey> = HashSet::new();
    let mut fresh: Vec<(&RowKey, u32)> = Vec::new();
    for (row, k) in incoming_keys.iter().enumerate() {
        if !ledger.contains(k) && seen.insert(k) {
            fresh.push((k, row as u32));
        }
    }
    fresh.sort_by(|a, b| a.0.cmp(b.0));

    let appended = fresh.len();
    let discarded = incoming.num_rows() - appended;
    let indices = UInt32Array::from(fresh.into_iter().map(|(_, row)| row).collect::<Vec<_>>());
    let taken = take_rows(incoming, &indices)?;

    let schema = existing.schema();
    let batch = concat_batches(&schema, [existing, &taken])?;
    debug!(
        existing = existing.num_rows(),
        appended, discarded, "merged relation"
    );

    Ok(MergeOutcome {
        batch,
        existing_rows: existing.num_rows(),
        appended,
        discarded,
    })
}

fn take_rows(batch: &RecordBatch, indices: &UInt32Array) -> Result<RecordBatch, StoreError> {
    let columns = batch
        .columns()
        .iter()
        .map(|col| take(col.as_ref(), indices, None))
        .collect::<Result<Vec<ArrayRef>, _>>()?;
    Ok(RecordBatch::try_new(batch.schema(), columns)?)
}

fn check_compatible(existing: &RecordBatch, incoming: &RecordBatch) -> Result<(), StoreError> {
    let left = existing.schema();
    let right = incoming.schema();
    let same_shape = left.fields().len() == right.fields().len()
        && left
            .fields()
            .iter()
            .zip(right.fields().iter())
            .all(|(a, b)| a.name() == b.name() && a.data_type() == b.data_type());
    if same_shape {
        Ok(())
    } else {
        Err(StoreError::SchemaMismatch {
            relation: "merge input".into(),
            detail: format!("existing {left:?} vs incoming {right:?}"),
        })
    }
}

/// Extract the composite key of every row.
pub fn row_keys(batch: &RecordBatch, key: &[&str]) -> Result<Vec<RowKey>, StoreError> {
    let columns = key
        .iter()
        .map(|name| {
            batch
                .column_by_name(name)
                .cloned()
                .map(|col| (*name, col))
                .ok_or_else(|| StoreError::MissingKeyColumn {
                    relation: field_names(batch),
                    column: name.to_string(),
                })
        })
        .collect::<Result<Vec<(&str, ArrayRef)>, _>>()?;

    let mut keys = vec![Vec::with_capacity(columns.len()); batch.num_rows()];
    for (name, col) in &columns {
        append_key_column(name, col, &mut keys)?;
    }
    Ok(keys)
}

fn field_names(batch: &RecordBatch) -> String {
    let schema = batch.schema();
    let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
    format!("{names:?}")
}

fn append_key_column(
    name: &str,
    col: &Arc<dyn Array>,
    keys: &mut [RowKey],
) -> Result<(), StoreError> {
    if let Some(row) = (0..col.len()).find(|&i| col.is_null(i)) {
        return Err(StoreError::NullKey {
            column: name.to_string(),
            row,
        });
    }
    match col.data_type() {
        DataType::Int64 => {
            let values = col.as_primitive::<Int64Type>();
            for (k, v) in keys.iter_mut().zip(values.values().iter()) {
                k.push(*v);
            }
        }
        DataType::Int32 => {
            let values = col.as_primitive::<Int32Type>();
            for (k, v) in keys.iter_mut().zip(values.values().iter()) {
                k.push(i64::from(*v));
            }
        }
        DataType::Boolean => {
            let values = col.as_boolean();
            for (i, k) in keys.iter_mut().enumerate() {
                k.push(i64::from(values.value(i)));
            }
        }
        other => {
            return Err(StoreError::UnsupportedKeyType {
                column: name.to_string(),
                data_type: other.clone(),
            });
        }
    }
    Ok(())
}
